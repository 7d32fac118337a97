//! mountwait CLI - Check or wait for mountpoint state from the shell.
//!
//! Exit status carries the result so the tool can gate scripts, e.g.
//! `mountwait wait /mnt/onboard --unmounted && do-something`.

mod commands;
mod report;

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use env_logger::{Env, Target};

/// Exit status for setup errors (bad config, pipe creation, output).
const EXIT_SETUP_ERROR: i32 = 4;

/// mountwait CLI tool.
#[derive(Parser)]
#[command(name = "mountwait")]
#[command(about = "Check or wait for a mountpoint to be mounted or unmounted", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Mountpoint and the state it should be in.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Mountpoint path, compared exactly against the mount table.
    pub mount_point: PathBuf,

    /// Target the unmounted state instead of the mounted one.
    #[arg(long)]
    pub unmounted: bool,

    /// Mount table to read instead of /proc/mounts.
    #[arg(long, value_name = "PATH")]
    pub mount_table: Option<PathBuf>,

    /// Print the result as a JSON object on stdout (logs go to stderr).
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check once whether the mountpoint is in the requested state.
    ///
    /// Exits 0 if it is, 1 if it is not.
    Probe {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Block until the mountpoint reaches the requested state.
    ///
    /// Exits 0 on success, 1 when too many unrelated mount changes happened,
    /// 2 when watching the mount table failed and 3 on timeout.
    Wait {
        #[command(flatten)]
        target: TargetArgs,

        /// Unrelated mount table changes tolerated before giving up.
        #[arg(long, value_name = "N")]
        max_changes: Option<u8>,

        /// JSON wait config; flags given on the command line take precedence.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Give up after this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

impl Commands {
    fn target(&self) -> &TargetArgs {
        match self {
            Commands::Probe { target } | Commands::Wait { target, .. } => target,
        }
    }
}

fn init_logging(json: bool) {
    // Keep stdout clean for the JSON report.
    let target = if json { Target::Stderr } else { Target::Stdout };

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(target)
        .format(|buf, record| writeln!(buf, "[mountwait] {}", record.args()))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.command.target().json);

    let result = match &cli.command {
        Commands::Probe { target } => commands::run_probe(target),
        Commands::Wait {
            target,
            max_changes,
            config,
            timeout,
        } => commands::run_wait(target, *max_changes, config.as_deref(), *timeout),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("mountwait error: {}", e);
            std::process::exit(EXIT_SETUP_ERROR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_wait_args() {
        let cli = Cli::try_parse_from([
            "mountwait",
            "wait",
            "/mnt/onboard",
            "--unmounted",
            "--max-changes",
            "8",
            "--timeout",
            "30",
        ])
        .unwrap();

        match cli.command {
            Commands::Wait {
                target,
                max_changes,
                timeout,
                config,
            } => {
                assert_eq!(target.mount_point, PathBuf::from("/mnt/onboard"));
                assert!(target.unmounted);
                assert_eq!(max_changes, Some(8));
                assert_eq!(timeout, Some(30));
                assert!(config.is_none());
            }
            Commands::Probe { .. } => panic!("expected wait subcommand"),
        }
    }
}
