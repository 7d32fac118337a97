//! Subcommand handlers.

use std::error::Error;
use std::path::Path;
use std::thread;
use std::time::Duration;

use log::{info, warn};
use mountwait_core::mtab::PROC_MOUNTS;
use mountwait_core::{
    CancelToken, MountState, MountTarget, ProcMounts, WaitConfig, WaitOutcome, Waiter, probe_with,
};

use crate::TargetArgs;
use crate::report::{ProbeReport, WaitReport, write_json};

type CommandResult = Result<i32, Box<dyn Error>>;

fn desired_state(target: &TargetArgs) -> MountState {
    MountState::from_mounted(!target.unmounted)
}

/// Runs a single probe and maps the answer to an exit status.
pub fn run_probe(target: &TargetArgs) -> CommandResult {
    let table = target
        .mount_table
        .as_deref()
        .unwrap_or(Path::new(PROC_MOUNTS));
    let desired = desired_state(target);

    let holds = probe_with(&ProcMounts::new(table), desired, &target.mount_point);

    if target.json {
        write_json(&ProbeReport {
            mount_point: &target.mount_point,
            desired,
            holds,
        })?;
    }

    Ok(if holds { 0 } else { 1 })
}

/// Blocks until the target state holds or the wait gives up.
pub fn run_wait(
    target: &TargetArgs,
    max_changes: Option<u8>,
    config_path: Option<&Path>,
    timeout: Option<u64>,
) -> CommandResult {
    let mut config = match config_path {
        Some(path) => WaitConfig::from_json_file(path)?,
        None => WaitConfig::default(),
    };
    if let Some(table) = &target.mount_table {
        config.mount_table = table.clone();
    }
    if let Some(max_changes) = max_changes {
        config.max_changes = max_changes;
    }

    let mut waiter = Waiter::from_config(&config);
    if let Some(secs) = timeout {
        let token = CancelToken::new()?;
        waiter = waiter.with_cancel(token.clone());
        spawn_timeout(token, Duration::from_secs(secs));
    }

    let desired = desired_state(target);
    let outcome = waiter.wait(&MountTarget::new(&target.mount_point, desired));

    if target.json {
        write_json(&WaitReport {
            mount_point: &target.mount_point,
            desired,
            success: outcome.is_success(),
            outcome: &outcome,
        })?;
    }

    Ok(exit_code(&outcome))
}

fn spawn_timeout(token: CancelToken, after: Duration) {
    thread::spawn(move || {
        thread::sleep(after);
        info!("Timed out after {}s", after.as_secs());
        if let Err(e) = token.cancel() {
            warn!("failed to cancel wait: {}", e);
        }
    });
}

fn exit_code(outcome: &WaitOutcome) -> i32 {
    match outcome {
        WaitOutcome::Satisfied { .. } => 0,
        WaitOutcome::Aborted { .. } => 1,
        WaitOutcome::WatchFailed { .. } => 2,
        WaitOutcome::Cancelled { .. } => 3,
    }
}
