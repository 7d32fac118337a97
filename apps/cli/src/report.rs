//! JSON result reports for `--json` output.

use std::io::{self, Write};
use std::path::Path;

use mountwait_core::{MountState, WaitOutcome};
use serde::Serialize;

/// Result of `mountwait probe`.
#[derive(Debug, Serialize)]
pub struct ProbeReport<'a> {
    pub mount_point: &'a Path,
    pub desired: MountState,
    /// Whether the mountpoint is in the desired state.
    pub holds: bool,
}

/// Result of `mountwait wait`.
#[derive(Debug, Serialize)]
pub struct WaitReport<'a> {
    pub mount_point: &'a Path,
    pub desired: MountState,
    pub success: bool,
    #[serde(flatten)]
    pub outcome: &'a WaitOutcome,
}

/// Writes `report` as a single JSON line to stdout.
pub fn write_json<T: Serialize>(report: &T) -> io::Result<()> {
    let json = serde_json::to_string(report).map_err(io::Error::other)?;
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}
