//! Blocking wait for a mountpoint to reach a state.
//!
//! The waiter probes once up front and returns immediately if the target
//! state already holds. Otherwise it subscribes to mount table changes and
//! re-probes after every change, giving up after `max_changes` changes that
//! did not bring the mountpoint into the requested state.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::WaitConfig;
use crate::probe::{MountSource, MountState, MountTarget, ProcMounts, probe_with};
use crate::watch::{CancelToken, ChangeSubscription, ChangeWatcher, ProcMountsWatcher, Wake};

/// How a wait ended. `changes` counts table changes seen before returning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WaitOutcome {
    /// The mountpoint reached the requested state.
    Satisfied { changes: u8 },
    /// Too many changes happened without the mountpoint reaching the state.
    Aborted { changes: u8 },
    /// Subscribing to or polling the mount table failed.
    WatchFailed { changes: u8, reason: String },
    /// The wait was cancelled through a `CancelToken`.
    Cancelled { changes: u8 },
}

impl WaitOutcome {
    /// True only when the mountpoint reached the requested state.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    pub fn changes(&self) -> u8 {
        match self {
            Self::Satisfied { changes }
            | Self::Aborted { changes }
            | Self::WatchFailed { changes, .. }
            | Self::Cancelled { changes } => *changes,
        }
    }
}

/// Waits for mountpoints to reach a state.
#[derive(Debug, Clone)]
pub struct Waiter<S = ProcMounts, W = ProcMountsWatcher> {
    source: S,
    watcher: W,
    max_changes: u8,
}

impl Waiter {
    /// Waiter on the live `/proc/mounts` with the default change ceiling.
    pub fn new() -> Self {
        Self::from_config(&WaitConfig::default())
    }

    pub fn from_config(config: &WaitConfig) -> Self {
        Self {
            source: ProcMounts::new(&config.mount_table),
            watcher: ProcMountsWatcher::new(&config.mount_table),
            max_changes: config.max_changes,
        }
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Waiter<S, ProcMountsWatcher> {
    /// Lets `token` interrupt waits started from this waiter.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.watcher = self.watcher.with_cancel(token);
        self
    }
}

impl<S: MountSource, W: ChangeWatcher> Waiter<S, W> {
    pub fn with_parts(source: S, watcher: W, max_changes: u8) -> Self {
        Self {
            source,
            watcher,
            max_changes,
        }
    }

    pub fn max_changes(&self) -> u8 {
        self.max_changes
    }

    /// Blocks until `target` holds, the change ceiling is hit, the watch
    /// fails, or the wait is cancelled.
    ///
    /// The subscription is only taken when the first probe fails, and it is
    /// dropped before returning on every path. The state is checked again
    /// right after subscribing; that check does not count as a change.
    pub fn wait(&self, target: &MountTarget) -> WaitOutcome {
        let mount_point = &target.mount_point;

        if probe_with(&self.source, target.state, mount_point) {
            return WaitOutcome::Satisfied { changes: 0 };
        }

        let mut subscription = match self.watcher.subscribe() {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("{}; cannot wait for {}", e, mount_point.display());
                return WaitOutcome::WatchFailed {
                    changes: 0,
                    reason: e.to_string(),
                };
            }
        };

        // A change landing between the first probe and the subscription
        // is never signalled, so look once more before blocking.
        if probe_with(&self.source, target.state, mount_point) {
            info!(
                "Good, {} is finally {}!",
                mount_point.display(),
                target.state
            );
            return WaitOutcome::Satisfied { changes: 0 };
        }

        let mut changes: u8 = 0;
        loop {
            match subscription.wait() {
                Ok(Wake::Changed) => {}
                Ok(Wake::Spurious) => continue,
                Ok(Wake::Cancelled) => {
                    info!("Wait for {} cancelled", mount_point.display());
                    return WaitOutcome::Cancelled { changes };
                }
                Err(e) => {
                    warn!("{}; giving up on {}", e, mount_point.display());
                    return WaitOutcome::WatchFailed {
                        changes,
                        reason: e.to_string(),
                    };
                }
            }

            changes = changes.saturating_add(1);
            info!(
                "Mountpoints changed (iteration nr. {} of {})",
                changes, self.max_changes
            );

            if probe_with(&self.source, target.state, mount_point) {
                info!(
                    "Good, {} is finally {}!",
                    mount_point.display(),
                    target.state
                );
                return WaitOutcome::Satisfied { changes };
            }

            if changes >= self.max_changes {
                warn!(
                    "Too many mountpoint changes without {} becoming {}, aborting!",
                    mount_point.display(),
                    target.state
                );
                return WaitOutcome::Aborted { changes };
            }
        }
    }
}

/// Waits on the live `/proc/mounts` for `mount_point` to be in `desired`
/// state, tolerating up to five unrelated changes.
pub fn wait_for_state(
    desired: impl Into<MountState>,
    mount_point: impl Into<std::path::PathBuf>,
) -> WaitOutcome {
    Waiter::new().wait(&MountTarget::new(mount_point, desired))
}
