//! mountwait-core: Observe and wait for mountpoint state changes.
//!
//! This library answers whether a mountpoint is currently mounted and can
//! block until it becomes mounted or unmounted, driven by the kernel's
//! mount table change notifications instead of a polling timer.
//!
//! # Modules
//!
//! - [`mtab`]: Mount table (`/proc/mounts`) parsing
//! - [`probe`]: One-shot mountpoint state check
//! - [`watch`]: Mount table change subscriptions and cancellation
//! - [`wait`]: Blocking wait with a bounded number of unrelated changes
//! - [`config`]: Wait configuration
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use mountwait_core::{MountState, probe, wait_for_state};
//!
//! // Nothing to wait for if the card is already attached
//! if !probe(MountState::Mounted, "/mnt/onboard") {
//!     let outcome = wait_for_state(MountState::Mounted, "/mnt/onboard");
//!     assert!(outcome.is_success());
//! }
//! ```

pub mod config;
pub mod error;
pub mod mtab;
pub mod probe;
pub mod wait;
pub mod watch;

// Re-export commonly used types
pub use config::WaitConfig;
pub use error::{Error, Result};
pub use mtab::{MountEntry, MountTable};
pub use probe::{MountSource, MountState, MountTarget, ProcMounts, probe, probe_with};
pub use wait::{WaitOutcome, Waiter, wait_for_state};
pub use watch::{CancelToken, ChangeSubscription, ChangeWatcher, ProcMountsWatcher, Wake};
