//! Unified error types for the mountwait-core library.
//!
//! Uses SNAFU for context-rich error handling. The public probe and wait
//! surfaces never return these directly: a failed table read degrades to
//! "not mounted" and a failed subscription becomes a `WaitOutcome`.

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Mount table could not be opened or read.
    #[snafu(display("failed to read mount table at {}", path.display()))]
    MountTableRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Mount table could not be opened for change notification.
    #[snafu(display("failed to open mount table at {} for watching", path.display()))]
    WatchOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The blocking readiness poll on the mount table failed.
    #[snafu(display("polling mount table at {} failed", path.display()))]
    WatchPoll {
        path: PathBuf,
        source: nix::errno::Errno,
    },

    /// The cancellation pipe could not be created or signalled.
    #[snafu(display("cancellation pipe error"))]
    CancelPipe { source: nix::errno::Errno },

    /// Wait configuration file could not be read.
    #[snafu(display("failed to read wait config at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Wait configuration file is not valid JSON for `WaitConfig`.
    #[snafu(display("failed to parse wait config at {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for mount table read errors.
    fn mount_table_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for watch descriptor open errors.
    fn watch_open_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for config read errors.
    fn config_read_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn mount_table_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(MountTableReadSnafu { path: path.into() })
    }

    fn watch_open_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(WatchOpenSnafu { path: path.into() })
    }

    fn config_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(ConfigReadSnafu { path: path.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_table_context_display() {
        let err: Result<()> = Err::<(), _>(std::io::Error::from(std::io::ErrorKind::NotFound))
            .mount_table_context("/proc/mounts");
        let err = err.unwrap_err();

        assert!(matches!(err, Error::MountTableRead { .. }));
        assert_eq!(err.to_string(), "failed to read mount table at /proc/mounts");
    }

    #[test]
    fn test_watch_poll_display() {
        let err = Error::WatchPoll {
            path: PathBuf::from("/proc/mounts"),
            source: nix::errno::Errno::EBADF,
        };
        assert_eq!(err.to_string(), "polling mount table at /proc/mounts failed");
    }
}
