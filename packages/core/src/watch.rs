//! Mount table change notification module.
//!
//! The kernel flags a `/proc/mounts` descriptor with `POLLERR | POLLPRI`
//! whenever the mount namespace changes. A subscription holds such a
//! descriptor open and blocks in `poll(2)` until the next change, or until
//! an optional `CancelToken` fires.

use std::fs::File;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use snafu::ResultExt;

use crate::error::{CancelPipeSnafu, Error, IoResultExt, Result};
use crate::mtab::PROC_MOUNTS;

/// Why a blocked subscription woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The mount table changed.
    Changed,
    /// Woken without a table change (e.g., interrupted by a signal).
    Spurious,
    /// The subscription's cancel token fired.
    Cancelled,
}

/// Source of mount table change subscriptions.
pub trait ChangeWatcher {
    type Subscription: ChangeSubscription;

    /// Starts watching the mount table.
    ///
    /// The returned subscription is released when dropped.
    fn subscribe(&self) -> Result<Self::Subscription>;
}

/// An active watch on the mount table.
pub trait ChangeSubscription {
    /// Blocks until the next wakeup. There is no timeout.
    fn wait(&mut self) -> Result<Wake>;
}

struct CancelInner {
    read: OwnedFd,
    write: OwnedFd,
    cancelled: AtomicBool,
}

/// Cloneable handle that wakes every wait sharing it.
///
/// Backed by a pipe; the read end is polled alongside the mount table and
/// `cancel` writes a single byte to the write end.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Result<Self> {
        let (read, write) =
            nix::unistd::pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK).context(CancelPipeSnafu)?;
        Ok(Self {
            inner: Arc::new(CancelInner {
                read,
                write,
                cancelled: AtomicBool::new(false),
            }),
        })
    }

    /// Fires the token. Calling it more than once has no further effect.
    pub fn cancel(&self) -> Result<()> {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        nix::unistd::write(&self.inner.write, &[1u8]).context(CancelPipeSnafu)?;
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn poll_fd(&self) -> BorrowedFd<'_> {
        self.inner.read.as_fd()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Watches a `/proc/mounts`-style file through its poll events.
#[derive(Debug, Clone)]
pub struct ProcMountsWatcher {
    path: PathBuf,
    cancel: Option<CancelToken>,
}

impl ProcMountsWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cancel: None,
        }
    }

    /// Makes subscriptions from this watcher wake up when `token` fires.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ProcMountsWatcher {
    fn default() -> Self {
        Self::new(PROC_MOUNTS)
    }
}

impl ChangeWatcher for ProcMountsWatcher {
    type Subscription = ProcMountsSubscription;

    fn subscribe(&self) -> Result<ProcMountsSubscription> {
        let file = File::open(&self.path).watch_open_context(&self.path)?;
        debug!("watching {} for mount changes", self.path.display());

        Ok(ProcMountsSubscription {
            path: self.path.clone(),
            file,
            cancel: self.cancel.clone(),
        })
    }
}

/// Open descriptor on the mount table; closed on drop.
#[derive(Debug)]
pub struct ProcMountsSubscription {
    path: PathBuf,
    file: File,
    cancel: Option<CancelToken>,
}

impl ChangeSubscription for ProcMountsSubscription {
    fn wait(&mut self) -> Result<Wake> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Ok(Wake::Cancelled);
        }

        let mut fds = vec![PollFd::new(
            self.file.as_fd(),
            PollFlags::POLLERR | PollFlags::POLLPRI,
        )];
        if let Some(cancel) = &self.cancel {
            fds.push(PollFd::new(cancel.poll_fd(), PollFlags::POLLIN));
        }

        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Wake::Spurious),
            Err(source) => {
                return Err(Error::WatchPoll {
                    path: self.path.clone(),
                    source,
                });
            }
        }

        let cancelled = fds
            .get(1)
            .and_then(|fd| fd.revents())
            .is_some_and(|revents| revents.contains(PollFlags::POLLIN));
        if cancelled {
            return Ok(Wake::Cancelled);
        }

        let revents = fds[0].revents().unwrap_or(PollFlags::empty());
        if revents.contains(PollFlags::POLLNVAL) {
            return Err(Error::WatchPoll {
                path: self.path.clone(),
                source: Errno::EBADF,
            });
        }
        if revents.intersects(PollFlags::POLLERR | PollFlags::POLLPRI) {
            Ok(Wake::Changed)
        } else {
            Ok(Wake::Spurious)
        }
    }
}

impl Drop for ProcMountsSubscription {
    fn drop(&mut self) {
        debug!("released watch on {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cancel_token_is_idempotent() {
        let token = CancelToken::new().unwrap();
        assert!(!token.is_cancelled());

        token.cancel().unwrap();
        token.cancel().unwrap();
        assert!(token.is_cancelled());

        let clone = token.clone();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_subscribe_missing_table() {
        let watcher = ProcMountsWatcher::new("/nonexistent/mounts");
        assert!(matches!(
            watcher.subscribe(),
            Err(Error::WatchOpen { .. })
        ));
    }

    #[test]
    fn test_wait_returns_cancelled_when_already_cancelled() {
        let temp_file = NamedTempFile::new().unwrap();
        let token = CancelToken::new().unwrap();
        token.cancel().unwrap();

        let watcher = ProcMountsWatcher::new(temp_file.path()).with_cancel(token);
        let mut subscription = watcher.subscribe().unwrap();

        assert_eq!(subscription.wait().unwrap(), Wake::Cancelled);
    }

    #[test]
    fn test_wait_wakes_on_cancel_from_other_thread() {
        // A regular file never reports POLLPRI, so only the token can wake us.
        let temp_file = NamedTempFile::new().unwrap();
        let token = CancelToken::new().unwrap();

        let watcher = ProcMountsWatcher::new(temp_file.path()).with_cancel(token.clone());
        let mut subscription = watcher.subscribe().unwrap();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel().unwrap();
        });

        assert_eq!(subscription.wait().unwrap(), Wake::Cancelled);
        canceller.join().unwrap();
    }
}
