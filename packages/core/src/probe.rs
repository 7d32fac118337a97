//! Mountpoint state probing module.
//!
//! A probe is a single, non-blocking scan of the current mount table that
//! answers whether a mountpoint is in the requested state.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mtab::{MountTable, PROC_MOUNTS};

/// The state a mountpoint can be observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountState {
    Mounted,
    Unmounted,
}

impl MountState {
    /// Maps a "should be mounted" flag to a state.
    pub fn from_mounted(mounted: bool) -> Self {
        if mounted {
            Self::Mounted
        } else {
            Self::Unmounted
        }
    }

    pub fn is_mounted(self) -> bool {
        self == Self::Mounted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mounted => "mounted",
            Self::Unmounted => "unmounted",
        }
    }
}

impl From<bool> for MountState {
    fn from(mounted: bool) -> Self {
        Self::from_mounted(mounted)
    }
}

impl std::fmt::Display for MountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mountpoint together with the state the caller wants it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTarget {
    pub mount_point: PathBuf,
    pub state: MountState,
}

impl MountTarget {
    pub fn new(mount_point: impl Into<PathBuf>, state: impl Into<MountState>) -> Self {
        Self {
            mount_point: mount_point.into(),
            state: state.into(),
        }
    }
}

/// Provider of mount table snapshots.
pub trait MountSource {
    /// Takes a fresh snapshot of the mount table.
    fn snapshot(&self) -> Result<MountTable>;
}

/// Mount table backed by a file in `/proc/mounts` format.
#[derive(Debug, Clone)]
pub struct ProcMounts {
    path: PathBuf,
}

impl ProcMounts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ProcMounts {
    fn default() -> Self {
        Self::new(PROC_MOUNTS)
    }
}

impl MountSource for ProcMounts {
    fn snapshot(&self) -> Result<MountTable> {
        MountTable::read(&self.path)
    }
}

/// Checks the live `/proc/mounts` for `mount_point` being in `desired` state.
pub fn probe(desired: impl Into<MountState>, mount_point: impl AsRef<Path>) -> bool {
    probe_with(&ProcMounts::default(), desired.into(), mount_point.as_ref())
}

/// Checks `source` for `mount_point` being in `desired` state.
///
/// An unreadable table counts as empty, so the mountpoint is reported as
/// unmounted.
pub fn probe_with<S: MountSource + ?Sized>(
    source: &S,
    desired: MountState,
    mount_point: &Path,
) -> bool {
    let table = source.snapshot().unwrap_or_else(|e| {
        warn!("{}; treating mount table as empty", e);
        MountTable::default()
    });

    let is_mounted = match table.find(mount_point) {
        Some(entry) => {
            info!(
                "fs {} is mounted on {}",
                entry.fs_name,
                entry.dir.display()
            );
            true
        }
        None => false,
    };

    is_mounted == desired.is_mounted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct StaticSource(&'static str);

    impl MountSource for StaticSource {
        fn snapshot(&self) -> Result<MountTable> {
            Ok(MountTable::parse(self.0))
        }
    }

    struct BrokenSource;

    impl MountSource for BrokenSource {
        fn snapshot(&self) -> Result<MountTable> {
            MountTable::read(Path::new("/nonexistent/mounts"))
        }
    }

    const WITH_ONBOARD: &str = "\
proc /proc proc rw 0 0
/dev/mmcblk0p1 /mnt/onboard vfat rw 0 0
";

    const WITHOUT_ONBOARD: &str = "\
proc /proc proc rw 0 0
/dev/sda1 /mnt/sd vfat rw 0 0
";

    #[test]
    fn test_mount_state_from_bool() {
        assert_eq!(MountState::from(true), MountState::Mounted);
        assert_eq!(MountState::from(false), MountState::Unmounted);
        assert_eq!(MountState::Mounted.to_string(), "mounted");
    }

    #[test]
    fn test_probe_mounted() {
        let source = StaticSource(WITH_ONBOARD);
        let onboard = Path::new("/mnt/onboard");

        assert!(probe_with(&source, MountState::Mounted, onboard));
        assert!(!probe_with(&source, MountState::Unmounted, onboard));
    }

    #[test]
    fn test_probe_unmounted() {
        let source = StaticSource(WITHOUT_ONBOARD);
        let onboard = Path::new("/mnt/onboard");

        assert!(!probe_with(&source, MountState::Mounted, onboard));
        assert!(probe_with(&source, MountState::Unmounted, onboard));
    }

    #[test]
    fn test_probe_requires_exact_path() {
        let source = StaticSource(WITH_ONBOARD);

        assert!(!probe_with(&source, MountState::Mounted, Path::new("/mnt/onboard/")));
        assert!(!probe_with(&source, MountState::Mounted, Path::new("/mnt")));
    }

    #[test]
    fn test_probe_is_idempotent() {
        let source = StaticSource(WITH_ONBOARD);
        let onboard = Path::new("/mnt/onboard");

        let first = probe_with(&source, MountState::Mounted, onboard);
        for _ in 0..3 {
            assert_eq!(probe_with(&source, MountState::Mounted, onboard), first);
        }
    }

    #[test]
    fn test_probe_unreadable_table_is_unmounted() {
        let onboard = Path::new("/mnt/onboard");

        assert!(!probe_with(&BrokenSource, MountState::Mounted, onboard));
        assert!(probe_with(&BrokenSource, MountState::Unmounted, onboard));
    }

    #[test]
    fn test_probe_proc_mounts_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(WITH_ONBOARD.as_bytes()).unwrap();
        let source = ProcMounts::new(temp_file.path());

        assert!(probe_with(&source, MountState::Mounted, Path::new("/mnt/onboard")));
        assert!(probe_with(&source, MountState::Unmounted, Path::new("/mnt/sd")));
    }

    #[test]
    fn test_mounted_beside_non_utf8_entry() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"/dev/mmcblk0p1 /mnt/onboard vfat rw 0 0\n/dev/sda1 /media/caf\xe9 vfat rw 0 0\n")
            .unwrap();
        let source = ProcMounts::new(temp_file.path());
        let onboard = Path::new("/mnt/onboard");

        assert!(probe_with(&source, MountState::Mounted, onboard));
        assert!(!probe_with(&source, MountState::Unmounted, onboard));
    }
}
