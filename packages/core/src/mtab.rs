//! Live mount table parsing module.
//!
//! This module reads the kernel's table of currently mounted filesystems
//! (`/proc/mounts`) into `MountEntry` records. The table is never cached:
//! every `MountTable::read` produces a fresh snapshot.

use std::ffi::OsString;
use std::fs;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

/// Default mount table path.
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Represents a single line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// The mounted filesystem source (e.g., "/dev/mmcblk0p1", "tmpfs").
    pub fs_name: String,
    /// Directory the filesystem is attached to.
    pub dir: PathBuf,
    /// Filesystem type (e.g., "vfat", "ext4").
    pub fs_type: String,
    /// Mount options.
    pub options: Vec<String>,
    /// Dump frequency, always 0 in `/proc/mounts`.
    pub freq: u32,
    /// fsck pass number, always 0 in `/proc/mounts`.
    pub passno: u32,
}

impl MountEntry {
    /// Parses a single mount table line into an entry.
    ///
    /// Returns None for comments, empty lines and lines missing one of the
    /// four mandatory fields. The trailing freq/passno fields are optional.
    /// Paths are kept as raw bytes, so non-UTF-8 directories still match.
    pub fn from_line(line: impl AsRef<[u8]>) -> Option<Self> {
        let line = line.as_ref().trim_ascii();

        if line.is_empty() || line.starts_with(b"#") {
            return None;
        }

        let parts: Vec<&[u8]> = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|field| !field.is_empty())
            .collect();
        if parts.len() < 4 {
            return None;
        }

        let text = |field: &[u8]| String::from_utf8_lossy(field).into_owned();
        let numeric = |idx: usize| {
            parts
                .get(idx)
                .and_then(|field| std::str::from_utf8(field).ok())
                .and_then(|field| field.parse::<u32>().ok())
                .unwrap_or(0)
        };

        Some(Self {
            fs_name: text(unescape_mount_field(parts[0]).as_slice()),
            dir: PathBuf::from(OsString::from_vec(unescape_mount_field(parts[1]))),
            fs_type: text(parts[2]),
            options: parts[3].split(|&b| b == b',').map(text).collect(),
            freq: numeric(4),
            passno: numeric(5),
        })
    }
}

/// Decodes the octal escapes the kernel uses for whitespace and backslash.
///
/// Only complete three-digit sequences are decoded; anything else is kept
/// verbatim.
fn unescape_mount_field(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let digits = input.get(i + 1..i + 4);
        if input[i] == b'\\'
            && let Some(digits) = digits
            && digits.iter().all(|d| (b'0'..=b'7').contains(d))
            && let Some(byte) = octal_byte(digits)
        {
            result.push(byte);
            i += 4;
            continue;
        }
        result.push(input[i]);
        i += 1;
    }
    result
}

fn octal_byte(digits: &[u8]) -> Option<u8> {
    let value = digits
        .iter()
        .fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
    u8::try_from(value).ok()
}

/// Snapshot of the mount table, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTable {
    pub entries: Vec<MountEntry>,
}

impl MountTable {
    /// Parses mount table content, skipping lines that are not entries.
    pub fn parse(content: impl AsRef<[u8]>) -> Self {
        Self {
            entries: content
                .as_ref()
                .split(|&b| b == b'\n')
                .filter_map(MountEntry::from_line)
                .collect(),
        }
    }

    /// Reads and parses the mount table at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read(path).mount_table_context(path)?;
        Ok(Self::parse(&content))
    }

    /// Returns the first entry whose directory is exactly `dir`.
    ///
    /// No canonicalization or prefix matching is done: `/mnt/onboard/`
    /// does not match an entry for `/mnt/onboard`.
    pub fn find(&self, dir: &Path) -> Option<&MountEntry> {
        self.entries
            .iter()
            .find(|entry| entry.dir.as_os_str() == dir.as_os_str())
    }
}
