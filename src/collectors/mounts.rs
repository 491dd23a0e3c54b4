//! Mount table discovery.
//!
//! Turns `/proc/mounts` into the set of physically distinct filesystems worth
//! measuring. Bind mounts and other repeated mounts of one device collapse to
//! the first line that names the device.

use crate::collectors::host::HostFs;
use crate::config::DiskSpaceConfig;
use crate::error::CollectError;
use crate::models::filesystem::FilesystemEntry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// One parsed line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountLine {
    pub device:      String,
    pub mount_point: PathBuf,
    pub fs_type:     String,
    pub options:     String,
}

/// Parse `device mountpoint fstype options dump pass`.
///
/// Returns `None` unless the line has exactly six whitespace-separated fields.
pub fn parse_mount_line(line: &str) -> Option<MountLine> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 6 { return None; }

    Some(MountLine {
        device:      unescape(fields[0]),
        mount_point: PathBuf::from(unescape(fields[1])),
        fs_type:     fields[2].to_string(),
        options:     fields[3].to_string(),
    })
}

/// Decode the `\ooo` escapes the kernel writes for space, tab, newline and
/// backslash inside mount table fields.
fn unescape(field: &str) -> String {
    if !field.contains('\\') { return field.to_string(); }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_triplet(&bytes[i + 1..i + 4]) {
            let b = bytes[i + 1..i + 4].iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            out.push(b as u8);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_triplet(digits: &[u8]) -> bool {
    digits.len() == 3
        && digits.iter().all(|d| (b'0'..=b'7').contains(d))
        && digits[0] <= b'3'
}

/// Which mount table lines are worth measuring.
#[derive(Debug, Clone, Default)]
pub struct MountFilter {
    /// Allow-list of filesystem types. Empty means "anything not excluded".
    pub filesystems:         HashSet<String>,
    pub exclude_fs_types:    HashSet<String>,
    /// Matched per path component: `/proc` covers `/proc/sys`, not `/processing`.
    pub exclude_mount_paths: Vec<PathBuf>,
}

impl MountFilter {
    pub fn from_config(cfg: &DiskSpaceConfig) -> Self {
        Self {
            filesystems:         cfg.filesystems.iter().cloned().collect(),
            exclude_fs_types:    cfg.exclude_fs_types.iter().cloned().collect(),
            exclude_mount_paths: cfg.exclude_mount_paths.clone(),
        }
    }

    /// Returns why `mount` is rejected, or `None` if it should be measured.
    pub fn rejection(&self, mount: &MountLine) -> Option<&'static str> {
        if self.exclude_fs_types.contains(&mount.fs_type) {
            return Some("filesystem type is excluded");
        }
        if !self.filesystems.is_empty() && !self.filesystems.contains(&mount.fs_type) {
            return Some("filesystem type is not in the allowed list");
        }
        if !mount.mount_point.is_absolute() {
            return Some("mount point is not an absolute path");
        }
        if self.is_excluded_path(&mount.mount_point) {
            return Some("mount point is excluded");
        }
        if !looks_like_storage(&mount.device) {
            return Some("source is not a block device, network share or tmpfs");
        }
        None
    }

    fn is_excluded_path(&self, mount_point: &Path) -> bool {
        self.exclude_mount_paths.iter().any(|p| mount_point.starts_with(p))
    }
}

// Pseudo filesystems name their source "none", "proc", "sysfs" and so on.
fn looks_like_storage(device: &str) -> bool {
    device.contains('/') || device.contains(':') || device == "tmpfs"
}

/// Reads the mount table through a `HostFs` and keeps one entry per device.
pub struct MountTableReader<'a, H: HostFs> {
    host:   &'a H,
    filter: &'a MountFilter,
}

impl<'a, H: HostFs> MountTableReader<'a, H> {
    pub fn new(host: &'a H, filter: &'a MountFilter) -> Self {
        Self { host, filter }
    }

    /// Distinct filesystems in mount table order.
    ///
    /// When several lines resolve to the same device id, the first one wins.
    /// Lines whose mount point is inaccessible or cannot be stat'ed are
    /// skipped. Fails only when the mount table cannot be opened.
    pub fn discover(&self) -> Result<Vec<FilesystemEntry>, CollectError> {
        let table = self.host.read_mount_table().map_err(|source| CollectError::Configuration {
            path: self.host.mount_table_path().to_path_buf(),
            source,
        })?;

        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for (idx, line) in table.lines().enumerate() {
            if line.trim().is_empty() { continue; }

            let Some(mount) = parse_mount_line(line) else {
                debug!(line = idx + 1, "skipping malformed mount table line: {:?}", line);
                continue;
            };

            if let Some(reason) = self.filter.rejection(&mount) {
                trace!(mount_point = %mount.mount_point.display(), fs_type = %mount.fs_type, "ignoring: {}", reason);
                continue;
            }

            if !self.host.is_accessible_dir(&mount.mount_point) {
                debug!(mount_point = %mount.mount_point.display(), "mount point is not an accessible directory - skipping");
                continue;
            }

            let device_id = match self.host.device_id_of(&mount.mount_point) {
                Ok(id) => id,
                Err(e) => {
                    debug!(mount_point = %mount.mount_point.display(), "path is not mounted - skipping: {}", e);
                    continue;
                }
            };

            if !seen.insert(device_id) {
                debug!(mount_point = %mount.mount_point.display(), %device_id, "device already seen at an earlier mount point");
                continue;
            }

            trace!(mount_point = %mount.mount_point.display(), %device_id, options = %mount.options, "accepted");
            found.push(FilesystemEntry {
                device:      mount.device,
                fs_type:     mount.fs_type,
                mount_point: mount.mount_point,
                device_id,
            });
        }

        Ok(found)
    }
}
