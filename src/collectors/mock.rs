//! In-memory `HostFs` for exercising discovery and measurement in tests.

use crate::collectors::host::HostFs;
use crate::models::filesystem::{CapacitySample, DeviceId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct MockHost {
    /// `None` simulates a mount table that cannot be opened.
    mount_table: Option<String>,
    device_ids:  HashMap<PathBuf, DeviceId>,
    capacities:  HashMap<PathBuf, CapacitySample>,
    accessible:  HashSet<PathBuf>,
    /// Every path passed to `device_id_of`, in call order.
    stat_calls:  RefCell<Vec<PathBuf>>,
}

impl MockHost {
    pub fn new(mount_table: impl Into<String>) -> Self {
        Self { mount_table: Some(mount_table.into()), ..Default::default() }
    }

    pub fn without_mount_table() -> Self {
        Self::default()
    }

    /// Registers a mounted directory: accessible, with a device id and
    /// optionally a capacity sample.
    pub fn mount(mut self, path: &str, id: DeviceId, sample: Option<CapacitySample>) -> Self {
        let path = PathBuf::from(path);
        self.accessible.insert(path.clone());
        self.device_ids.insert(path.clone(), id);
        if let Some(s) = sample {
            self.capacities.insert(path, s);
        }
        self
    }

    /// A directory that passes the access check but has nothing mounted.
    pub fn accessible_dir(mut self, path: &str) -> Self {
        self.accessible.insert(PathBuf::from(path));
        self
    }

    pub fn inaccessible(mut self, path: &str) -> Self {
        self.accessible.remove(Path::new(path));
        self
    }

    pub fn stat_calls(&self) -> Vec<PathBuf> {
        self.stat_calls.borrow().clone()
    }
}

fn not_found(what: &str, path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found: {:?}", what, path))
}

impl HostFs for MockHost {
    fn read_mount_table(&self) -> io::Result<String> {
        self.mount_table
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::PermissionDenied, "mount table unreadable"))
    }

    fn device_id_of(&self, path: &Path) -> io::Result<DeviceId> {
        self.stat_calls.borrow_mut().push(path.to_path_buf());
        self.device_ids.get(path).copied().ok_or_else(|| not_found("device", path))
    }

    fn capacity_of(&self, path: &Path) -> io::Result<CapacitySample> {
        self.capacities.get(path).copied().ok_or_else(|| not_found("filesystem", path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.accessible.contains(path) || self.device_ids.contains_key(path) || self.capacities.contains_key(path)
    }

    fn is_accessible_dir(&self, path: &Path) -> bool {
        self.accessible.contains(path)
    }

    fn mount_table_path(&self) -> &Path {
        Path::new("/proc/mounts")
    }
}

/// Mount table captured from a host with one real disk and the usual
/// collection of pseudo filesystems.
pub const PROC_MOUNTS_FIXTURE: &str = "\
rootfs / rootfs rw 0 0
none /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
none /proc proc rw,nosuid,nodev,noexec,relatime 0 0
none /dev devtmpfs rw,relatime,size=24769364k,nr_inodes=6192341,mode=755 0 0
none /dev/pts devpts rw,nosuid,noexec,relatime,gid=5,mode=620,ptmxmode=000 0 0
/dev/disk/by-uuid/81969733-a724-4651-9cf5-64970f86daba / ext3 rw,relatime,errors=remount-ro 0 1
none /sys/fs/fuse/connections fusectl rw,relatime 0 0
none /sys/kernel/debug debugfs rw,relatime 0 0
none /sys/kernel/security securityfs rw,relatime 0 0
none /dev/shm tmpfs rw,nosuid,nodev,relatime 0 0
none /var/run tmpfs rw,nosuid,relatime,mode=755 0 0
none /var/lock tmpfs rw,nosuid,nodev,noexec,relatime 0 0
none /lib/init/rw tmpfs rw,nosuid,relatime,mode=755 0 0
";

pub fn root_sample() -> CapacitySample {
    CapacitySample {
        block_size:    4096,
        fragment_size: 4096,
        total_blocks:  360_540_255,
        free_blocks:   285_953_527,
        avail_blocks:  267_639_130,
        total_inodes:  91_578_368,
        free_inodes:   91_229_495,
        avail_inodes:  91_229_495,
    }
}
