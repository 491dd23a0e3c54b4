//! Capacity measurement and metric derivation.

use crate::collectors::host::HostFs;
use crate::error::CollectError;
use crate::models::filesystem::CapacitySample;
use crate::models::metric::Metric;
use crate::models::unit::{round_to, ByteUnit};
use std::path::Path;

/// Decimal places kept for unit-converted space metrics.
pub const SPACE_PRECISION: u32 = 2;

/// Metric name prefix for a mount point: `/` is "root", `/var/log` is "var.log".
pub fn metric_prefix(mount_point: &Path) -> String {
    let s = mount_point.to_string_lossy();
    let rest = s.strip_prefix('/').unwrap_or(&s);
    if rest.is_empty() {
        return "root".to_string();
    }
    rest.replace('/', ".")
}

pub struct CapacityMetricsComputer<'a, H: HostFs> {
    host:  &'a H,
    units: &'a [ByteUnit],
}

impl<'a, H: HostFs> CapacityMetricsComputer<'a, H> {
    pub fn new(host: &'a H, units: &'a [ByteUnit]) -> Self {
        Self { host, units }
    }

    pub fn measure(&self, path: &Path) -> Result<CapacitySample, CollectError> {
        self.host.capacity_of(path).map_err(|source| CollectError::Stat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Space metrics for each unit in order, then the three inode counts.
    pub fn metrics(&self, prefix: &str, sample: &CapacitySample) -> Vec<Metric> {
        let mut out = Vec::with_capacity(self.units.len() * 3 + 3);

        for unit in self.units {
            let space = [
                ("used",  sample.used_bytes()),
                ("free",  sample.free_bytes()),
                ("avail", sample.avail_bytes()),
            ];
            for (kind, bytes) in space {
                let value = round_to(unit.convert(bytes), SPACE_PRECISION);
                out.push(Metric::gauge(format!("{}.{}_{}", prefix, unit.name(), kind), value, SPACE_PRECISION));
            }
        }

        out.push(Metric::count(format!("{}.inodes_used", prefix),  sample.inodes_used()));
        out.push(Metric::count(format!("{}.inodes_free", prefix),  sample.inodes_free()));
        out.push(Metric::count(format!("{}.inodes_avail", prefix), sample.inodes_avail()));
        out
    }
}
