//! One collection cycle: discover, measure, emit.

use crate::collectors::capacity::{metric_prefix, CapacityMetricsComputer};
use crate::collectors::host::HostFs;
use crate::collectors::mounts::{MountFilter, MountTableReader};
use crate::config::DiskSpaceConfig;
use crate::error::CollectError;
use crate::models::filesystem::{CapacitySample, FilesystemEntry};
use crate::models::metric::Metric;
use crate::models::unit::ByteUnit;
use crate::sink::MetricSink;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// A filesystem that answered its capacity query this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredFilesystem {
    pub path:   PathBuf,
    pub prefix: String,
    /// Absent in single-path mode, where the mount table is not consulted.
    pub entry:  Option<FilesystemEntry>,
    pub sample: CapacitySample,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub filesystems: Vec<MeasuredFilesystem>,
    /// Filesystems whose capacity query failed and were left out.
    pub failures:    usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub filesystems: usize,
    pub metrics:     usize,
    pub failures:    usize,
}

pub struct DiskSpaceCollector<H: HostFs> {
    host:   H,
    filter: MountFilter,
    units:  Vec<ByteUnit>,
    path:   Option<PathBuf>,
}

impl<H: HostFs> DiskSpaceCollector<H> {
    pub fn new(host: H, cfg: &DiskSpaceConfig) -> Self {
        Self {
            host,
            filter: MountFilter::from_config(cfg),
            units:  cfg.units(),
            path:   cfg.path.clone(),
        }
    }

    pub fn units(&self) -> &[ByteUnit] {
        &self.units
    }

    /// Distinct filesystems from the mount table.
    pub fn discover(&self) -> Result<Vec<FilesystemEntry>, CollectError> {
        MountTableReader::new(&self.host, &self.filter).discover()
    }

    /// Measure every target. Per-filesystem failures are logged and counted.
    pub fn snapshot(&self) -> Result<Snapshot, CollectError> {
        let computer = CapacityMetricsComputer::new(&self.host, &self.units);
        let mut snap = Snapshot::default();

        let targets: Vec<(PathBuf, Option<FilesystemEntry>)> = match &self.path {
            Some(path) => match self.single_path_target(path) {
                Some(p) => vec![(p, None)],
                None    => return Ok(snap),
            },
            None => self.discover()?
                .into_iter()
                .map(|e| (e.mount_point.clone(), Some(e)))
                .collect(),
        };

        for (path, entry) in targets {
            match computer.measure(&path) {
                Ok(sample) => snap.filesystems.push(MeasuredFilesystem {
                    prefix: metric_prefix(&path),
                    path,
                    entry,
                    sample,
                }),
                Err(e) => {
                    warn!("{}", e);
                    snap.failures += 1;
                }
            }
        }

        if snap.filesystems.is_empty() {
            error!("no diskspace metrics retrieved");
        }
        Ok(snap)
    }

    /// Metric pairs for one measured filesystem.
    pub fn metrics_for(&self, fs: &MeasuredFilesystem) -> Vec<Metric> {
        CapacityMetricsComputer::new(&self.host, &self.units).metrics(&fs.prefix, &fs.sample)
    }

    /// Run one cycle and publish every metric to `sink`.
    pub fn collect(&self, sink: &mut dyn MetricSink) -> Result<CycleSummary, CollectError> {
        let snap = self.snapshot()?;
        let mut summary = CycleSummary {
            filesystems: snap.filesystems.len(),
            metrics:     0,
            failures:    snap.failures,
        };

        for fs in &snap.filesystems {
            debug!(
                mount_point = %fs.path.display(),
                total_bytes = fs.sample.total_bytes(),
                avail_pct = %format!("{:.1}", fs.sample.avail_pct()),
                "measured"
            );
            for metric in self.metrics_for(fs) {
                sink.publish(&metric).map_err(CollectError::Publish)?;
                summary.metrics += 1;
            }
        }
        sink.flush().map_err(CollectError::Publish)?;

        Ok(summary)
    }

    fn single_path_target(&self, path: &Path) -> Option<PathBuf> {
        if !self.host.exists(path) {
            warn!(path = %path.display(), "configured path does not exist - nothing to measure");
            return None;
        }
        Some(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::mock::{root_sample, MockHost, PROC_MOUNTS_FIXTURE};
    use crate::models::filesystem::DeviceId;

    fn config() -> DiskSpaceConfig {
        DiskSpaceConfig::default()
    }

    fn small_sample(free: u64) -> CapacitySample {
        CapacitySample {
            block_size:    1024,
            fragment_size: 1024,
            total_blocks:  2048,
            free_blocks:   free,
            avail_blocks:  free,
            total_inodes:  100,
            free_inodes:   40,
            avail_inodes:  30,
        }
    }

    #[test]
    fn test_collect_real_data_fixture() {
        let host = MockHost::new(PROC_MOUNTS_FIXTURE)
            .mount("/", DeviceId::new(9, 0), Some(root_sample()));
        let collector = DiskSpaceCollector::new(host, &config());

        let mut published: Vec<Metric> = Vec::new();
        let summary = collector.collect(&mut published).unwrap();

        assert_eq!(published, vec![
            Metric::gauge("root.gigabyte_used", 284.53, 2),
            Metric::gauge("root.gigabyte_free", 1090.83, 2),
            Metric::gauge("root.gigabyte_avail", 1020.96, 2),
            Metric::count("root.inodes_used", 348_873),
            Metric::count("root.inodes_free", 91_229_495),
            Metric::count("root.inodes_avail", 91_229_495),
        ]);
        assert_eq!(summary, CycleSummary { filesystems: 1, metrics: 6, failures: 0 });
    }

    #[test]
    fn test_one_failing_filesystem_does_not_stop_the_rest() {
        let table = "\
/dev/sda1 / ext4 rw 0 0
server:/export /mnt/nfs nfs4 rw 0 0
/dev/sdb1 /var/log xfs rw 0 0
";
        let host = MockHost::new(table)
            .mount("/", DeviceId::new(8, 1), Some(small_sample(1024)))
            .mount("/mnt/nfs", DeviceId::new(0, 51), None)
            .mount("/var/log", DeviceId::new(8, 17), Some(small_sample(512)));
        let mut cfg = config();
        cfg.byte_unit = vec![ByteUnit::Kilobyte];
        let collector = DiskSpaceCollector::new(host, &cfg);

        let mut published: Vec<Metric> = Vec::new();
        let summary = collector.collect(&mut published).unwrap();

        assert_eq!(summary, CycleSummary { filesystems: 2, metrics: 12, failures: 1 });
        assert!(published.iter().all(|m| !m.name.starts_with("mnt.nfs")));
        assert!(published.contains(&Metric::gauge("root.kilobyte_used", 1024.0, 2)));
        assert!(published.contains(&Metric::gauge("var.log.kilobyte_used", 1536.0, 2)));
        assert!(published.contains(&Metric::count("var.log.inodes_avail", 30)));
    }

    #[test]
    fn test_unreadable_mount_table_fails_the_cycle() {
        let collector = DiskSpaceCollector::new(MockHost::without_mount_table(), &config());
        let mut published: Vec<Metric> = Vec::new();
        let err = collector.collect(&mut published).unwrap_err();
        assert!(matches!(err, CollectError::Configuration { .. }));
        assert!(published.is_empty());
    }

    #[test]
    fn test_empty_mount_table_emits_nothing() {
        let collector = DiskSpaceCollector::new(MockHost::new(""), &config());
        let mut published: Vec<Metric> = Vec::new();
        let summary = collector.collect(&mut published).unwrap();
        assert_eq!(summary, CycleSummary::default());
    }

    #[test]
    fn test_single_path_mode_bypasses_mount_table() {
        let host = MockHost::without_mount_table()
            .mount("/srv/data", DeviceId::new(8, 3), Some(small_sample(0)));
        let mut cfg = config();
        cfg.path = Some(PathBuf::from("/srv/data"));
        let collector = DiskSpaceCollector::new(host, &cfg);

        let snap = collector.snapshot().unwrap();
        assert_eq!(snap.filesystems.len(), 1);
        assert_eq!(snap.filesystems[0].prefix, "srv.data");
        assert!(snap.filesystems[0].entry.is_none());

        let mut published: Vec<Metric> = Vec::new();
        collector.collect(&mut published).unwrap();
        assert_eq!(published[0], Metric::gauge("srv.data.gigabyte_used", 0.0, 2));
    }

    #[test]
    fn test_single_path_mode_missing_path_is_not_fatal() {
        let mut cfg = config();
        cfg.path = Some(PathBuf::from("/does/not/exist"));
        let collector = DiskSpaceCollector::new(MockHost::without_mount_table(), &cfg);

        let mut published: Vec<Metric> = Vec::new();
        let summary = collector.collect(&mut published).unwrap();
        assert_eq!(summary, CycleSummary::default());
        assert!(published.is_empty());
    }

    #[test]
    fn test_cycles_are_idempotent() {
        let host = MockHost::new(PROC_MOUNTS_FIXTURE)
            .mount("/", DeviceId::new(9, 0), Some(root_sample()));
        let collector = DiskSpaceCollector::new(host, &config());
        assert_eq!(collector.discover().unwrap(), collector.discover().unwrap());
        assert_eq!(collector.snapshot().unwrap(), collector.snapshot().unwrap());
    }
}
