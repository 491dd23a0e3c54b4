use crate::collectors::host::DEFAULT_MOUNTS_PATH;
use crate::models::unit::ByteUnit;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub diskspace: DiskSpaceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Seconds between collection cycles
    pub interval_sec: u64,
    /// Prepended to every metric name on output ("" = none)
    pub metric_prefix: String,
    /// Mount table to read
    pub mounts_path: PathBuf,
    /// Upper bound for one statvfs call in milliseconds (0 = unbounded)
    pub stat_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskSpaceConfig {
    /// Units to emit space metrics in. A single name or a list.
    #[serde(deserialize_with = "one_or_many_units")]
    pub byte_unit: Vec<ByteUnit>,
    /// Only measure these filesystem types (empty = all types not excluded)
    pub filesystems: Vec<String>,
    /// Filesystem types never measured
    pub exclude_fs_types: Vec<String>,
    /// Mount points never measured, including everything below them
    pub exclude_mount_paths: Vec<PathBuf>,
    /// Measure only this path instead of scanning the mount table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl DiskSpaceConfig {
    /// Configured units in order, without repeats. Falls back to gigabyte.
    pub fn units(&self) -> Vec<ByteUnit> {
        let mut out: Vec<ByteUnit> = Vec::new();
        for u in &self.byte_unit {
            if !out.contains(u) { out.push(*u); }
        }
        if out.is_empty() { out.push(ByteUnit::default()); }
        out
    }
}

impl GeneralConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_sec.max(1))
    }

    pub fn stat_timeout(&self) -> Duration {
        Duration::from_millis(self.stat_timeout_ms)
    }
}

fn one_or_many_units<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ByteUnit>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(ByteUnit),
        Many(Vec<ByteUnit>),
    }

    Ok(match OneOrMany::deserialize(d)? {
        OneOrMany::One(u)   => vec![u],
        OneOrMany::Many(us) => us,
    })
}

// ── Defaults ─────────────────────────────────────────────────────────

/// Pseudo and virtual filesystems that never hold user data.
const DEFAULT_EXCLUDED_FS: &[&str] = &[
    "proc", "sysfs", "devpts", "tmpfs", "devtmpfs", "cgroup", "cgroup2",
    "pstore", "efivarfs", "securityfs", "debugfs", "tracefs", "bpf",
    "hugetlbfs", "mqueue", "fusectl", "configfs", "binfmt_misc",
    "overlay", "nsfs", "rpc_pipefs", "autofs", "squashfs", "rootfs", "ramfs",
];

const DEFAULT_EXCLUDED_PATHS: &[&str] = &["/proc", "/sys", "/dev", "/run/user"];

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            interval_sec:    10,
            metric_prefix:   "diskspace".into(),
            mounts_path:     PathBuf::from(DEFAULT_MOUNTS_PATH),
            stat_timeout_ms: 0,
        }
    }
}

impl Default for DiskSpaceConfig {
    fn default() -> Self {
        Self {
            byte_unit:           vec![ByteUnit::Gigabyte],
            filesystems:         Vec::new(),
            exclude_fs_types:    DEFAULT_EXCLUDED_FS.iter().map(|s| s.to_string()).collect(),
            exclude_mount_paths: DEFAULT_EXCLUDED_PATHS.iter().map(PathBuf::from).collect(),
            path:                None,
        }
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    /// Load from `explicit` if given, otherwise from the per-user config file.
    ///
    /// A missing per-user file yields defaults and is written out on a best
    /// effort basis. A file that exists but does not parse is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return load_from(path);
        }

        match Config::config_path() {
            Some(path) if path.exists() => load_from(&path),
            _ => {
                let _ = try_write_defaults();
                Ok(Config::default())
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dspace").join("dspace.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

fn load_from(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Config::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn try_write_defaults() -> Result<()> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# dspace configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}
