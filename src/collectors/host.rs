//! Host capability interface.
//!
//! Everything the collector needs from the operating system goes through the
//! `HostFs` trait, so discovery and measurement can run against the real
//! kernel interfaces or against an in-memory fake in tests.

use crate::models::filesystem::{CapacitySample, DeviceId};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MOUNTS_PATH: &str = "/proc/mounts";

/// Narrow view of the OS used by discovery and measurement.
pub trait HostFs {
    /// Returns the raw text of the mount table.
    ///
    /// An error here means the table could not be opened at all; an empty
    /// table is `Ok("")`.
    fn read_mount_table(&self) -> io::Result<String>;

    /// Returns the (major, minor) identity of the device backing `path`.
    fn device_id_of(&self, path: &Path) -> io::Result<DeviceId>;

    /// Returns the statvfs counters for the filesystem containing `path`.
    fn capacity_of(&self, path: &Path) -> io::Result<CapacitySample>;

    /// `true` if anything exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// `true` if `path` is a directory the process may read and traverse.
    fn is_accessible_dir(&self, path: &Path) -> bool;

    /// Where the mount table is read from, for diagnostics.
    fn mount_table_path(&self) -> &Path;
}

/// `HostFs` backed by procfs, stat(2), statvfs(3) and access(2).
#[derive(Debug, Clone)]
pub struct RealHost {
    mounts_path: PathBuf,
}

impl RealHost {
    pub fn new(mounts_path: impl Into<PathBuf>) -> Self {
        Self { mounts_path: mounts_path.into() }
    }
}

impl Default for RealHost {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNTS_PATH)
    }
}

impl HostFs for RealHost {
    fn read_mount_table(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.mounts_path)
    }

    fn device_id_of(&self, path: &Path) -> io::Result<DeviceId> {
        use nix::sys::stat::{major, minor, stat};
        let st = stat(path)?;
        Ok(DeviceId::new(major(st.st_dev) as u64, minor(st.st_dev) as u64))
    }

    fn capacity_of(&self, path: &Path) -> io::Result<CapacitySample> {
        statvfs_sample(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_accessible_dir(&self, path: &Path) -> bool {
        use nix::unistd::{access, AccessFlags};
        path.is_dir() && access(path, AccessFlags::R_OK | AccessFlags::X_OK).is_ok()
    }

    fn mount_table_path(&self) -> &Path {
        &self.mounts_path
    }
}

// ── Bounded queries ─────────────────────────────────────────────────

/// Wraps a `HostFs` so every per-path query gives up after a time limit.
///
/// stat(2), access(2) and statvfs(3) on a hung network mount block in the
/// kernel. Each query runs on a helper thread; when it does not answer in
/// time the helper is parked in `pending` and the caller gets `TimedOut`.
/// Until that helper returns, further queries for the same path are refused
/// without spawning, so a hung mount holds at most one blocked thread.
pub struct TimedHost<H> {
    inner:   Arc<H>,
    limit:   Option<Duration>,
    pending: Mutex<HashMap<PathBuf, JoinHandle<()>>>,
}

impl<H: HostFs + Send + Sync + 'static> TimedHost<H> {
    /// A zero `limit` disables the bound and queries run inline.
    pub fn new(inner: H, limit: Duration) -> Self {
        Self {
            inner:   Arc::new(inner),
            limit:   (!limit.is_zero()).then_some(limit),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn bounded<T, F>(&self, op: &'static str, path: &Path, query: F) -> io::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&H, &Path) -> io::Result<T> + Send + 'static,
    {
        let Some(limit) = self.limit else {
            return query(&*self.inner, path);
        };

        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(stuck) = pending.get(path) {
                if !stuck.is_finished() {
                    debug!(path = %path.display(), "{} skipped: an earlier query is still pending", op);
                    return Err(io::Error::new(
                        io::ErrorKind::WouldBlock,
                        format!("an earlier query on {} has not returned", path.display()),
                    ));
                }
                pending.remove(path);
            }
        }

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned = path.to_path_buf();
        let handle = thread::Builder::new()
            .name(format!("dspace-{op}"))
            .spawn(move || {
                let _ = tx.send(query(&*inner, &owned));
            })?;

        match rx.recv_timeout(limit) {
            Ok(result) => {
                let _ = handle.join();
                result
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(path = %path.display(), "{} did not answer within {}ms", op, limit.as_millis());
                self.pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(path.to_path_buf(), handle);
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{op} did not answer within {}ms", limit.as_millis()),
                ))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{op} worker exited without a result"),
            )),
        }
    }
}

impl<H: HostFs + Send + Sync + 'static> HostFs for TimedHost<H> {
    fn read_mount_table(&self) -> io::Result<String> {
        self.inner.read_mount_table()
    }

    fn device_id_of(&self, path: &Path) -> io::Result<DeviceId> {
        self.bounded("stat", path, |host: &H, p: &Path| host.device_id_of(p))
    }

    fn capacity_of(&self, path: &Path) -> io::Result<CapacitySample> {
        self.bounded("statvfs", path, |host: &H, p: &Path| host.capacity_of(p))
    }

    fn exists(&self, path: &Path) -> bool {
        self.bounded("exists", path, |host: &H, p: &Path| Ok(host.exists(p))).unwrap_or(false)
    }

    fn is_accessible_dir(&self, path: &Path) -> bool {
        self.bounded("access", path, |host: &H, p: &Path| Ok(host.is_accessible_dir(p))).unwrap_or(false)
    }

    fn mount_table_path(&self) -> &Path {
        self.inner.mount_table_path()
    }
}

fn statvfs_sample(path: &Path) -> io::Result<CapacitySample> {
    use nix::sys::statvfs::statvfs;
    let st = statvfs(path)?;

    Ok(CapacitySample {
        block_size:    st.block_size() as u64,
        fragment_size: st.fragment_size() as u64,
        total_blocks:  st.blocks() as u64,
        free_blocks:   st.blocks_free() as u64,
        avail_blocks:  st.blocks_available() as u64,
        total_inodes:  st.files() as u64,
        free_inodes:   st.files_free() as u64,
        avail_inodes:  st.files_available() as u64,
    })
}
