use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of a collection cycle.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The mount table could not be opened. Fatal to the cycle.
    #[error("cannot open mount table {}: {source}", path.display())]
    Configuration {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    /// A device-identity or capacity query failed for one filesystem.
    /// The caller skips that filesystem and carries on.
    #[error("cannot stat {}: {source}", path.display())]
    Stat {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    /// The metric sink refused a write.
    #[error("cannot publish metrics: {0}")]
    Publish(#[source] io::Error),
}
