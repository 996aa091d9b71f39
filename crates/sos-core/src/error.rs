//! Error kinds shared across the sos crates

use std::path::PathBuf;

/// Failure kinds surfaced to the command dispatch layer.
///
/// Library code propagates these through `anyhow::Result`; the CLI downcasts
/// at the boundary to pick a message and a non-zero exit status.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("repository already initialized at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("nothing to commit (use --force to record an empty revision)")]
    NothingToCommit,

    #[error("working directory has uncommitted changes (use --force to discard them)")]
    DirtyWorkingTree,

    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("corrupt blob {hash}: {reason}")]
    CorruptBlob { hash: String, reason: String },

    #[error("storage I/O error on {}: {source}", .path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value {value:?} for config key {key:?}")]
    InvalidConfigValue { key: String, value: String },

    #[error("merge conflict left unresolved")]
    MergeConflictUnresolved,

    #[error("pattern mismatch: {0}")]
    PatternMismatch(String),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::StorageIo {
            path: path.into(),
            source,
        }
    }
}
