//! sos core - storage primitives for the sos version control tool
//!
//! This crate provides the foundational layer:
//! - BLAKE3 content hashing
//! - Content-addressed blob storage with compression and cross-revision dedup
//! - The PathInfo/PathSet model (tombstone-aware path state)
//! - ChangeSet computation between two PathSets

pub mod blob;
pub mod changeset;
pub mod error;
pub mod hash;
pub mod pathset;

// Re-export main types for convenience
pub use blob::ContentStore;
pub use changeset::{diff_path_sets, ChangeSet};
pub use error::Error;
pub use hash::{hash_bytes, ContentHash};
pub use pathset::{FileState, PathInfo, PathSet};

/// Common result type used throughout sos
pub type Result<T> = anyhow::Result<T>;
