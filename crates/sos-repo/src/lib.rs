//! sos repo - repository metadata manager
//!
//! Owns the branch/commit bookkeeping, the working-directory scan, sequential
//! PathSet reconstruction from incremental deltas, and the orchestration of
//! commit/switch/update/branch/delete operations on top of sos-core's storage
//! primitives and sos-merge's text merge engine.

pub mod meta;
pub mod pattern;
pub mod repository;
pub mod scan;

pub use meta::{BranchId, BranchInfo, CommitInfo, RepoConfig, RepoMeta, RevisionRecord};
pub use pattern::Pattern;
pub use repository::{Repository, UpdatePolicy, SOS_DIR};
pub use scan::scan_working;
