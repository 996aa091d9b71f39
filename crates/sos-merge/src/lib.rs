//! sos merge - line-based and intra-line text merging
//!
//! Reconciles two versions of a text blob ("mine" vs "theirs") with a
//! configurable merge operation and conflict resolution policy. Binary
//! content must never reach this crate; the repository layer classifies it
//! and falls back to whole-file replacement.

pub mod engine;
pub mod eol;

pub use engine::{
    merge, Conflict, ConflictResolution, ConflictSide, MergeOperation, ResolveConflict,
    ScriptedResolver,
};
pub use eol::{eol_detect, Eol};
