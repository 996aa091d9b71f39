//! Path state model: PathInfo entries and tombstone-aware PathSets

use crate::hash::ContentHash;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Recorded content state of one path at one revision.
///
/// `Deleted` is a tombstone: the path occupies a slot in the PathSet so a
/// later re-add is classified as an addition instead of silently reappearing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum FileState {
    Live { hash: ContentHash, size: u64 },
    Deleted,
}

impl FileState {
    /// The blob hash, if the path is live
    pub fn hash(&self) -> Option<ContentHash> {
        match self {
            FileState::Live { hash, .. } => Some(*hash),
            FileState::Deleted => None,
        }
    }

    /// The recorded byte length, if the path is live
    pub fn size(&self) -> Option<u64> {
        match self {
            FileState::Live { size, .. } => Some(*size),
            FileState::Deleted => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, FileState::Deleted)
    }
}

/// Recorded state of one tracked path at one revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathInfo {
    #[serde(flatten)]
    pub state: FileState,
    /// Modification timestamp at capture time (seconds since epoch,
    /// filesystem resolution)
    pub mtime: f64,
    /// Free-form classification hint (e.g. "text" / "binary")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind_hint: Option<String>,
}

impl PathInfo {
    /// A live entry
    pub fn live(hash: ContentHash, size: u64, mtime: f64) -> Self {
        Self {
            state: FileState::Live { hash, size },
            mtime,
            kind_hint: None,
        }
    }

    /// A tombstone entry
    pub fn deleted(mtime: f64) -> Self {
        Self {
            state: FileState::Deleted,
            mtime,
            kind_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.kind_hint = Some(hint.into());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.state.is_deleted()
    }

    /// Recorded size; `None` for tombstones
    pub fn size(&self) -> Option<u64> {
        self.state.size()
    }
}

/// Mapping from normalized path to PathInfo.
///
/// Keys are `./`-prefixed, forward-slash relative paths. Represents either a
/// working-directory scan or the reconstructed state at a (branch, revision).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSet {
    entries: AHashMap<String, PathInfo>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, info: PathInfo) {
        self.entries.insert(path.into(), info);
    }

    pub fn get(&self, path: &str) -> Option<&PathInfo> {
        self.entries.get(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<PathInfo> {
        self.entries.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of entries, tombstones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live (non-tombstoned) entries
    pub fn live_len(&self) -> usize {
        self.entries.values().filter(|i| !i.is_deleted()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PathInfo)> {
        self.entries.iter()
    }

    /// Iterator over live entries only
    pub fn live(&self) -> impl Iterator<Item = (&String, &PathInfo)> {
        self.entries.iter().filter(|(_, i)| !i.is_deleted())
    }

    /// Apply an incremental delta onto this set.
    ///
    /// Every delta entry overwrites or inserts, tombstones included - a
    /// tombstone must stay in the accumulator so a later re-add diffs as an
    /// addition.
    pub fn apply_delta(&mut self, delta: &PathSet) {
        for (path, info) in delta.iter() {
            self.entries.insert(path.clone(), info.clone());
        }
    }

    /// Paths in sorted order (for deterministic listings)
    pub fn sorted_paths(&self) -> Vec<&String> {
        let mut paths: Vec<_> = self.entries.keys().collect();
        paths.sort();
        paths
    }
}

impl FromIterator<(String, PathInfo)> for PathSet {
    fn from_iter<T: IntoIterator<Item = (String, PathInfo)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
