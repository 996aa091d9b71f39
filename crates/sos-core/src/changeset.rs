//! ChangeSet computation between two PathSets

use crate::pathset::{FileState, PathSet};
use ahash::AHashSet;

/// Differences between two PathSets.
///
/// The three sets are disjoint: a path appears in at most one of them.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Paths live in new but not (or tombstoned) in old
    pub additions: AHashSet<String>,
    /// Paths tombstoned in new that were live in old
    pub deletions: AHashSet<String>,
    /// Paths live in both with differing hash or size
    pub modifications: AHashSet<String>,
}

impl ChangeSet {
    /// Check if there are any changes
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty() && self.modifications.is_empty()
    }

    /// Total number of changed paths
    pub fn len(&self) -> usize {
        self.additions.len() + self.deletions.len() + self.modifications.len()
    }
}

/// Compute the ChangeSet between two PathSets.
///
/// Pure and total. Tombstone rules:
/// - old tombstoned (or absent), new live => addition (delete-then-recreate
///   is two independent events, not a modification)
/// - old live, new tombstoned => deletion
/// - both tombstoned => no change
/// - path absent from `new` entirely => untracked now, NOT a deletion;
///   tracking removal is a policy concern handled above this function
pub fn diff_path_sets(old: &PathSet, new: &PathSet) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (path, new_info) in new.iter() {
        match old.get(path) {
            None => {
                if !new_info.is_deleted() {
                    changes.additions.insert(path.clone());
                }
                // Tombstone for a path old never knew: nothing to report.
            }
            Some(old_info) => match (&old_info.state, &new_info.state) {
                (FileState::Deleted, FileState::Deleted) => {}
                (FileState::Deleted, FileState::Live { .. }) => {
                    changes.additions.insert(path.clone());
                }
                (FileState::Live { .. }, FileState::Deleted) => {
                    changes.deletions.insert(path.clone());
                }
                (
                    FileState::Live {
                        hash: old_hash,
                        size: old_size,
                    },
                    FileState::Live {
                        hash: new_hash,
                        size: new_size,
                    },
                ) => {
                    if old_hash != new_hash || old_size != new_size {
                        changes.modifications.insert(path.clone());
                    }
                }
            },
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;
    use crate::pathset::PathInfo;

    fn live(data: &[u8]) -> PathInfo {
        PathInfo::live(hash_bytes(data), data.len() as u64, 0.0)
    }

    fn set(entries: &[(&str, PathInfo)]) -> PathSet {
        entries
            .iter()
            .map(|(p, i)| (p.to_string(), i.clone()))
            .collect()
    }

    #[test]
    fn test_diff_identity() {
        let a = set(&[
            ("./x", live(b"one")),
            ("./y", live(b"two")),
            ("./z", PathInfo::deleted(0.0)),
        ]);
        let changes = diff_path_sets(&a, &a);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_addition_deletion_modification() {
        let old = set(&[("./a", live(b"a")), ("./m", live(b"v1"))]);
        let new = set(&[
            ("./a", PathInfo::deleted(1.0)),
            ("./m", live(b"v2")),
            ("./n", live(b"new")),
        ]);

        let changes = diff_path_sets(&old, &new);
        assert!(changes.additions.contains("./n"));
        assert!(changes.deletions.contains("./a"));
        assert!(changes.modifications.contains("./m"));
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_diff_antisymmetry() {
        // Deletions expressed as tombstones so both directions see the path.
        let a = set(&[("./a", live(b"a")), ("./b", PathInfo::deleted(0.0))]);
        let b = set(&[("./a", PathInfo::deleted(0.0)), ("./b", live(b"b"))]);

        let ab = diff_path_sets(&a, &b);
        let ba = diff_path_sets(&b, &a);
        assert_eq!(ab.additions, ba.deletions);
        assert_eq!(ab.deletions, ba.additions);
    }

    #[test]
    fn test_readd_after_tombstone_is_addition() {
        let a = set(&[("./x", PathInfo::deleted(0.0))]);
        let b = set(&[("./x", live(b"12345"))]);

        let changes = diff_path_sets(&a, &b);
        assert!(changes.additions.contains("./x"));
        assert!(changes.modifications.is_empty());
        assert!(changes.deletions.is_empty());
    }

    #[test]
    fn test_both_tombstoned_is_no_change() {
        let a = set(&[("./x", PathInfo::deleted(0.0))]);
        let b = set(&[("./x", PathInfo::deleted(5.0))]);
        assert!(diff_path_sets(&a, &b).is_empty());
    }

    #[test]
    fn test_missing_from_new_is_not_a_deletion() {
        let a = set(&[("./x", live(b"x"))]);
        let b = PathSet::new();
        let changes = diff_path_sets(&a, &b);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_mtime_only_change_is_not_a_modification() {
        let mut i1 = live(b"same");
        i1.mtime = 1.0;
        let mut i2 = live(b"same");
        i2.mtime = 2.0;
        let changes = diff_path_sets(&set(&[("./x", i1)]), &set(&[("./x", i2)]));
        assert!(changes.is_empty());
    }
}
