//! Repository metadata model and atomic persistence
//!
//! One `meta.json` at the metadata root holds the flags/config and the
//! branch table; each revision folder holds a `revision.json` with the
//! CommitInfo and the persisted PathSet delta (full snapshot at revision 0).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sos_core::{Error, PathSet};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Identifier of a branch (dense, allocated sequentially from 0)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BranchId(pub u32);

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One branch: an independent linear history, optionally forked from a
/// parent branch at a recorded revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchInfo {
    pub id: BranchId,
    pub name: String,
    pub parent: Option<BranchId>,
    /// Parent's revision at fork time; the blob lookup chain enters the
    /// parent's history here.
    pub forked_at: Option<u64>,
    /// Latest revision on this branch
    pub head: u64,
}

/// Commit bookkeeping for one revision on one branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub revision: u64,
    pub branch: BranchId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub ts_unix_ms: u64,
}

/// The persisted per-revision file: commit info plus the PathInfo delta
/// (only added/modified/tombstoned paths; revision 0 is a full snapshot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub commit: CommitInfo,
    pub delta: PathSet,
}

impl RevisionRecord {
    pub const FILE_NAME: &'static str = "revision.json";

    pub fn load(folder: &Path) -> Result<Self> {
        let path = folder.join(Self::FILE_NAME);
        let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("malformed revision record at {}", path.display()))
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        write_json_atomic(&folder.join(Self::FILE_NAME), self)
    }
}

/// Global flags and pattern lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Refuse operations on questionable state instead of warning
    pub strict: bool,
    /// Compress stored blobs
    pub compress: bool,
    /// Only paths matching tracked patterns are eligible for addition
    pub picky: bool,
    /// Tracked add-patterns (picky mode eligibility)
    pub tracked: Vec<String>,
    /// Ignore patterns applied during the working scan
    pub ignores: Vec<String>,
    /// Exceptions to the ignore patterns
    pub ignores_whitelist: Vec<String>,
    /// Patterns forcing text classification
    pub text_types: Vec<String>,
    /// Patterns forcing binary classification
    pub binary_types: Vec<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            strict: false,
            compress: true,
            picky: false,
            tracked: Vec::new(),
            ignores: vec!["*.swp".into(), "*.tmp".into(), ".git/*".into()],
            ignores_whitelist: Vec::new(),
            text_types: Vec::new(),
            binary_types: vec![
                "*.png".into(),
                "*.jpg".into(),
                "*.gz".into(),
                "*.zip".into(),
                "*.pdf".into(),
            ],
        }
    }
}

impl RepoConfig {
    /// Set a boolean flag from its user-supplied spelling.
    ///
    /// Accepted vocabulary: true/false, on/off, yes/no, 1/0 (case-insensitive).
    pub fn set_flag(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed = parse_bool(value).ok_or_else(|| Error::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        match key {
            "strict" => self.strict = parsed,
            "compress" => self.compress = parsed,
            "picky" => self.picky = parsed,
            _ => {
                return Err(Error::InvalidConfigValue {
                    key: key.to_string(),
                    value: value.to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    /// The mutable pattern list named by `key`, if any
    pub fn pattern_list_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match key {
            "tracked" => Some(&mut self.tracked),
            "ignores" => Some(&mut self.ignores),
            "ignores_whitelist" => Some(&mut self.ignores_whitelist),
            "text_types" => Some(&mut self.text_types),
            "binary_types" => Some(&mut self.binary_types),
            _ => None,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// The single metadata file at the repository metadata root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMeta {
    pub current_branch: BranchId,
    pub current_revision: u64,
    pub branches: Vec<BranchInfo>,
    pub config: RepoConfig,
}

impl RepoMeta {
    pub const FILE_NAME: &'static str = "meta.json";

    pub fn load(sos_dir: &Path) -> Result<Self> {
        let path = sos_dir.join(Self::FILE_NAME);
        let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("malformed metadata file at {}", path.display()))
    }

    pub fn save(&self, sos_dir: &Path) -> Result<()> {
        write_json_atomic(&sos_dir.join(Self::FILE_NAME), self)
    }

    pub fn branch(&self, id: BranchId) -> Result<&BranchInfo> {
        self.branches
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::UnknownRevision(format!("branch {id}")).into())
    }

    pub fn branch_mut(&mut self, id: BranchId) -> Result<&mut BranchInfo> {
        self.branches
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::UnknownRevision(format!("branch {id}")).into())
    }

    pub fn branch_by_name(&self, name: &str) -> Option<&BranchInfo> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn next_branch_id(&self) -> BranchId {
        BranchId(self.branches.iter().map(|b| b.id.0 + 1).max().unwrap_or(0))
    }
}

/// Write a JSON value via write-temp-then-atomic-rename.
///
/// A reader always sees either the previous fully-valid file or the new one,
/// never a torn write.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("serializing metadata")?;

    let tmp_path = path.with_extension("json.tmp");
    let mut tmp = fs::File::create(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?;
    tmp.write_all(&json).map_err(|e| Error::io(&tmp_path, e))?;
    tmp.sync_all().map_err(|e| Error::io(&tmp_path, e))?;
    drop(tmp);
    fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Current wall-clock time in Unix milliseconds
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_core::{hash_bytes, PathInfo};
    use tempfile::TempDir;

    fn sample_meta() -> RepoMeta {
        RepoMeta {
            current_branch: BranchId(0),
            current_revision: 2,
            branches: vec![BranchInfo {
                id: BranchId(0),
                name: "trunk".into(),
                parent: None,
                forked_at: None,
                head: 2,
            }],
            config: RepoConfig::default(),
        }
    }

    #[test]
    fn test_meta_save_load_roundtrip() -> Result<()> {
        let dir = TempDir::new()?;
        let meta = sample_meta();
        meta.save(dir.path())?;

        let loaded = RepoMeta::load(dir.path())?;
        assert_eq!(loaded.current_branch, meta.current_branch);
        assert_eq!(loaded.current_revision, 2);
        assert_eq!(loaded.branches.len(), 1);
        assert_eq!(loaded.branches[0].name, "trunk");
        Ok(())
    }

    #[test]
    fn test_save_leaves_no_temp_file() -> Result<()> {
        let dir = TempDir::new()?;
        sample_meta().save(dir.path())?;

        let names: Vec<_> = fs::read_dir(dir.path())?
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![RepoMeta::FILE_NAME.to_string()]);
        Ok(())
    }

    #[test]
    fn test_revision_record_roundtrip() -> Result<()> {
        let dir = TempDir::new()?;
        let mut delta = PathSet::new();
        delta.insert("./a", PathInfo::live(hash_bytes(b"a"), 1, 10.0));
        delta.insert("./gone", PathInfo::deleted(11.0));

        let record = RevisionRecord {
            commit: CommitInfo {
                revision: 3,
                branch: BranchId(0),
                message: Some("third".into()),
                ts_unix_ms: current_timestamp_ms(),
            },
            delta,
        };
        record.save(dir.path())?;

        let loaded = RevisionRecord::load(dir.path())?;
        assert_eq!(loaded.commit.revision, 3);
        assert_eq!(loaded.delta.len(), 2);
        assert!(loaded.delta.get("./gone").unwrap().is_deleted());
        Ok(())
    }

    #[test]
    fn test_set_flag_vocabulary() {
        let mut config = RepoConfig::default();
        for (value, expected) in [("on", true), ("OFF", false), ("yes", true), ("0", false)] {
            config.set_flag("strict", value).unwrap();
            assert_eq!(config.strict, expected);
        }
    }

    #[test]
    fn test_set_flag_rejects_garbage() {
        let mut config = RepoConfig::default();
        let err = config.set_flag("strict", "maybe").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidConfigValue { .. })
        ));
        assert!(config.set_flag("no_such_flag", "true").is_err());
    }
}
