//! Working-directory scan

use crate::meta::RepoConfig;
use crate::pattern::Pattern;
use crate::repository::SOS_DIR;
use anyhow::Result;
use sos_core::{hash_bytes, PathInfo, PathSet};
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Normalize a repo-relative path to the canonical `./a/b` key form
pub fn normalize_rel(path: &Path) -> String {
    let mut out = String::from(".");
    for component in path.components() {
        out.push('/');
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

/// Classify content as "text" or "binary".
///
/// Type patterns win; otherwise a NUL byte in the leading window means
/// binary.
pub fn classify(path_key: &str, data: &[u8], config: &RepoConfig) -> &'static str {
    for raw in &config.binary_types {
        if Pattern::parse(raw).matches(path_key) {
            return "binary";
        }
    }
    for raw in &config.text_types {
        if Pattern::parse(raw).matches(path_key) {
            return "text";
        }
    }
    let window = &data[..data.len().min(8192)];
    if window.contains(&0) {
        "binary"
    } else {
        "text"
    }
}

fn is_ignored(path_key: &str, config: &RepoConfig) -> bool {
    let whitelisted = config
        .ignores_whitelist
        .iter()
        .any(|raw| Pattern::parse(raw).matches(path_key));
    if whitelisted {
        return false;
    }
    config
        .ignores
        .iter()
        .any(|raw| Pattern::parse(raw).matches(path_key))
}

/// Scan the working directory into a live PathSet.
///
/// Fresh scan each call: walks `root` excluding the metadata directory,
/// applies the ignore patterns (minus whitelist), hashes every remaining
/// regular file. Unreadable entries are skipped with a warning.
pub fn scan_working(root: &Path, config: &RepoConfig) -> Result<PathSet> {
    let mut set = PathSet::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != SOS_DIR);

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable directory entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walker yields paths under root");
        let key = normalize_rel(rel);
        if is_ignored(&key, config) {
            continue;
        }

        let data = match std::fs::read(entry.path()) {
            Ok(d) => d,
            Err(e) => {
                warn!("skipping unreadable file {}: {e}", entry.path().display());
                continue;
            }
        };
        let mtime = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let hint = classify(&key, &data, config);
        let info = PathInfo::live(hash_bytes(&data), data.len() as u64, mtime).with_hint(hint);
        set.insert(key, info);
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_hashes_and_normalizes() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("sub"))?;
        fs::write(dir.path().join("top.txt"), b"top")?;
        fs::write(dir.path().join("sub/inner.txt"), b"inner")?;

        let set = scan_working(dir.path(), &RepoConfig::default())?;
        assert_eq!(set.len(), 2);
        assert!(set.contains("./top.txt"));
        assert!(set.contains("./sub/inner.txt"));

        let info = set.get("./top.txt").unwrap();
        assert_eq!(info.state.size(), Some(3));
        assert_eq!(info.state.hash(), Some(hash_bytes(b"top")));
        Ok(())
    }

    #[test]
    fn test_scan_skips_metadata_dir_and_ignores() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join(SOS_DIR))?;
        fs::write(dir.path().join(SOS_DIR).join("meta.json"), b"{}")?;
        fs::write(dir.path().join("kept.txt"), b"kept")?;
        fs::write(dir.path().join("junk.swp"), b"junk")?;

        let set = scan_working(dir.path(), &RepoConfig::default())?;
        assert_eq!(set.len(), 1);
        assert!(set.contains("./kept.txt"));
        Ok(())
    }

    #[test]
    fn test_whitelist_overrides_ignore() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("keep.swp"), b"x")?;

        let mut config = RepoConfig::default();
        config.ignores_whitelist.push("keep.swp".into());
        let set = scan_working(dir.path(), &config)?;
        assert!(set.contains("./keep.swp"));
        Ok(())
    }

    #[test]
    fn test_classify() {
        let config = RepoConfig::default();
        assert_eq!(classify("./a.png", b"plain", &config), "binary");
        assert_eq!(classify("./a.txt", b"plain", &config), "text");
        assert_eq!(classify("./blob", b"\x00\x01\x02", &config), "binary");
    }
}
