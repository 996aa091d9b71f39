//! The repository manager: branches, commits, reconstruction, materialization
//!
//! On-disk layout under the metadata root:
//!
//! ```text
//! <root>/.sos/
//!   meta.json            flags/config + branch table + current pointers
//!   b<branch_id>/
//!     r<revision>/
//!       revision.json    CommitInfo + PathInfo delta (full set at r0)
//!       <hex hash>       blobs first stored at this revision
//! ```

use crate::meta::{
    current_timestamp_ms, BranchId, BranchInfo, CommitInfo, RepoConfig, RepoMeta, RevisionRecord,
};
use crate::pattern::Pattern;
use crate::scan::{classify, scan_working};
use ahash::AHashMap;
use anyhow::{Context, Result};
use sos_core::blob::blobs_in_folder;
use sos_core::{
    diff_path_sets, hash_bytes, ChangeSet, ContentStore, Error, FileState, PathInfo, PathSet,
};
use sos_merge::{merge, ConflictResolution, MergeOperation, ResolveConflict};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Name of the metadata root directory
pub const SOS_DIR: &str = ".sos";

/// Knobs for the `update` operation
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdatePolicy {
    pub operation: MergeOperation,
    pub resolution: ConflictResolution,
    /// Only create new paths; never delete or overwrite existing ones
    pub add_only: bool,
}

/// Handle on one repository: loaded metadata plus a per-process cache of
/// reconstructed PathSets. Every mutating operation persists `meta.json`
/// before returning.
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    sos_dir: PathBuf,
    meta: RepoMeta,
    reconstruct_cache: AHashMap<(BranchId, u64), PathSet>,
}

impl Repository {
    /// Initialize a fresh repository at `root` (the `offline` operation).
    ///
    /// Branch 0 ("trunk") revision 0 is a full snapshot of the working
    /// directory as scanned right now.
    pub fn init(root: &Path, force: bool, config: RepoConfig) -> Result<Self> {
        let sos_dir = root.join(SOS_DIR);
        if sos_dir.exists() {
            if !force {
                return Err(Error::AlreadyInitialized(root.to_path_buf()).into());
            }
            fs::remove_dir_all(&sos_dir).map_err(|e| Error::io(&sos_dir, e))?;
        }
        fs::create_dir_all(&sos_dir).map_err(|e| Error::io(&sos_dir, e))?;

        let meta = RepoMeta {
            current_branch: BranchId(0),
            current_revision: 0,
            branches: vec![BranchInfo {
                id: BranchId(0),
                name: "trunk".to_string(),
                parent: None,
                forked_at: None,
                head: 0,
            }],
            config,
        };
        let mut repo = Self {
            root: root.to_path_buf(),
            sos_dir,
            meta,
            reconstruct_cache: AHashMap::new(),
        };

        let seed = repo.scan()?;
        repo.write_snapshot_revision(BranchId(0), 0, &seed, Some("initial snapshot".into()), &[])?;
        repo.save_meta()?;
        Ok(repo)
    }

    /// Open an existing repository, walking up from `start` to find the
    /// metadata root.
    pub fn open(start: &Path) -> Result<Self> {
        let root = find_root(start)?;
        let sos_dir = root.join(SOS_DIR);
        let meta = RepoMeta::load(&sos_dir)?;
        Ok(Self {
            root,
            sos_dir,
            meta,
            reconstruct_cache: AHashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &RepoMeta {
        &self.meta
    }

    pub fn config(&self) -> &RepoConfig {
        &self.meta.config
    }

    /// Set a boolean config flag and persist
    pub fn set_config_flag(&mut self, key: &str, value: &str) -> Result<()> {
        self.meta.config.set_flag(key, value)?;
        self.save_meta()
    }

    /// Add or remove an entry of a config pattern list and persist
    pub fn edit_config_list(&mut self, key: &str, value: &str, add: bool) -> Result<()> {
        let list = self
            .meta
            .config
            .pattern_list_mut(key)
            .ok_or_else(|| Error::InvalidConfigValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
        if add {
            if !list.iter().any(|p| p == value) {
                list.push(value.to_string());
            }
        } else {
            list.retain(|p| p != value);
        }
        self.save_meta()
    }

    // ------------------------------------------------------------------
    // Reconstruction & change detection
    // ------------------------------------------------------------------

    /// Reconstruct the full PathSet as of `(branch, revision)` by folding
    /// the revision-0 snapshot and every delta up to `revision`.
    ///
    /// Tombstones stay in the result so later re-adds classify as
    /// additions. Cached per (branch, revision) for the process lifetime.
    pub fn reconstruct(&mut self, branch: BranchId, revision: u64) -> Result<PathSet> {
        let head = self.meta.branch(branch)?.head;
        if revision > head {
            return Err(Error::UnknownRevision(format!(
                "{}/{revision}",
                self.meta.branch(branch)?.name
            ))
            .into());
        }
        if let Some(cached) = self.reconstruct_cache.get(&(branch, revision)) {
            return Ok(cached.clone());
        }

        // Resume from the deepest cached prefix rather than replaying from 0.
        let mut start = 0;
        let mut acc = PathSet::new();
        for r in (0..=revision).rev() {
            if let Some(cached) = self.reconstruct_cache.get(&(branch, r)) {
                acc = cached.clone();
                start = r + 1;
                break;
            }
        }

        for r in start..=revision {
            let record = RevisionRecord::load(&self.revision_dir(branch, r))?;
            acc.apply_delta(&record.delta);
        }
        self.reconstruct_cache
            .insert((branch, revision), acc.clone());
        Ok(acc)
    }

    /// Scan the working directory (fresh walk, live entries only)
    pub fn scan(&self) -> Result<PathSet> {
        scan_working(&self.root, &self.meta.config)
    }

    /// Compare the working directory against `(branch, revision)`.
    ///
    /// Returns the ChangeSet plus the candidate PathSet it was computed
    /// from (scan augmented with tombstones for recorded paths missing on
    /// disk, and pruned of untracked additions in picky mode).
    pub fn find_changes(
        &mut self,
        branch: BranchId,
        revision: u64,
    ) -> Result<(ChangeSet, PathSet)> {
        let baseline = self.reconstruct(branch, revision)?;
        let mut candidate = self.scan()?;

        // A recorded live path missing from disk is a deletion, expressed
        // as a tombstone in the candidate; absence alone would read as
        // "untracked now".
        let now = current_timestamp_ms() as f64 / 1000.0;
        for (path, info) in baseline.iter() {
            if !info.is_deleted() && !candidate.contains(path) {
                candidate.insert(path.clone(), PathInfo::deleted(now));
            }
        }

        // Picky mode: only paths matching tracked patterns may be added.
        if self.meta.config.picky {
            let tracked: Vec<Pattern> = self
                .meta
                .config
                .tracked
                .iter()
                .map(|raw| Pattern::parse(raw))
                .collect();
            let would_add: Vec<String> = candidate
                .iter()
                .filter(|(path, info)| {
                    !info.is_deleted()
                        && baseline.get(path).map_or(true, |b| b.is_deleted())
                })
                .map(|(path, _)| path.clone())
                .collect();
            for path in would_add {
                if !tracked.iter().any(|t| t.matches(&path)) {
                    candidate.remove(&path);
                }
            }
        }

        let changes = diff_path_sets(&baseline, &candidate);
        Ok((changes, candidate))
    }

    /// Is the working directory out of sync with the current revision?
    pub fn is_dirty(&mut self) -> Result<bool> {
        let branch = self.meta.current_branch;
        let revision = self.meta.current_revision;
        Ok(!self.find_changes(branch, revision)?.0.is_empty())
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Record the working directory's changes as the next revision on the
    /// current branch. Returns the new revision number.
    pub fn commit(&mut self, message: Option<String>, force: bool) -> Result<u64> {
        let branch = self.meta.current_branch;
        let base_rev = self.meta.current_revision;
        let head = self.meta.branch(branch)?.head;
        if base_rev != head {
            anyhow::bail!(
                "cannot commit from revision {base_rev} while the branch head is {head}; \
                 switch to the head or fork a branch first"
            );
        }

        let (changes, candidate) = self.find_changes(branch, base_rev)?;
        if changes.is_empty() && !force {
            return Err(Error::NothingToCommit.into());
        }

        let new_rev = base_rev + 1;
        let rev_dir = self.revision_dir(branch, new_rev);
        fs::create_dir_all(&rev_dir).map_err(|e| Error::io(&rev_dir, e))?;

        let mut folders = vec![rev_dir.clone()];
        folders.extend(self.blob_chain(branch, base_rev)?);
        let store = ContentStore::open(folders, self.meta.config.compress);

        let mut delta = PathSet::new();
        for path in changes.additions.iter().chain(changes.modifications.iter()) {
            // Re-read from disk so the stored blob and the recorded hash
            // agree even if the file changed after the scan.
            let abs = self.abs_path(path)?;
            let data = fs::read(&abs).map_err(|e| Error::io(&abs, e))?;
            let hash = store.put(&data)?;

            let mut info = candidate
                .get(path)
                .cloned()
                .unwrap_or_else(|| PathInfo::live(hash, data.len() as u64, 0.0));
            info.state = FileState::Live {
                hash,
                size: data.len() as u64,
            };
            delta.insert(path.clone(), info);
        }
        for path in changes.deletions.iter() {
            if let Some(info) = candidate.get(path) {
                delta.insert(path.clone(), info.clone());
            }
        }

        let record = RevisionRecord {
            commit: CommitInfo {
                revision: new_rev,
                branch,
                message,
                ts_unix_ms: current_timestamp_ms(),
            },
            delta,
        };
        record.save(&rev_dir)?;

        self.meta.branch_mut(branch)?.head = new_rev;
        self.meta.current_revision = new_rev;
        self.save_meta()?;
        debug!(branch = %branch, revision = new_rev, changed = changes.len(), "committed");
        Ok(new_rev)
    }

    // ------------------------------------------------------------------
    // Switch & update
    // ------------------------------------------------------------------

    /// Make the working directory match `(branch, revision)` exactly.
    ///
    /// Refuses on a dirty working tree unless forced; the dirty check runs
    /// before any file is touched. The metadata pointers move only after
    /// every file has been materialized, so an interrupted switch can be
    /// retried against unchanged pointers.
    pub fn switch(&mut self, spec: &str, force: bool) -> Result<()> {
        let (branch, revision) = self.resolve_spec(spec)?;
        if !force && self.is_dirty()? {
            return Err(Error::DirtyWorkingTree.into());
        }

        let current = self.reconstruct(self.meta.current_branch, self.meta.current_revision)?;
        let target = self.reconstruct(branch, revision)?;
        let store = ContentStore::open(self.blob_chain(branch, revision)?, self.meta.config.compress);

        // Remove paths that exist now but not in the target.
        for (path, _) in current.live() {
            let gone = target.get(path).map_or(true, |t| t.is_deleted());
            if gone {
                let abs = self.abs_path(path)?;
                match fs::remove_file(&abs) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::io(&abs, e).into()),
                }
            }
        }

        // Materialize the target's live paths.
        for (path, info) in target.live() {
            let Some(hash) = info.state.hash() else { continue };
            let data = store.get(&hash)?;
            self.write_working_file(path, &data)?;
        }

        self.meta.current_branch = branch;
        self.meta.current_revision = revision;
        self.save_meta()
    }

    /// Pull `(branch, revision)` into the working directory, merging where
    /// both sides changed instead of overwriting.
    pub fn update(
        &mut self,
        spec: &str,
        policy: UpdatePolicy,
        mut resolver: Option<&mut (dyn ResolveConflict + '_)>,
    ) -> Result<()> {
        let (branch, revision) = self.resolve_spec(spec)?;
        let base = self.reconstruct(self.meta.current_branch, self.meta.current_revision)?;
        let target = self.reconstruct(branch, revision)?;
        let store = ContentStore::open(self.blob_chain(branch, revision)?, self.meta.config.compress);

        for (path, tinfo) in target.iter() {
            match tinfo.state {
                FileState::Live { hash: t_hash, .. } => {
                    let abs = self.abs_path(path)?;
                    if !abs.exists() {
                        let data = store.get(&t_hash)?;
                        self.write_working_file(path, &data)?;
                        continue;
                    }
                    if policy.add_only {
                        continue;
                    }

                    let local = fs::read(&abs).map_err(|e| Error::io(&abs, e))?;
                    let local_hash = hash_bytes(&local);
                    if local_hash == t_hash {
                        continue;
                    }
                    let base_hash = base.get(path).and_then(|i| i.state.hash());
                    if base_hash == Some(t_hash) {
                        // Target did not change; keep the local edits.
                        continue;
                    }
                    let theirs = store.get(&t_hash)?;
                    if base_hash == Some(local_hash) {
                        // Local copy untouched; take the target outright.
                        self.write_working_file(path, &theirs)?;
                        continue;
                    }

                    // Both sides changed. Binary content bypasses the text
                    // engine: theirs replaces mine, whole-file.
                    let binary = tinfo.kind_hint.as_deref() == Some("binary")
                        || classify(path, &local, &self.meta.config) == "binary";
                    if binary {
                        warn!(path = %path, "binary content changed on both sides; taking the target's version");
                        self.write_working_file(path, &theirs)?;
                    } else {
                        let merged = merge(
                            &local,
                            &theirs,
                            policy.operation,
                            policy.resolution,
                            resolver.as_deref_mut(),
                        )
                        .with_context(|| format!("merging {path}"))?;
                        self.write_working_file(path, &merged)?;
                    }
                }
                FileState::Deleted => {
                    if policy.add_only {
                        continue;
                    }
                    let abs = self.abs_path(path)?;
                    if !abs.exists() {
                        continue;
                    }
                    let local = fs::read(&abs).map_err(|e| Error::io(&abs, e))?;
                    let base_hash = base.get(path).and_then(|i| i.state.hash());
                    if base_hash == Some(hash_bytes(&local)) {
                        fs::remove_file(&abs).map_err(|e| Error::io(&abs, e))?;
                    } else {
                        warn!(path = %path, "target deleted a locally modified file; keeping the local copy");
                    }
                }
            }
        }

        self.meta.current_branch = branch;
        self.meta.current_revision = revision;
        self.save_meta()
    }

    // ------------------------------------------------------------------
    // Branch management
    // ------------------------------------------------------------------

    /// Fork a new branch off the current one. Revision 0 is a full snapshot
    /// seeded from the working directory, or from the parent's head when
    /// `last` is set. `stay` leaves the active pointers untouched.
    pub fn create_branch(&mut self, name: &str, last: bool, stay: bool) -> Result<BranchId> {
        if self.meta.branch_by_name(name).is_some() {
            anyhow::bail!("branch '{name}' already exists");
        }

        let parent = self.meta.current_branch;
        let parent_head = self.meta.branch(parent)?.head;
        let forked_at = if last {
            parent_head
        } else {
            self.meta.current_revision
        };
        // Seeding from the parent's history needs no blob writes at all;
        // the chain below already reaches every referenced blob.
        let seed = if last {
            self.reconstruct(parent, parent_head)?
        } else {
            self.scan()?
        };

        let id = self.meta.next_branch_id();
        let parent_chain = self.blob_chain(parent, forked_at)?;
        let message = Some(format!("branch '{name}' from {}/{forked_at}", self.meta.branch(parent)?.name));
        self.meta.branches.push(BranchInfo {
            id,
            name: name.to_string(),
            parent: Some(parent),
            forked_at: Some(forked_at),
            head: 0,
        });
        self.write_snapshot_revision(id, 0, &seed, message, &parent_chain)?;

        if !stay {
            self.meta.current_branch = id;
            self.meta.current_revision = 0;
        }
        self.save_meta()?;
        Ok(id)
    }

    /// Delete a branch's history and storage.
    pub fn delete_branch(&mut self, name: &str, force: bool) -> Result<()> {
        let info = self
            .meta
            .branch_by_name(name)
            .cloned()
            .ok_or_else(|| Error::UnknownRevision(format!("branch {name}")))?;

        if !force {
            if self.meta.branches.len() == 1 {
                anyhow::bail!("refusing to delete the only remaining branch");
            }
            if info.id == self.meta.current_branch {
                anyhow::bail!("refusing to delete the current branch (switch away first)");
            }
            if let Some(child) = self
                .meta
                .branches
                .iter()
                .find(|b| b.parent == Some(info.id))
            {
                anyhow::bail!(
                    "refusing to delete branch '{}': branch '{}' forked from it",
                    info.name,
                    child.name
                );
            }
        }

        let dir = self.branch_dir(info.id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&dir, e).into()),
        }
        self.meta.branches.retain(|b| b.id != info.id);
        self.reconstruct_cache.retain(|(b, _), _| *b != info.id);

        // A forced delete of the current branch leaves the pointers
        // dangling; repoint at some surviving branch's head.
        if self.meta.current_branch == info.id {
            if let Some(survivor) = self.meta.branches.first() {
                warn!(
                    "deleted the current branch; now on '{}' at its head",
                    survivor.name
                );
                self.meta.current_branch = survivor.id;
                self.meta.current_revision = survivor.head;
            } else {
                anyhow::bail!("deleted the last branch; repository has no history left");
            }
        }
        self.save_meta()
    }

    // ------------------------------------------------------------------
    // Tracking patterns, move, listings
    // ------------------------------------------------------------------

    /// Register a tracked add-pattern
    pub fn add_pattern(&mut self, raw: &str) -> Result<()> {
        let pattern = Pattern::parse(raw);
        let scan = self.scan()?;
        if !scan.iter().any(|(path, _)| pattern.matches(path)) {
            warn!(pattern = raw, "pattern matches no file in the working directory");
        }
        if !self.meta.config.tracked.iter().any(|p| p == raw) {
            self.meta.config.tracked.push(raw.to_string());
        }
        self.save_meta()
    }

    /// Unregister a tracked pattern (tracking removal, never file deletion)
    pub fn remove_pattern(&mut self, raw: &str) -> Result<()> {
        let before = self.meta.config.tracked.len();
        self.meta.config.tracked.retain(|p| p != raw);
        if self.meta.config.tracked.len() == before {
            anyhow::bail!("pattern {raw:?} is not tracked");
        }
        self.save_meta()
    }

    /// Pattern-based rename: every working file matching `src_raw` moves to
    /// the path built by substituting its captures into `dst_raw`. Tracked
    /// patterns equal to the source pattern are rewritten to the target.
    pub fn move_files(&mut self, src_raw: &str, dst_raw: &str) -> Result<Vec<(String, String)>> {
        let src = Pattern::parse(src_raw);
        let dst = Pattern::parse(dst_raw);
        if src.wildcard_count() != dst.wildcard_count() {
            return Err(Error::PatternMismatch(format!(
                "{src_raw:?} has {} wildcard(s), {dst_raw:?} has {}",
                src.wildcard_count(),
                dst.wildcard_count()
            ))
            .into());
        }

        let scan = self.scan()?;
        let mut renames: Vec<(String, String)> = Vec::new();
        for path in scan.sorted_paths() {
            if let Some(captures) = src.captures(path) {
                let target = dst.substitute(&captures)?;
                let target = if target.starts_with("./") {
                    target
                } else {
                    format!("./{target}")
                };
                renames.push((path.clone(), target));
            }
        }

        if renames.is_empty() {
            return Err(Error::PatternMismatch(format!(
                "pattern {src_raw:?} matches no working file"
            ))
            .into());
        }
        let mut seen = ahash::AHashSet::new();
        for (_, target) in &renames {
            if !seen.insert(target.clone()) {
                return Err(Error::PatternMismatch(format!(
                    "rename produces duplicate target {target:?}"
                ))
                .into());
            }
            if scan.contains(target) && !renames.iter().any(|(s, _)| s == target) {
                return Err(Error::PatternMismatch(format!(
                    "rename target {target:?} already exists"
                ))
                .into());
            }
        }

        for (source, target) in &renames {
            let from = self.abs_path(source)?;
            let to = self.abs_path(target)?;
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::rename(&from, &to).map_err(|e| Error::io(&from, e))?;
        }

        for tracked in &mut self.meta.config.tracked {
            if tracked == src_raw {
                *tracked = dst_raw.to_string();
            }
        }
        self.save_meta()?;
        Ok(renames)
    }

    /// Commit history of the current branch, oldest first
    pub fn log(&self) -> Result<Vec<CommitInfo>> {
        let branch = self.meta.current_branch;
        let head = self.meta.branch(branch)?.head;
        let mut commits = Vec::with_capacity(head as usize + 1);
        for r in 0..=head {
            commits.push(RevisionRecord::load(&self.revision_dir(branch, r))?.commit);
        }
        Ok(commits)
    }

    /// Number of blobs first stored at `(branch, revision)`. Zero for a
    /// revision whose delta only carried tombstones or deduplicated content.
    pub fn revision_blob_count(&self, branch: BranchId, revision: u64) -> Result<usize> {
        Ok(blobs_in_folder(&self.revision_dir(branch, revision))?.len())
    }

    /// Live paths at the current revision, sorted, each annotated with the
    /// tracked patterns matching it (computed on demand).
    pub fn ls(&mut self) -> Result<Vec<(String, PathInfo, Vec<String>)>> {
        let set = self.reconstruct(self.meta.current_branch, self.meta.current_revision)?;
        let patterns: Vec<(String, Pattern)> = self
            .meta
            .config
            .tracked
            .iter()
            .map(|raw| (raw.clone(), Pattern::parse(raw)))
            .collect();

        let mut entries: Vec<(&String, &PathInfo)> = set.live().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut listing = Vec::new();
        for (path, info) in entries {
            let matching = patterns
                .iter()
                .filter(|(_, p)| p.matches(path))
                .map(|(raw, _)| raw.clone())
                .collect();
            listing.push((path.clone(), info.clone(), matching));
        }
        Ok(listing)
    }

    /// Read the recorded blob for `path` at the current revision
    pub fn recorded_content(&mut self, path: &str) -> Result<Vec<u8>> {
        let branch = self.meta.current_branch;
        let revision = self.meta.current_revision;
        let set = self.reconstruct(branch, revision)?;
        let info = set
            .get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        let hash = info
            .state
            .hash()
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        let store = ContentStore::open(self.blob_chain(branch, revision)?, self.meta.config.compress);
        store.get(&hash)
    }

    /// Tear the repository down (the `online` operation): removes the
    /// metadata root. Refuses on a dirty working tree unless forced.
    pub fn dissolve(mut self, force: bool) -> Result<()> {
        if !force && self.is_dirty()? {
            return Err(Error::DirtyWorkingTree.into());
        }
        fs::remove_dir_all(&self.sos_dir).map_err(|e| Error::io(&self.sos_dir, e))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Revision specs
    // ------------------------------------------------------------------

    /// Resolve a revision spec to a concrete (branch, revision) pair.
    ///
    /// Accepted forms: `branch/revision`, `/revision` (current branch),
    /// `branch/` (branch head), `/-N` (N back from the current branch's
    /// head), and a bare branch name (its head).
    pub fn resolve_spec(&self, spec: &str) -> Result<(BranchId, u64)> {
        let unknown = || Error::UnknownRevision(spec.to_string());

        let (branch_part, rev_part) = match spec.split_once('/') {
            Some((b, r)) => (b, Some(r)),
            None => (spec, None),
        };

        let branch = if branch_part.is_empty() {
            self.meta.branch(self.meta.current_branch)?.clone()
        } else {
            match self.meta.branch_by_name(branch_part) {
                Some(info) => info.clone(),
                None => {
                    // Numeric branch ids are accepted too.
                    let id: u32 = branch_part.parse().map_err(|_| unknown())?;
                    self.meta.branch(BranchId(id)).map_err(|_| unknown())?.clone()
                }
            }
        };

        let revision = match rev_part {
            None | Some("") => branch.head,
            Some(r) if r.starts_with('-') => {
                let back: u64 = r[1..].parse().map_err(|_| unknown())?;
                branch.head.checked_sub(back).ok_or_else(unknown)?
            }
            Some(r) => {
                let rev: u64 = r.parse().map_err(|_| unknown())?;
                if rev > branch.head {
                    return Err(unknown().into());
                }
                rev
            }
        };
        Ok((branch.id, revision))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn save_meta(&self) -> Result<()> {
        self.meta.save(&self.sos_dir)
    }

    fn branch_dir(&self, id: BranchId) -> PathBuf {
        self.sos_dir.join(format!("b{}", id.0))
    }

    fn revision_dir(&self, id: BranchId, revision: u64) -> PathBuf {
        self.branch_dir(id).join(format!("r{revision}"))
    }

    /// Revision folders readable at `(branch, revision)`, nearest first:
    /// this branch back to r0, then the parent's folders from the fork
    /// revision down, recursively.
    fn blob_chain(&self, branch: BranchId, revision: u64) -> Result<Vec<PathBuf>> {
        let mut folders = Vec::new();
        let mut cursor = Some((branch, revision));
        while let Some((b, r)) = cursor {
            for rev in (0..=r).rev() {
                folders.push(self.revision_dir(b, rev));
            }
            let info = self.meta.branch(b)?;
            cursor = info.parent.zip(info.forked_at);
        }
        Ok(folders)
    }

    /// Turn a normalized path key into an absolute working path, refusing
    /// anything that would escape the repository root.
    fn abs_path(&self, key: &str) -> Result<PathBuf> {
        let rel = key.strip_prefix("./").unwrap_or(key);
        let rel_path = Path::new(rel);
        for component in rel_path.components() {
            match component {
                Component::Normal(_) => {}
                _ => anyhow::bail!("path escapes repository: {key}"),
            }
        }
        Ok(self.root.join(rel_path))
    }

    fn write_working_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let abs = self.abs_path(key)?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&abs, data).map_err(|e| Error::io(&abs, e))?;
        Ok(())
    }

    /// Write a full-snapshot revision record (revision 0 of a branch),
    /// storing any blob not already reachable through `parent_chain`.
    fn write_snapshot_revision(
        &mut self,
        branch: BranchId,
        revision: u64,
        seed: &PathSet,
        message: Option<String>,
        parent_chain: &[PathBuf],
    ) -> Result<()> {
        let rev_dir = self.revision_dir(branch, revision);
        fs::create_dir_all(&rev_dir).map_err(|e| Error::io(&rev_dir, e))?;

        let mut folders = vec![rev_dir.clone()];
        folders.extend_from_slice(parent_chain);
        let store = ContentStore::open(folders, self.meta.config.compress);

        let mut snapshot = PathSet::new();
        for (path, info) in seed.iter() {
            match info.state {
                FileState::Live { hash, .. } => {
                    let mut info = info.clone();
                    if !store.exists(&hash) {
                        let abs = self.abs_path(path)?;
                        let data = fs::read(&abs).map_err(|e| Error::io(&abs, e))?;
                        let actual = store.put(&data)?;
                        info.state = FileState::Live {
                            hash: actual,
                            size: data.len() as u64,
                        };
                    }
                    snapshot.insert(path.clone(), info);
                }
                // Tombstones from a parent reconstruction carry over.
                FileState::Deleted => snapshot.insert(path.clone(), info.clone()),
            }
        }

        let record = RevisionRecord {
            commit: CommitInfo {
                revision,
                branch,
                message,
                ts_unix_ms: current_timestamp_ms(),
            },
            delta: snapshot,
        };
        record.save(&rev_dir)
    }
}

/// Walk up from `start` to find the directory containing `.sos/`
pub fn find_root(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(SOS_DIR).is_dir() {
            return Ok(current);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => anyhow::bail!("not a sos repository (no {SOS_DIR} directory found)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_repo(dir: &TempDir) -> Repository {
        Repository::init(dir.path(), false, RepoConfig::default()).unwrap()
    }

    fn write(dir: &TempDir, name: &str, data: &[u8]) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, data).unwrap();
    }

    #[test]
    fn test_init_refuses_reinit() {
        let dir = TempDir::new().unwrap();
        let _repo = init_repo(&dir);

        let err = Repository::init(dir.path(), false, RepoConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::AlreadyInitialized(_))
        ));

        // Forced re-init starts over.
        assert!(Repository::init(dir.path(), true, RepoConfig::default()).is_ok());
    }

    #[test]
    fn test_commit_requires_changes() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", b"hello");
        let mut repo = init_repo(&dir);

        let err = repo.commit(None, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NothingToCommit)
        ));

        // Forced empty commit: revision folder holds only the record.
        let rev = repo.commit(None, true).unwrap();
        assert_eq!(rev, 1);
        let names: Vec<_> = fs::read_dir(repo.revision_dir(BranchId(0), 1))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![RevisionRecord::FILE_NAME.to_string()]);
        assert_eq!(repo.revision_blob_count(BranchId(0), 1).unwrap(), 0);
    }

    #[test]
    fn test_revision_blob_count() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", b"first file");
        let mut repo = init_repo(&dir);
        assert_eq!(repo.revision_blob_count(BranchId(0), 0).unwrap(), 1);

        write(&dir, "b.txt", b"second file");
        write(&dir, "a.txt", b"first file, edited");
        repo.commit(None, false).unwrap();
        assert_eq!(repo.revision_blob_count(BranchId(0), 1).unwrap(), 2);
    }

    #[test]
    fn test_changes_classification() {
        let dir = TempDir::new().unwrap();
        write(&dir, "keep.txt", b"same");
        write(&dir, "edit.txt", b"v1");
        write(&dir, "gone.txt", b"bye");
        let mut repo = init_repo(&dir);

        write(&dir, "edit.txt", b"v2");
        write(&dir, "new.txt", b"fresh");
        fs::remove_file(dir.path().join("gone.txt")).unwrap();

        let (changes, _) = repo.find_changes(BranchId(0), 0).unwrap();
        assert_eq!(changes.additions.len(), 1);
        assert!(changes.additions.contains("./new.txt"));
        assert_eq!(changes.modifications.len(), 1);
        assert!(changes.modifications.contains("./edit.txt"));
        assert_eq!(changes.deletions.len(), 1);
        assert!(changes.deletions.contains("./gone.txt"));
    }

    #[test]
    fn test_sequential_reconstruction_with_tombstones() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a", b"a0");
        let mut repo = init_repo(&dir);

        // r1: modify a
        write(&dir, "a", b"a1");
        repo.commit(Some("edit a".into()), false).unwrap();
        // r2: add b
        write(&dir, "b", b"b0");
        repo.commit(Some("add b".into()), false).unwrap();
        // r3: delete a
        fs::remove_file(dir.path().join("a")).unwrap();
        repo.commit(Some("drop a".into()), false).unwrap();
        // r4: no changes, forced
        repo.commit(None, true).unwrap();

        let set = repo.reconstruct(BranchId(0), 4).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.get("./a").unwrap().is_deleted());
        assert!(!set.get("./b").unwrap().is_deleted());
        assert_eq!(set.live_len(), 1);

        // Re-adding a must come back as an addition.
        write(&dir, "a", b"a2");
        let (changes, _) = repo.find_changes(BranchId(0), 4).unwrap();
        assert!(changes.additions.contains("./a"));
        assert!(changes.modifications.is_empty());
    }

    #[test]
    fn test_switch_restores_and_guards_dirty() {
        let dir = TempDir::new().unwrap();
        let original = vec![b'x'; 100];
        write(&dir, "file.bin", &original);
        let mut repo = init_repo(&dir);

        write(&dir, "file.bin", b"changed");
        repo.commit(Some("change".into()), false).unwrap();

        // Dirty tree blocks the switch.
        write(&dir, "file.bin", b"dirty edit");
        let err = repo.switch("/0", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::DirtyWorkingTree)
        ));

        repo.switch("/0", true).unwrap();
        assert_eq!(fs::read(dir.path().join("file.bin")).unwrap(), original);
        assert_eq!(repo.meta().current_revision, 0);
    }

    #[test]
    fn test_resolve_spec_forms() {
        let dir = TempDir::new().unwrap();
        write(&dir, "f", b"0");
        let mut repo = init_repo(&dir);
        write(&dir, "f", b"1");
        repo.commit(None, false).unwrap();
        write(&dir, "f", b"2");
        repo.commit(None, false).unwrap();

        assert_eq!(repo.resolve_spec("trunk/1").unwrap(), (BranchId(0), 1));
        assert_eq!(repo.resolve_spec("/1").unwrap(), (BranchId(0), 1));
        assert_eq!(repo.resolve_spec("trunk/").unwrap(), (BranchId(0), 2));
        assert_eq!(repo.resolve_spec("trunk").unwrap(), (BranchId(0), 2));
        assert_eq!(repo.resolve_spec("/-1").unwrap(), (BranchId(0), 1));
        assert_eq!(repo.resolve_spec("0/2").unwrap(), (BranchId(0), 2));

        for bad in ["trunk/3", "nope/", "/-9", "/x"] {
            let err = repo.resolve_spec(bad).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<Error>(), Some(Error::UnknownRevision(_))),
                "expected UnknownRevision for {bad:?}"
            );
        }
    }

    #[test]
    fn test_branch_fork_and_delete() {
        let dir = TempDir::new().unwrap();
        write(&dir, "f", b"base");
        let mut repo = init_repo(&dir);

        let id = repo.create_branch("feature", false, false).unwrap();
        assert_eq!(repo.meta().current_branch, id);
        assert_eq!(repo.meta().current_revision, 0);

        write(&dir, "f", b"feature work");
        repo.commit(None, false).unwrap();

        // The fork shares the parent's blobs: r0 of the fork wrote none.
        let r0_blobs: Vec<_> = fs::read_dir(repo.revision_dir(id, 0))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n != RevisionRecord::FILE_NAME)
            .collect();
        assert!(r0_blobs.is_empty());

        // Deleting the branch we're on is refused...
        assert!(repo.delete_branch("feature", false).is_err());
        // ...and so is deleting a branch another one forked from.
        repo.switch("trunk/", true).unwrap();
        let _ = repo.create_branch("feature2", true, true).unwrap();
        assert!(repo.delete_branch("trunk", false).is_err());

        repo.delete_branch("feature", false).unwrap();
        assert!(repo.meta().branch_by_name("feature").is_none());
        assert!(!repo.branch_dir(id).exists());
    }

    #[test]
    fn test_picky_mode_gates_additions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tracked.txt", b"t");
        let mut repo = init_repo(&dir);
        repo.set_config_flag("picky", "on").unwrap();
        repo.add_pattern("*.txt").unwrap();

        write(&dir, "new.txt", b"in");
        write(&dir, "new.dat", b"out");
        let (changes, _) = repo.find_changes(BranchId(0), 0).unwrap();
        assert!(changes.additions.contains("./new.txt"));
        assert!(!changes.additions.contains("./new.dat"));
    }

    #[test]
    fn test_move_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "old_a.txt", b"a");
        write(&dir, "old_b.txt", b"b");
        let mut repo = init_repo(&dir);
        repo.add_pattern("old_*.txt").unwrap();

        let renames = repo.move_files("old_*.txt", "new_*.txt").unwrap();
        assert_eq!(renames.len(), 2);
        assert!(dir.path().join("new_a.txt").exists());
        assert!(!dir.path().join("old_a.txt").exists());
        assert!(repo.config().tracked.contains(&"new_*.txt".to_string()));

        // Source matching nothing is a pattern error.
        let err = repo.move_files("missing_*", "x_*").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PatternMismatch(_))
        ));
        // Wildcard count mismatch too.
        let err = repo.move_files("new_*.txt", "flat.txt").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PatternMismatch(_))
        ));
    }

    #[test]
    fn test_update_merges_both_sides() {
        let dir = TempDir::new().unwrap();
        write(&dir, "doc.txt", b"a\nb\ncc\nd");
        let mut repo = init_repo(&dir);

        // Their side: a committed edit.
        write(&dir, "doc.txt", b"a\nb\nee\nd");
        repo.commit(Some("theirs".into()), false).unwrap();
        repo.switch("/0", true).unwrap();

        // My side: an uncommitted local edit on top of r0.
        write(&dir, "doc.txt", b"a\nb\ncc\nd\nmine");

        let policy = UpdatePolicy {
            operation: MergeOperation::Insert,
            resolution: ConflictResolution::default(),
            add_only: false,
        };
        repo.update("/1", policy, None).unwrap();

        let merged = fs::read(dir.path().join("doc.txt")).unwrap();
        assert_eq!(merged, b"a\nb\ncc\nee\nd\nmine");
        assert_eq!(repo.meta().current_revision, 1);
    }

    #[test]
    fn test_update_add_only_never_overwrites() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", b"v0");
        let mut repo = init_repo(&dir);

        write(&dir, "a.txt", b"v1");
        write(&dir, "b.txt", b"new in r1");
        repo.commit(None, false).unwrap();
        // Switching back to r0 drops b.txt again.
        repo.switch("/0", true).unwrap();
        assert!(!dir.path().join("b.txt").exists());

        write(&dir, "a.txt", b"local");
        let policy = UpdatePolicy {
            add_only: true,
            ..Default::default()
        };
        repo.update("/1", policy, None).unwrap();

        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"local");
        assert_eq!(fs::read(dir.path().join("b.txt")).unwrap(), b"new in r1");
    }
}
