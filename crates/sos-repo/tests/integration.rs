//! End-to-end repository scenarios against real temp directories

use sos_core::Error;
use sos_repo::{BranchId, RepoConfig, Repository, RevisionRecord, UpdatePolicy, SOS_DIR};
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, data: &[u8]) {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, data).unwrap();
}

#[test]
fn test_offline_commit_switch_cycle() {
    let dir = TempDir::new().unwrap();
    write(&dir, "src/main.txt", b"fn main\n");
    write(&dir, "readme.md", b"# project\n");

    let mut repo = Repository::init(dir.path(), false, RepoConfig::default()).unwrap();
    assert!(dir.path().join(SOS_DIR).is_dir());
    assert!(!repo.is_dirty().unwrap());

    // One modification only.
    write(&dir, "src/main.txt", b"fn main v2\n");
    let (changes, _) = repo.find_changes(BranchId(0), 0).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes.modifications.len(), 1);
    assert!(changes.modifications.contains("./src/main.txt"));

    // The commit's revision folder holds the record plus exactly one blob.
    let rev = repo.commit(Some("edit main".into()), false).unwrap();
    assert_eq!(rev, 1);
    let rev_dir = dir.path().join(SOS_DIR).join("b0").join("r1");
    let mut names: Vec<_> = fs::read_dir(&rev_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&RevisionRecord::FILE_NAME.to_string()));

    // Switching back restores the original bytes.
    repo.switch("/0", false).unwrap();
    assert_eq!(
        fs::read(dir.path().join("src/main.txt")).unwrap(),
        b"fn main\n"
    );
    repo.switch("/1", false).unwrap();
    assert_eq!(
        fs::read(dir.path().join("src/main.txt")).unwrap(),
        b"fn main v2\n"
    );
}

#[test]
fn test_reconstruction_folds_five_revisions_to_two_paths() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a", b"initial a");
    let mut repo = Repository::init(dir.path(), false, RepoConfig::default()).unwrap();

    write(&dir, "a", b"edited a");
    repo.commit(None, false).unwrap();
    write(&dir, "b", b"initial b");
    repo.commit(None, false).unwrap();
    fs::remove_file(dir.path().join("a")).unwrap();
    repo.commit(None, false).unwrap();
    repo.commit(None, true).unwrap();

    let set = repo.reconstruct(BranchId(0), 4).unwrap();
    assert_eq!(set.len(), 2);
    assert!(set.get("./a").unwrap().is_deleted());
    assert_eq!(set.get("./b").unwrap().size(), Some(9));
}

#[test]
fn test_branch_isolation_and_update_across_branches() {
    let dir = TempDir::new().unwrap();
    write(&dir, "shared.txt", b"one\ntwo\nthree\n");
    let mut repo = Repository::init(dir.path(), false, RepoConfig::default()).unwrap();

    repo.create_branch("side", false, false).unwrap();
    write(&dir, "shared.txt", b"one\ntwo\nthree\nfour\n");
    write(&dir, "side-only.txt", b"side file\n");
    repo.commit(Some("side work".into()), false).unwrap();

    // Trunk is untouched by side's commits.
    repo.switch("trunk/", false).unwrap();
    assert_eq!(
        fs::read(dir.path().join("shared.txt")).unwrap(),
        b"one\ntwo\nthree\n"
    );
    assert!(!dir.path().join("side-only.txt").exists());

    // Pulling side's head into trunk's clean tree takes its content.
    repo.update("side/", UpdatePolicy::default(), None).unwrap();
    assert_eq!(
        fs::read(dir.path().join("shared.txt")).unwrap(),
        b"one\ntwo\nthree\nfour\n"
    );
    assert_eq!(
        fs::read(dir.path().join("side-only.txt")).unwrap(),
        b"side file\n"
    );
    assert_eq!(repo.meta().current_branch, BranchId(1));
}

#[test]
fn test_open_walks_up_from_subdirectory() {
    let dir = TempDir::new().unwrap();
    write(&dir, "nested/deep/file.txt", b"x");
    let _repo = Repository::init(dir.path(), false, RepoConfig::default()).unwrap();

    let reopened = Repository::open(&dir.path().join("nested/deep")).unwrap();
    assert_eq!(reopened.root(), dir.path());
    assert!(Repository::open(&TempDir::new().unwrap().path().join("x")).is_err());
}

#[test]
fn test_dissolve_removes_metadata_only() {
    let dir = TempDir::new().unwrap();
    write(&dir, "keep.txt", b"data");
    let repo = Repository::init(dir.path(), false, RepoConfig::default()).unwrap();

    // Dirty tree blocks dissolution unless forced.
    write(&dir, "keep.txt", b"changed");
    let err = repo.dissolve(false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::DirtyWorkingTree)
    ));

    let repo = Repository::open(dir.path()).unwrap();
    repo.dissolve(true).unwrap();
    assert!(!dir.path().join(SOS_DIR).exists());
    assert_eq!(fs::read(dir.path().join("keep.txt")).unwrap(), b"changed");
}

#[test]
fn test_recorded_content_and_log() {
    let dir = TempDir::new().unwrap();
    write(&dir, "f.txt", b"v0");
    let mut repo = Repository::init(dir.path(), false, RepoConfig::default()).unwrap();
    write(&dir, "f.txt", b"v1");
    repo.commit(Some("bump".into()), false).unwrap();

    // Local edits do not leak into the recorded blob.
    write(&dir, "f.txt", b"uncommitted");
    assert_eq!(repo.recorded_content("./f.txt").unwrap(), b"v1");

    let log = repo.log().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].revision, 0);
    assert_eq!(log[1].message.as_deref(), Some("bump"));
}
