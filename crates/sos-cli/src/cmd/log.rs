//! Show the current branch's commit history

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run() -> Result<()> {
    let repo = util::open_repo()?;
    let branch = repo.meta().branch(repo.meta().current_branch)?.name.clone();
    let current = repo.meta().current_revision;

    // Newest first.
    for commit in repo.log()?.into_iter().rev() {
        let marker = if commit.revision == current { "*" } else { " " };
        let blobs = repo.revision_blob_count(commit.branch, commit.revision)?;
        println!(
            "{} {} {} {}  {}",
            marker.green(),
            format!("{branch}/r{}", commit.revision).yellow(),
            util::format_time(commit.ts_unix_ms).dimmed(),
            format!("{blobs} blob(s)").dimmed(),
            commit.message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
