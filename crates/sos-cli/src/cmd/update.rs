//! Pull a revision into the working directory, merging local edits

use crate::util::{self, StdinResolver};
use anyhow::Result;
use owo_colors::OwoColorize;
use sos_merge::{ConflictResolution, MergeOperation, ResolveConflict};
use sos_repo::UpdatePolicy;

pub fn run(
    spec: &str,
    add_only: bool,
    operation: MergeOperation,
    resolution: ConflictResolution,
) -> Result<()> {
    let mut repo = util::open_repo()?;

    let policy = UpdatePolicy {
        operation,
        resolution,
        add_only,
    };
    let mut stdin_resolver = StdinResolver;
    let resolver: Option<&mut dyn ResolveConflict> = match resolution {
        ConflictResolution::Ask => Some(&mut stdin_resolver),
        _ => None,
    };

    repo.update(spec, policy, resolver)?;

    let branch = repo.meta().branch(repo.meta().current_branch)?;
    println!(
        "{} Updated to {}/r{}",
        "✓".green(),
        branch.name.cyan(),
        repo.meta().current_revision
    );
    Ok(())
}
