//! List files recorded at the current revision

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run() -> Result<()> {
    let mut repo = util::open_repo()?;
    let branch = repo.meta().branch(repo.meta().current_branch)?.name.clone();
    let revision = repo.meta().current_revision;
    let listing = repo.ls()?;

    println!(
        "{} file(s) at {}/r{}",
        listing.len(),
        branch.cyan(),
        revision
    );
    for (path, info, patterns) in &listing {
        let size = info.size().map(util::format_size).unwrap_or_default();
        if patterns.is_empty() {
            println!("  {:<40} {:>10}", path, size.dimmed());
        } else {
            println!(
                "  {:<40} {:>10}  {}",
                path,
                size.dimmed(),
                patterns.join(", ").cyan()
            );
        }
    }
    Ok(())
}
