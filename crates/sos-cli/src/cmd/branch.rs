//! List branches or fork a new one

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(name: Option<&str>, last: bool, stay: bool) -> Result<()> {
    let mut repo = util::open_repo()?;

    // No name: list the branch table.
    let Some(name) = name else {
        let current = repo.meta().current_branch;
        for info in &repo.meta().branches {
            let marker = if info.id == current { "*" } else { " " };
            let parent = match info.parent {
                Some(pid) => repo
                    .meta()
                    .branch(pid)
                    .map(|p| format!("  (from {}/{})", p.name, info.forked_at.unwrap_or(0)))
                    .unwrap_or_default(),
                None => String::new(),
            };
            println!(
                "{} {} {} head r{}{}",
                marker.green(),
                info.name.cyan(),
                format!("b{}", info.id).dimmed(),
                info.head,
                parent.dimmed()
            );
        }
        return Ok(());
    };

    // 1. Fork off the current branch
    let id = repo.create_branch(name, last, stay)?;
    let seeded = if last {
        "the last committed revision"
    } else {
        "the working directory"
    };
    println!(
        "{} Branch {} ({}) created from {}",
        "✓".green(),
        name.cyan(),
        format!("b{id}").dimmed(),
        seeded
    );

    // 2. Report where we are now
    if stay {
        println!(
            "Still on {}",
            repo.meta().branch(repo.meta().current_branch)?.name.cyan()
        );
    } else {
        println!("Now on {} at r0", name.cyan());
    }
    Ok(())
}
