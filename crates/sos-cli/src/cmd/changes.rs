//! Show changes between the working directory and the current revision

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run() -> Result<()> {
    let mut repo = util::open_repo()?;
    let branch = repo.meta().current_branch;
    let revision = repo.meta().current_revision;
    let (changes, _) = repo.find_changes(branch, revision)?;

    if changes.is_empty() {
        println!(
            "{}",
            format!("No changes since r{revision}").dimmed()
        );
        return Ok(());
    }

    let mut rows: Vec<(char, &String)> = Vec::new();
    rows.extend(changes.additions.iter().map(|p| ('A', p)));
    rows.extend(changes.modifications.iter().map(|p| ('M', p)));
    rows.extend(changes.deletions.iter().map(|p| ('D', p)));
    rows.sort_by(|a, b| a.1.cmp(b.1));

    for (kind, path) in rows {
        match kind {
            'A' => println!("  {} {}", "A".green(), path),
            'M' => println!("  {} {}", "M".yellow(), path),
            _ => println!("  {} {}", "D".red(), path),
        }
    }
    println!();
    println!(
        "{} added, {} modified, {} deleted",
        changes.additions.len(),
        changes.modifications.len(),
        changes.deletions.len()
    );
    Ok(())
}
