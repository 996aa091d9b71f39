//! Track a pattern for picky-mode commits

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(pattern: &str) -> Result<()> {
    let mut repo = util::open_repo()?;
    repo.add_pattern(pattern)?;
    println!("{} Tracking {}", "✓".green(), pattern.cyan());
    if !repo.config().picky {
        println!(
            "{}",
            "Note: picky mode is off, so untracked files are committed anyway".dimmed()
        );
    }
    Ok(())
}
