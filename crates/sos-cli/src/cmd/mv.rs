//! Rename working files by pattern

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(src: &str, dst: &str) -> Result<()> {
    let mut repo = util::open_repo()?;
    let renames = repo.move_files(src, dst)?;

    for (from, to) in &renames {
        println!("  {} {} {}", from, "->".dimmed(), to.cyan());
    }
    println!("{} Moved {} file(s)", "✓".green(), renames.len());
    Ok(())
}
