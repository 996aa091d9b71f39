//! Stop tracking a pattern (never touches the files themselves)

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(pattern: &str) -> Result<()> {
    let mut repo = util::open_repo()?;
    repo.remove_pattern(pattern)?;
    println!("{} No longer tracking {}", "✓".green(), pattern.cyan());
    Ok(())
}
