//! Delete a branch and its stored history

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(name: &str, force: bool) -> Result<()> {
    let mut repo = util::open_repo()?;
    repo.delete_branch(name, force)?;
    println!("{} Branch {} deleted", "✓".green(), name.cyan());
    Ok(())
}
