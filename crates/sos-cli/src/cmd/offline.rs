//! Put the current directory under version management

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use sos_repo::{RepoConfig, Repository};

pub fn run(force: bool, picky: bool) -> Result<()> {
    // 1. Build the starting configuration
    let mut config = RepoConfig::default();
    config.picky = picky;

    // 2. Initialize and take the revision-0 snapshot
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let mut repo = Repository::init(&cwd, force, config)?;

    let listing = repo.ls()?;
    println!(
        "{} Repository initialized with {} file(s) on branch {}",
        "✓".green(),
        listing.len(),
        "trunk".cyan()
    );
    if picky {
        println!(
            "{}",
            "Picky mode is on: new files need `sos add <pattern>` before they commit".dimmed()
        );
    }
    Ok(())
}
