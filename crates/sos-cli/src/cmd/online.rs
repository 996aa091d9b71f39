//! Dissolve the repository, leaving working files alone

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use sos_core::Error;

pub fn run(force: bool) -> Result<()> {
    let repo = util::open_repo()?;
    let root = repo.root().to_path_buf();

    match repo.dissolve(force) {
        Ok(()) => {
            println!(
                "{} Repository at {} dissolved; your files are untouched",
                "✓".green(),
                root.display()
            );
            Ok(())
        }
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::DirtyWorkingTree)) => {
            println!(
                "{} There are uncommitted changes; commit them or pass {}",
                "✗".red(),
                "--force".yellow()
            );
            Err(e)
        }
        Err(e) => Err(e),
    }
}
