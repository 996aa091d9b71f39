//! Make the working directory match a revision exactly

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use sos_core::Error;

pub fn run(spec: &str, force: bool) -> Result<()> {
    let mut repo = util::open_repo()?;

    match repo.switch(spec, force) {
        Ok(()) => {
            let branch = repo.meta().branch(repo.meta().current_branch)?;
            println!(
                "{} Now on {}/r{}",
                "✓".green(),
                branch.name.cyan(),
                repo.meta().current_revision
            );
            Ok(())
        }
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::DirtyWorkingTree)) => {
            println!(
                "{} Uncommitted changes would be lost; commit first or pass {}",
                "✗".red(),
                "--force".yellow()
            );
            Err(e)
        }
        Err(e) => Err(e),
    }
}
