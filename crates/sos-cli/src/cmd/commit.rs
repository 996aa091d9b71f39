//! Record the working directory's changes as a new revision

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use sos_core::Error;

pub fn run(message: Option<String>, force: bool) -> Result<()> {
    let mut repo = util::open_repo()?;

    match repo.commit(message, force) {
        Ok(revision) => {
            let branch = repo.meta().branch(repo.meta().current_branch)?;
            println!(
                "{} Committed {}/r{}",
                "✓".green(),
                branch.name.cyan(),
                revision
            );
            Ok(())
        }
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::NothingToCommit)) => {
            println!("{}", "Nothing to commit".yellow());
            Ok(())
        }
        Err(e) => Err(e),
    }
}
