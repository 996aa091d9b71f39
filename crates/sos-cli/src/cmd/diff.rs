//! Line diff of a working file against its recorded content

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use similar::TextDiff;
use sos_core::Error;
use std::fs;

pub fn run(path: &str, context: usize) -> Result<()> {
    let mut repo = util::open_repo()?;

    // Path keys are normalized with a leading "./".
    let key = if path.starts_with("./") {
        path.to_string()
    } else {
        format!("./{path}")
    };

    // 1. Recorded side (empty if the file is new)
    let recorded = match repo.recorded_content(&key) {
        Ok(data) => data,
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::NotFound(_))) => Vec::new(),
        Err(e) => return Err(e),
    };

    // 2. Working side (empty if the file was deleted)
    let abs = repo.root().join(key.trim_start_matches("./"));
    let working = match fs::read(&abs) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", abs.display()))?,
    };

    if recorded == working {
        println!("{}", format!("{key}: no changes").dimmed());
        return Ok(());
    }

    // 3. Render a unified diff, recorded on the left
    let revision = repo.meta().current_revision;
    let diff = TextDiff::from_lines(&recorded[..], &working[..]);
    let header = diff
        .unified_diff()
        .context_radius(context)
        .header(&format!("{key}@r{revision}"), &format!("{key} (working)"))
        .to_string();

    for line in header.lines() {
        if line.starts_with('+') && !line.starts_with("+++") {
            println!("{}", line.green());
        } else if line.starts_with('-') && !line.starts_with("---") {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{line}");
        }
    }
    Ok(())
}
