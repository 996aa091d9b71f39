//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use owo_colors::OwoColorize;
use sos_merge::{Conflict, ConflictSide, ResolveConflict};
use sos_repo::Repository;
use std::io::Write;

/// Open the repository containing the current directory
pub fn open_repo() -> Result<Repository> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Repository::open(&cwd)
}

/// Format a millisecond timestamp as local time ("2026-08-30 14:30:05")
pub fn format_time(ts_ms: u64) -> String {
    match Local.timestamp_millis_opt(ts_ms as i64).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "?".to_string(),
    }
}

/// Format a file size in human-readable units
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Interactive conflict resolver: shows both sides of every conflicting
/// block and asks on stdin which one to keep.
pub struct StdinResolver;

impl ResolveConflict for StdinResolver {
    fn choose(&mut self, conflict: &Conflict<'_>) -> Result<ConflictSide> {
        println!();
        println!("{}", "Conflict - both sides changed this block".bold());
        println!("{}", "<<< mine".red());
        for line in &conflict.mine {
            println!("  {}", String::from_utf8_lossy(line).red());
        }
        println!("{}", ">>> theirs".green());
        for line in &conflict.theirs {
            println!("  {}", String::from_utf8_lossy(line).green());
        }

        loop {
            print!("Keep which side? m[i]ne / [t]heirs: ");
            std::io::stdout().flush()?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            match input.trim() {
                "i" | "mine" => return Ok(ConflictSide::Mine),
                "t" | "theirs" => return Ok(ConflictSide::Theirs),
                "" => anyhow::bail!("merge aborted"),
                other => println!("Unrecognized answer: {other:?}"),
            }
        }
    }
}
