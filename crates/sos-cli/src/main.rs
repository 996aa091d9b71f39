//! sos CLI - the sos command

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sos_merge::{ConflictResolution, MergeOperation};

mod cmd;
mod util;

/// sos - Save Our Sources, a lightweight filesystem version manager
#[derive(Parser)]
#[command(name = "sos")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Put the current directory under version management
    Offline {
        /// Re-initialize even if a repository already exists (destroys history)
        #[arg(long)]
        force: bool,
        /// Start in picky mode: only explicitly added patterns are committed
        #[arg(long)]
        picky: bool,
    },
    /// Dissolve the repository, leaving the working files in place
    Online {
        /// Proceed even with uncommitted changes
        #[arg(short, long)]
        force: bool,
    },
    /// List branches, or fork a new one off the current branch
    Branch {
        /// Name for the new branch (omit to list branches)
        name: Option<String>,
        /// Seed from the current branch's last revision instead of the working directory
        #[arg(short, long)]
        last: bool,
        /// Create the branch but keep working on the current one
        #[arg(short, long)]
        stay: bool,
    },
    /// Delete a branch and its stored history
    Delete {
        /// Branch name
        name: String,
        /// Delete even the current branch, or one with forks
        #[arg(short, long)]
        force: bool,
    },
    /// Make the working directory match a revision exactly
    Switch {
        /// Revision spec: branch/rev, /rev, branch/, /-N, or a branch name
        spec: String,
        /// Discard uncommitted changes
        #[arg(short, long)]
        force: bool,
    },
    /// Pull a revision into the working directory, merging local edits
    Update {
        /// Revision spec (default: current branch's head)
        spec: Option<String>,
        /// Only create new files; never touch existing ones
        #[arg(short, long)]
        add_only: bool,
        /// Which side of the diff to apply
        #[arg(short, long, value_enum, default_value_t = OperationArg::Both)]
        operation: OperationArg,
        /// How to settle conflicting regions
        #[arg(short, long, value_enum, default_value_t = ResolutionArg::Mine)]
        resolution: ResolutionArg,
    },
    /// Record the working directory's changes as a new revision
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
        /// Record a revision even with no changes
        #[arg(short, long)]
        force: bool,
    },
    /// Show changes between the working directory and the current revision
    Changes,
    /// Show a line diff of a file against its recorded content
    Diff {
        /// File path (relative to the repository root)
        path: String,
        /// Number of context lines
        #[arg(short = 'U', long, default_value = "3")]
        context: usize,
    },
    /// Track a pattern (picky mode) so matching files are committed
    Add {
        /// Glob pattern, e.g. "src/*.rs"
        pattern: String,
    },
    /// Stop tracking a pattern (files themselves are untouched)
    Remove {
        /// Previously added pattern
        pattern: String,
    },
    /// Rename files by pattern, e.g. "old_*.txt" "new_*.txt"
    #[command(name = "move")]
    Move {
        /// Source pattern
        src: String,
        /// Target pattern (same number of wildcards)
        dst: String,
    },
    /// List files recorded at the current revision
    Ls,
    /// Show the current branch's commit history
    Log,
    /// Show or change repository configuration
    Config {
        /// Config key (omit to show everything)
        key: Option<String>,
        /// New value for a flag, or the entry to add/remove for a list
        value: Option<String>,
        /// Add `value` to the list under `key`
        #[arg(long)]
        add: bool,
        /// Remove `value` from the list under `key`
        #[arg(long)]
        remove: bool,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum OperationArg {
    Insert,
    Remove,
    Both,
}

impl From<OperationArg> for MergeOperation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Insert => MergeOperation::Insert,
            OperationArg::Remove => MergeOperation::Remove,
            OperationArg::Both => MergeOperation::Both,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum ResolutionArg {
    Mine,
    Theirs,
    Ask,
}

impl From<ResolutionArg> for ConflictResolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::Mine => ConflictResolution::Mine,
            ResolutionArg::Theirs => ConflictResolution::Theirs,
            ResolutionArg::Ask => ConflictResolution::Ask,
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Offline { force, picky } => cmd::offline::run(force, picky),
        Commands::Online { force } => cmd::online::run(force),
        Commands::Branch { name, last, stay } => cmd::branch::run(name.as_deref(), last, stay),
        Commands::Delete { name, force } => cmd::delete::run(&name, force),
        Commands::Switch { spec, force } => cmd::switch::run(&spec, force),
        Commands::Update {
            spec,
            add_only,
            operation,
            resolution,
        } => cmd::update::run(
            spec.as_deref().unwrap_or("/"),
            add_only,
            operation.into(),
            resolution.into(),
        ),
        Commands::Commit { message, force } => cmd::commit::run(message, force),
        Commands::Changes => cmd::changes::run(),
        Commands::Diff { path, context } => cmd::diff::run(&path, context),
        Commands::Add { pattern } => cmd::add::run(&pattern),
        Commands::Remove { pattern } => cmd::remove::run(&pattern),
        Commands::Move { src, dst } => cmd::mv::run(&src, &dst),
        Commands::Ls => cmd::ls::run(),
        Commands::Log => cmd::log::run(),
        Commands::Config {
            key,
            value,
            add,
            remove,
        } => cmd::config::run(key.as_deref(), value.as_deref(), add, remove),
    }
}
