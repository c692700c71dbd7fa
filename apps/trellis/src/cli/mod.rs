//! # Trellis CLI Module
//!
//! This module implements the CLI interface for Trellis.
//!
//! ## Available Commands
//!
//! - `status` - Show catalog overview
//! - `seed` - Import catalog nodes from a JSON file
//! - `audit` - Scan a path for advisory graph issues
//! - `state` - Show a learner's unlock state on a path
//! - `complete` - Record a node completion
//! - `lives` - Show a learner's lives status
//! - `spend-life` - Consume one life (failure event)
//! - `refill` - Restore a learner's full lives budget
//! - `export` - Export the catalog snapshot to a file
//! - `import` - Import a catalog snapshot from a file
//! - `init` - Initialize a new database

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trellis_core::TrellisError;

use crate::config::{self, FileConfig};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Trellis - Learning Path Progression Server
///
/// A deterministic node/path unlock engine. Unlock state is always
/// rederived from the graph and the completion history, never patched.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the progression database (overrides config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show catalog overview
    Status,

    /// Import catalog nodes from a JSON file
    Seed {
        /// Path to the input file (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Scan a path for advisory graph issues
    Audit {
        /// Path id to audit
        #[arg(short, long)]
        path: u64,
    },

    /// Show a learner's unlock state on a path
    State {
        /// Learner id
        #[arg(short, long)]
        user: u64,

        /// Path id
        #[arg(short, long)]
        path: u64,
    },

    /// Record a node completion
    Complete {
        /// Learner id
        #[arg(short, long)]
        user: u64,

        /// Path id
        #[arg(short, long)]
        path: u64,

        /// Node id to complete
        #[arg(short, long)]
        node: u64,
    },

    /// Show a learner's lives status
    Lives {
        /// Learner id
        #[arg(short, long)]
        user: u64,
    },

    /// Consume one life (failure event)
    SpendLife {
        /// Learner id
        #[arg(short, long)]
        user: u64,
    },

    /// Restore a learner's full lives budget
    Refill {
        /// Learner id
        #[arg(short, long)]
        user: u64,
    },

    /// Export the catalog snapshot to a file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import a catalog snapshot from a file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if the database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, file_config: &FileConfig) -> Result<(), TrellisError> {
    let database = config::resolve_database(cli.database, file_config);
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Status) | None => cmd_status(&database, json_mode),
        Some(Commands::Seed { file }) => cmd_seed(&database, json_mode, &file),
        Some(Commands::Audit { path }) => cmd_audit(&database, json_mode, path),
        Some(Commands::State { user, path }) => cmd_state(&database, json_mode, user, path),
        Some(Commands::Complete { user, path, node }) => {
            cmd_complete(&database, json_mode, user, path, node)
        }
        Some(Commands::Lives { user }) => cmd_lives(&database, json_mode, user),
        Some(Commands::SpendLife { user }) => cmd_spend_life(&database, json_mode, user),
        Some(Commands::Refill { user }) => cmd_refill(&database, json_mode, user),
        Some(Commands::Export { output }) => cmd_export(&database, &output),
        Some(Commands::Import { input }) => cmd_import(&database, &input),
        Some(Commands::Init { force }) => cmd_init(&database, force),
    }
}
