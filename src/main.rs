//! Binary entry point for stashd.
//!
//! This binary provides the CLI interface for the stashd clipboard history.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use stashd::cli::{self, OutputFormat};
use stashd::observability::{self, LoggingConfig};
use stashd::{CancelToken, ClipId, ClipStore, StashConfig};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Stashd - clipboard history for wlroots-based Wayland compositors.
#[derive(Parser)]
#[command(name = "stashd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Storage root holding `history.db` and `blob/`.
    #[arg(short, long, global = true, env = "STASHD_DATABASE")]
    database: Option<PathBuf>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (repeatable).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable logging.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Capture clipboard changes until interrupted.
    Watch,

    /// Search clipboard history.
    Search {
        /// Query words; empty lists the most recent clips.
        query: Vec<String>,

        /// Maximum number of results.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Rebuild the full-text index before searching.
        #[arg(short, long)]
        sync: bool,

        /// Output format: simple, json, json-stream, or a template such as `{{.ID}}: {{.Text}}`.
        #[arg(short, long, default_value = "simple")]
        format: OutputFormat,
    },

    /// Print one clip as JSON.
    Get {
        /// Clip id.
        id: ClipId,
    },

    /// Delete clips by id.
    Delete {
        /// Clip ids.
        #[arg(required = true)]
        ids: Vec<ClipId>,
    },

    /// Delete all history.
    Wipe,

    /// Put a stored clip back on the clipboard.
    #[command(alias = "set")]
    Restore {
        /// Clip id.
        id: ClipId,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration, installs logging, opens the store and runs the
/// selected command.
fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        StashConfig::resolve(cli.config.as_deref()).context("loading configuration")?;
    if let Some(database) = cli.database {
        config = config.with_database(database);
    }

    let logging = LoggingConfig::from_settings(&config.logging, cli.verbose, cli.quiet)?;
    observability::init(logging).context("initializing logging")?;

    let store = ClipStore::from_config(&config)
        .with_context(|| format!("opening history at {}", config.database.display()))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Watch => {
            let cancel = CancelToken::new();
            let handler_token = cancel.clone();
            ctrlc::set_handler(move || handler_token.cancel())
                .context("installing signal handler")?;
            cli::watch::execute(&config, &store, &cancel)?;
        },
        Commands::Search {
            query,
            limit,
            sync,
            format,
        } => {
            let limit = limit.unwrap_or(config.search_limit);
            cli::search::execute(&store, &query, limit, sync, &format, &mut out)?;
        },
        Commands::Get { id } => cli::get::execute(&store, id, &mut out)?,
        Commands::Delete { ids } => {
            cli::delete::execute(&store, &ids, &mut out)?;
        },
        Commands::Wipe => {
            cli::wipe::execute(&store, &mut out)?;
        },
        Commands::Restore { id } => cli::restore::execute(&store, id, &config.restore_command)?,
    }
    Ok(())
}
