//! Zettel CLI
//!
//! Command-line interface for a directory of zettel notes.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use zettel_core::Config;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "zettel")]
#[command(about = "Zettel - notes kept as plain files, indexed live")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all notes
    #[command(alias = "ls")]
    List {
        /// Only notes with more than one content file
        #[arg(long)]
        duplicates: bool,
    },
    /// Show where a note's files live
    Show {
        /// Note ID (14 digits)
        id: String,
    },
    /// Create a new, empty note
    New {
        /// Extension of the content file
        #[arg(short, long, default_value = "md")]
        ext: String,
    },
    /// Give a note a new ID, renaming its files
    #[command(alias = "mv")]
    Rename {
        /// Current note ID
        old: String,
        /// New note ID
        new: String,
    },
    /// Delete a note and its files
    #[command(alias = "rm")]
    Delete {
        /// Note ID (14 digits)
        id: String,
    },
    /// Print index changes until interrupted
    Watch,
    /// Show directory status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (notes_dir, rescan_interval_secs, debounce_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands don't need the directory
    if let Commands::Config { command } = cli.command {
        return handle_config_command(command, config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    let directory = commands::open_directory(&config).await?;

    match cli.command {
        Commands::List { duplicates } => commands::note::list(&directory, duplicates, &output).await,
        Commands::Show { id } => commands::note::show(&directory, id, &output).await,
        Commands::New { ext } => commands::note::create(&directory, ext, &output).await,
        Commands::Rename { old, new } => {
            commands::note::rename(&directory, old, new, &output).await
        }
        Commands::Delete { id } => commands::note::delete(&directory, id, &output).await,
        Commands::Watch => commands::watch::watch(&directory, &output).await,
        Commands::Status => commands::status::show(&directory, &config, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// `RUST_LOG` wins over the configured level. Logs go to `log_file` when
/// set, otherwise to stderr.
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "zettel_core={},zettel_cli={}",
            config.log_level, config.log_level
        ))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    // Ignore errors if a subscriber is already installed
    match &config.log_file {
        Some(path) => {
            let log_file = match File::options().create(true).append(true).open(path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", path, e);
                    let _ = builder.with_writer(std::io::stderr).try_init();
                    return;
                }
            };
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }

    debug!("logging initialized");
}
