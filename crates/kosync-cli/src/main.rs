//! kosync CLI
//!
//! Command-line interface for kosync - reading progress sync with a
//! KOReader sync server.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kosync_core::{Config, HttpTransport, IdentityStrategy, SyncEngine};

mod commands;
mod output;
mod session;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "kosync")]
#[command(about = "kosync - Sync reading progress with a KOReader sync server")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file (defaults to ~/.config/kosync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Document identity strategy (filename or partial)
    #[arg(long, global = true)]
    strategy: Option<IdentityStrategy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check credentials against the server
    Auth,
    /// Show remote progress for a book
    Get {
        /// Book file
        file: String,
    },
    /// Push a page position for a book
    Put {
        /// Book file
        file: String,
        /// Current page
        page: i64,
        /// Total pages
        total: i64,
    },
    /// Reconcile a local page position with the server
    Sync {
        /// Book file
        file: String,
        /// Current page
        page: i64,
        /// Total pages
        total: i64,
    },
    /// Print the document key of a book
    Id {
        /// Book file
        file: String,
    },
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
        /// Configuration key (server_url, device_name, identity_strategy, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work even when the config file is broken
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let mut config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    if let Some(strategy) = cli.strategy {
        config.identity_strategy = strategy;
    }
    init_logging(&config);

    // Identity needs neither credentials nor network
    if let Commands::Id { file } = &cli.command {
        return commands::progress::id(file, config.identity_strategy, &output);
    }

    let credentials = session::credentials_from_env()?;
    let device_id = session::load_or_create_device_id(&config)?;
    let transport = HttpTransport::new(&config.server_url, config.request_timeout())
        .context("Failed to create HTTP client")?;
    let engine = SyncEngine::new(transport, credentials, config.engine_config())
        .with_device_id(device_id);

    match cli.command {
        Commands::Auth => commands::progress::auth(&engine, &output).await,
        Commands::Get { file } => commands::progress::get(&engine, &file, &output).await,
        Commands::Put { file, page, total } => {
            commands::progress::put(&engine, &file, page, total, &output).await
        }
        Commands::Sync { file, page, total } => {
            commands::progress::sync(&engine, &file, page, total, &output).await
        }
        Commands::Id { .. } | Commands::Config { .. } => Ok(()), // Handled above
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

/// Install the log subscriber
///
/// Level comes from `KOSYNC_LOG` (default `warn`). Logs go to `log_file`
/// when configured, stderr otherwise.
fn init_logging(config: &Config) {
    let log_level = std::env::var("KOSYNC_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = EnvFilter::try_new(format!(
        "kosync_core={},kosync_cli={}",
        log_level, log_level
    ))
    .unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(log_path) = &config.log_file {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(log_file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(log_file))
                    .try_init();
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
