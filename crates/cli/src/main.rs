//! runwire CLI — the main entry point.
//!
//! Commands:
//! - `validate` — Check event names and namespaces against the name grammar
//! - `demo`     — Run a scripted agent run with a nested tool run and show
//!                which observers fired
//! - `status`   — Show effective configuration
//! - `config`   — Configuration management

use clap::{Parser, Subcommand};
use runwire_config::{AppConfig, LogFormat};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "runwire",
    about = "runwire — event emission and matching for agent runtimes",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.runwire/config.toml
    #[arg(short, long, global = true, env = "RUNWIRE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check event names (and optionally a dotted namespace)
    Validate {
        /// Event names to check
        names: Vec<String>,

        /// Dotted namespace to check, e.g. `agent.react`
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Simulate an agent run with a nested tool run
    Demo,

    /// Show effective configuration
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Print the default configuration
    Default,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_with_overrides(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { config.logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    match cli.command {
        Commands::Validate { names, namespace } => {
            commands::validate::run(&names, namespace.as_deref()).await?
        }
        Commands::Demo => commands::demo::run(&config).await?,
        Commands::Status => commands::status::run(&config, cli.config.as_deref()).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config).await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Default => commands::config_cmd::default().await?,
        },
    }

    Ok(())
}
