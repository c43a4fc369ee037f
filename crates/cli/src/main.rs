//! Colloquy CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Initialize config & workspace
//! - `chat`     — Interactive chat or single-message mode
//! - `commands` — List the commands the model can call
//! - `backends` — List chat backends
//! - `config`   — Show, locate, or validate configuration
//! - `status`   — Show system status
//! - `doctor`   — Diagnose system health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "colloquy",
    about = "Colloquy — a multi-provider LLM assistant with command dispatch",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and workspace
    Onboard,

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Use a specific backend for this run
        #[arg(short, long)]
        backend: Option<String>,

        /// Use a specific model for this run
        #[arg(long)]
        model: Option<String>,

        /// Run side-effecting commands without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List the commands the model can call
    Commands,

    /// List chat backends
    Backends,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show system status
    Status,

    /// Diagnose system health
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration (secrets redacted)
    Show,

    /// Print the config file path
    Path,

    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat {
            message,
            backend,
            model,
            yes,
        } => commands::chat::run(message, backend, model, yes).await?,
        Commands::Commands => commands::commands_cmd::run().await?,
        Commands::Backends => commands::backends::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
