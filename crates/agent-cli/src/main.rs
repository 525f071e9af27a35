//! Registration agent binary
//!
//! Loads the agent configuration, registers this process with the discovery
//! registry and keeps it registered until Ctrl+C, then deregisters.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use registration_agent::{HttpRegistryClient, RegistrationController, TokioSpawner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "registration-agent")]
#[command(about = "Registers this process with a discovery registry and keeps it registered")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register and stay registered until interrupted
    Run {
        /// Path to the agent configuration file
        #[arg(short, long, value_name = "PATH")]
        config: PathBuf,
    },

    /// Validate a configuration file and print the resolved values
    Validate {
        /// Path to the agent configuration file
        #[arg(short, long, value_name = "PATH")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { config } => run(config).await,
        Commands::Validate { config } => validate(config),
    }
}

async fn run(path: PathBuf) -> Result<()> {
    let config = agent_config::parse_file(&path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    let client = HttpRegistryClient::from_config(&config)
        .context("Failed to create registry client")?;
    info!("Using discovery registry at {}", client.base_url());

    let controller = RegistrationController::new(config, Arc::new(client), Arc::new(TokioSpawner));
    controller.start().await;
    info!(
        "Advertising {} with callback {}",
        controller.config().app_name(),
        controller.config().callback_url()
    );

    info!("Registration agent running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Shutting down registration agent");
    controller.stop().await;
    Ok(())
}

fn validate(path: PathBuf) -> Result<()> {
    let config = agent_config::parse_file(&path)
        .with_context(|| format!("Invalid configuration in {:?}", path))?;

    let connect_url = config
        .connect_url()
        .context("Invalid management port override")?;
    let client = HttpRegistryClient::from_config(&config)
        .context("Failed to create registry client")?;

    info!("Configuration in {:?} is valid", path);
    info!("  application:    {} (http port {})", config.app_name(), config.http_port());
    info!("  registry:       {}", client.base_url());
    info!("  callback:       {}", config.callback_url());
    info!("  connect url:    {}", connect_url);
    info!("  realm prefix:   {}", config.realm_prefix());
    info!("  retry interval: {:?}", config.retry_interval());
    info!("  timeout:        {:?}", config.request_timeout());
    Ok(())
}
