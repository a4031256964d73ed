//! jembed CLI entry point.

use clap::{Parser, Subcommand};
use jembed::config::EmbedConfig;
use tracing_subscriber::EnvFilter;

mod cli;

/// jembed - embed a Java virtual machine in this process
#[derive(Parser, Debug)]
#[command(name = "jembed")]
#[command(about = "Bring up, probe and configure an embedded Java VM")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a VM (or attach to a resident one) and report the status.
    Init(cli::init::InitCmd),

    /// Check that the VM library loads and supports the invocation API.
    Probe(cli::probe::ProbeCmd),

    /// Manage configuration.
    #[command(subcommand)]
    Config(cli::config::ConfigCmd),
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on RUST_LOG or default to warn
    init_logging(cli.log_json);

    tracing::debug!(version = jembed::VERSION, "starting jembed");

    // Load configuration
    let config = match EmbedConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            EmbedConfig::default().with_env(|name| std::env::var(name).ok())
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Init(cmd) => cmd.run(&config),
        Commands::Probe(cmd) => cmd.run(&config),
        Commands::Config(cmd) => cmd.run(&config),
    };

    // Handle errors
    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jembed=warn"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
