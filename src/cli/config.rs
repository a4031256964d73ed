//! Configuration CLI commands.

use clap::{Args, Subcommand};
use jembed::config::EmbedConfig;
use jembed::Result;

/// Configuration commands
#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    /// Show the effective configuration
    Show(ShowCmd),

    /// Show the path to the configuration file
    Path,

    /// Write the default configuration file if none exists
    Init,
}

impl ConfigCmd {
    pub fn run(self, config: &EmbedConfig) -> Result<()> {
        match self {
            ConfigCmd::Show(cmd) => cmd.run(config),
            ConfigCmd::Path => {
                let path = config_path()?;
                println!("{}", path.display());
                Ok(())
            }
            ConfigCmd::Init => {
                let path = config_path()?;
                if path.exists() {
                    println!("Config file already exists: {}", path.display());
                    return Ok(());
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, EmbedConfig::default().to_toml()?)?;
                println!("Created config file: {}", path.display());
                Ok(())
            }
        }
    }
}

fn config_path() -> Result<std::path::PathBuf> {
    EmbedConfig::default_path()
        .ok_or_else(|| jembed::Error::configuration("no config directory on this system"))
}

/// Show the effective configuration
#[derive(Args, Debug)]
pub struct ShowCmd {
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ShowCmd {
    pub fn run(self, config: &EmbedConfig) -> Result<()> {
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(config).map_err(std::io::Error::from)?
            );
            return Ok(());
        }

        if let Some(path) = EmbedConfig::default_path() {
            println!("# Config file: {}", path.display());
            if !path.exists() {
                println!("# (not present, using defaults and environment)");
            }
        }
        print!("{}", config.to_toml()?);
        Ok(())
    }
}
