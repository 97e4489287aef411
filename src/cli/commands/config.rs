use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show all configuration values
    Show,

    /// Get a specific configuration value
    Get {
        /// Config key (e.g., defaults.image_model, server.bind)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Config key (e.g., defaults.image_model, credentials.huggingface_token)
        key: String,
        /// Value to set
        value: String,
    },

    /// Show the config file path
    Path,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Runs against the file contents only; environment credentials never reach `save`
pub fn run(args: ConfigArgs, config: &mut Config) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => show(config),
        ConfigCommand::Get { key } => println!("{}", lookup(config, &key)?),
        ConfigCommand::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} Set {} = {}", "✓".green(), key.cyan(), lookup(config, &key)?);
        }
        ConfigCommand::Path => println!("{}", config.config_path.display()),
        ConfigCommand::Reset { force: false } => {
            eprintln!(
                "{}: This will reset all configuration to defaults. Use --force to confirm.",
                "Warning".yellow().bold()
            );
        }
        ConfigCommand::Reset { force: true } => {
            config.reset();
            config.save()?;
            *config = Config::load_file()?;
            println!(
                "{} Configuration reset to defaults ({})",
                "✓".green(),
                config.config_path.display()
            );
        }
    }
    Ok(())
}

fn show(config: &Config) {
    println!("{}", "Configuration".cyan().bold());
    println!("{}", "=".repeat(50));

    for (section, fields) in config.sections() {
        println!();
        println!("[{}]", section.yellow());
        for (field, value) in fields {
            let value = value.unwrap_or_else(|| "(not set)".dimmed().to_string());
            println!("  {} = {}", field.bold(), value);
        }
    }

    println!();
    println!("{}", format!("Config file: {}", config.config_path.display()).dimmed());
}

/// Display value of a key; secrets come back masked
fn lookup(config: &Config, key: &str) -> Result<String> {
    if !Config::keys().contains(&key) {
        bail!(
            "Unknown config key '{}'. Available keys:\n  {}",
            key,
            Config::keys().join("\n  ")
        );
    }
    Ok(config.get(key).unwrap_or_else(|| "(not set)".to_string()))
}
