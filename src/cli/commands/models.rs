use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::config::Config;
use crate::core::models::{ModelDescriptor, MODELS};
use crate::core::{Provider, StudioError};

#[derive(Args)]
pub struct ModelsArgs {
    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

#[derive(Serialize)]
struct ModelRow {
    #[serde(flatten)]
    model: &'static ModelDescriptor,
    available: bool,
}

pub fn run(args: ModelsArgs, config: &Config) -> Result<()> {
    let availability = config.availability();

    if args.format == "json" {
        let rows: Vec<ModelRow> = MODELS
            .iter()
            .map(|model| ModelRow {
                model,
                available: availability.has(model.provider),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{}", "Models".cyan().bold());
    println!("{}", "=".repeat(50));

    for model in MODELS {
        let status = if availability.has(model.provider) {
            "✓".green()
        } else {
            "✗".red()
        };
        let mut tags = Vec::new();
        if model.recommended {
            tags.push("recommended");
        }
        if model.supports_edit {
            tags.push("edit");
        }
        if model.id == config.defaults.image_model || model.id == config.defaults.chat_model {
            tags.push("default");
        }

        println!(
            "{} {} {:<13} {}",
            status,
            format!("{:<24}", model.id).bold(),
            model.provider.to_string(),
            model.description.dimmed()
        );
        if !tags.is_empty() {
            println!("    {}", tags.join(", ").yellow());
        }
    }

    println!();
    for provider in Provider::ALL {
        if !availability.has(provider) {
            let hint = match StudioError::missing_credential(provider) {
                StudioError::MissingCredential { hint, .. } => hint,
                other => other.to_string(),
            };
            println!("{} {}: {}", "!".yellow(), provider, hint.dimmed());
        }
    }

    Ok(())
}
