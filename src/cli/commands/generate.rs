use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::{display_image_terminal, save_images, spinner};
use crate::config::{Config, DisplayMode};
use crate::core::{GenerationRequest, GenerationResult, Mode, Studio};

#[derive(Args)]
pub struct GenerateArgs {
    /// The prompt describing the image to generate
    #[arg(required = true)]
    pub prompt: String,

    #[command(flatten)]
    pub options: ImageOptions,
}

/// Options shared by generate and edit
#[derive(Args)]
pub struct ImageOptions {
    /// Number of images to generate (1-4)
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub count: u8,

    /// Model to use (see `studio models`)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Send the prompt exactly as written
    #[arg(long)]
    pub no_enhance: bool,

    /// What the image should avoid
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Seed for reproducible results; image i uses seed + i
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output directory for downloaded images
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Don't download images automatically
    #[arg(long)]
    pub no_download: bool,

    /// Output format (text, json, quiet)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

impl ImageOptions {
    pub fn apply(&self, mut request: GenerationRequest) -> GenerationRequest {
        request = request.with_count(self.count).with_enhance(!self.no_enhance);
        if let Some(model) = &self.model {
            request = request.with_model(model);
        }
        if let Some(negative) = &self.negative_prompt {
            request = request.with_negative_prompt(negative);
        }
        if let Some(seed) = self.seed {
            request = request.with_seed(seed);
        }
        request
    }
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    model: &'static str,
    model_switched: bool,
    switch_reason: Option<&'a str>,
    mode: Mode,
    prompt: &'a str,
    original_prompt: &'a str,
    count: u8,
    files: Vec<String>,
    /// Data URLs, only when nothing was written to disk
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

pub async fn run(args: GenerateArgs, config: &Config) -> Result<()> {
    let studio = Studio::from_config(config.clone());
    let request = args.options.apply(studio.request(&args.prompt));
    execute(&studio, request, &args.options, config).await
}

/// Run a request and report it in the chosen format
pub(crate) async fn execute(
    studio: &Studio,
    request: GenerationRequest,
    options: &ImageOptions,
    config: &Config,
) -> Result<()> {
    let verb = if request.is_edit() { "Editing" } else { "Generating" };
    let pb = spinner(
        &options.format,
        format!("{} {} image(s): {}...", verb, request.count, preview(&request.prompt, 40)),
    )?;

    let result = match studio.generate_images(request).await {
        Ok(result) => result,
        Err(e) => {
            if let Some(pb) = pb {
                pb.finish_with_message(format!("{} Generation failed", "✗".red()));
            }
            if options.format != "quiet" {
                eprintln!("{}: {}", "Error".red().bold(), e);
                if let crate::core::StudioError::MissingCredential { hint, .. } = &e {
                    eprintln!("{}", hint.dimmed());
                }
            }
            return Err(e.into());
        }
    };

    let download = !options.no_download && config.output.auto_download;
    let paths = if download {
        let output_dir = options
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.output.directory));
        save_images(&result.images, &output_dir).await?
    } else {
        Vec::new()
    };

    if let Some(pb) = &pb {
        let suffix = if download { "" } else { " (not downloaded)" };
        pb.finish_with_message(format!(
            "{} Generated {} image(s){}",
            "✓".green(),
            result.images.len(),
            suffix
        ));
    }

    match options.format.as_str() {
        "json" => {
            let output = json_output(&result, &paths, download);
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "quiet" => {
            for path in &paths {
                println!("{}", path.display());
            }
        }
        _ => {
            println!();
            println!("{}: {}", "Model".cyan().bold(), result.model.id);
            if let Some(reason) = &result.switch_reason {
                println!("{}: {}", "Switched".yellow().bold(), reason);
            }
            println!("{}: {}", "Mode".cyan().bold(), result.mode.as_str());
            println!("{}: {}", "Prompt".cyan().bold(), result.prompt);

            if !paths.is_empty() {
                println!();
                println!("{}:", "Generated Images".cyan().bold());
                for path in &paths {
                    println!("  {}", path.display());
                }

                if config.output.display == DisplayMode::Terminal {
                    if let Some(first_path) = paths.first() {
                        println!();
                        display_image_terminal(first_path);
                    }
                }
            }
        }
    }

    Ok(())
}

fn json_output<'a>(
    result: &'a GenerationResult,
    paths: &[PathBuf],
    downloaded: bool,
) -> GenerateOutput<'a> {
    GenerateOutput {
        model: result.model.id,
        model_switched: result.model_switched,
        switch_reason: result.switch_reason.as_deref(),
        mode: result.mode,
        prompt: &result.prompt,
        original_prompt: &result.original_prompt,
        count: result.count,
        files: paths.iter().map(|p| p.display().to_string()).collect(),
        images: if downloaded {
            Vec::new()
        } else {
            result.images.iter().map(|i| i.to_data_url()).collect()
        },
    }
}

/// Truncated prompt for spinners
fn preview(prompt: &str, max_len: usize) -> String {
    if prompt.chars().count() <= max_len {
        prompt.to_string()
    } else {
        format!("{}...", prompt.chars().take(max_len).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        options: ImageOptions,
    }

    #[test]
    fn test_options_apply_to_request() {
        let cli = TestCli::parse_from([
            "test", "-n", "3", "--model", "sdxl", "--no-enhance", "--seed", "11",
        ]);
        let request = cli.options.apply(GenerationRequest::new("a tree"));

        assert_eq!(request.count, 3);
        assert_eq!(request.model.as_deref(), Some("sdxl"));
        assert!(!request.enhance);
        assert_eq!(request.seed, Some(11));
        assert_eq!(cli.options.format, "text");
    }

    #[test]
    fn test_count_out_of_range_is_rejected() {
        assert!(TestCli::try_parse_from(["test", "-n", "5"]).is_err());
        assert!(TestCli::try_parse_from(["test", "-n", "0"]).is_err());
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 40), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
