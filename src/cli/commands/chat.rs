use anyhow::Result;
use clap::Args;
use colored::Colorize;
use futures_util::StreamExt;
use std::io::Write;
use std::path::PathBuf;

use super::{display_image_terminal, save_images, spinner};
use crate::config::{Config, DisplayMode};
use crate::core::{ChatMessage, CompanionRequest, Studio};

#[derive(Args)]
pub struct ChatArgs {
    /// Message to send
    #[arg(required = true)]
    pub message: String,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// Reply in the companion persona, with an illustrating image
    #[arg(long)]
    pub companion: bool,

    /// Custom persona for --companion
    #[arg(long, requires = "companion")]
    pub persona: Option<String>,

    /// Skip the companion image
    #[arg(long, requires = "companion")]
    pub no_image: bool,

    /// Output directory for the companion image
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: ChatArgs, config: &Config) -> Result<()> {
    let studio = Studio::from_config(config.clone());

    if args.companion {
        return companion(&studio, args, config).await;
    }

    let messages = [ChatMessage::user(&args.message)];

    if args.no_stream {
        let pb = spinner("text", "Thinking...".to_string())?;
        let reply = studio.chat(&messages).await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        println!("{}", reply?.text);
        return Ok(());
    }

    let (model, mut stream) = studio.chat_stream(&messages).await?;
    tracing::debug!(model = model.id, "Streaming reply");

    let mut stdout = std::io::stdout();
    while let Some(segment) = stream.next().await {
        match segment {
            Ok(text) => {
                write!(stdout, "{}", text)?;
                stdout.flush()?;
            }
            Err(e) => {
                println!();
                eprintln!("{}: {}", "Error".red().bold(), e);
                return Err(e.into());
            }
        }
    }
    println!();

    Ok(())
}

async fn companion(studio: &Studio, args: ChatArgs, config: &Config) -> Result<()> {
    let pb = spinner("text", "Thinking...".to_string())?;
    let reply = studio
        .companion(CompanionRequest {
            message: args.message,
            history: Vec::new(),
            persona: args.persona,
            generate_image: !args.no_image,
        })
        .await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let reply = reply?;

    println!("{}", reply.text);

    if let Some(prompt) = &reply.image_prompt {
        println!();
        println!("{}: {}", "Image prompt".cyan().bold(), prompt.dimmed());
    }

    if let Some(image) = &reply.image {
        let output_dir = args
            .output
            .unwrap_or_else(|| PathBuf::from(&config.output.directory));
        let paths = save_images(std::slice::from_ref(image), &output_dir).await?;
        for path in &paths {
            println!("{}: {}", "Image".cyan().bold(), path.display());
        }
        if config.output.display == DisplayMode::Terminal {
            if let Some(path) = paths.first() {
                println!();
                display_image_terminal(path);
            }
        }
    }

    Ok(())
}
