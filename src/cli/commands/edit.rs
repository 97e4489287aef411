use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::generate::{execute, ImageOptions};
use crate::config::Config;
use crate::core::{InlineImage, Studio};

#[derive(Args)]
pub struct EditArgs {
    /// Path to the image to edit
    #[arg(required = true)]
    pub image: PathBuf,

    /// The edit instruction (e.g., "make the sky blue", "add a hat")
    #[arg(required = true)]
    pub prompt: String,

    /// How far the result may depart from the source (0-1)
    #[arg(short, long)]
    pub strength: Option<f32>,

    #[command(flatten)]
    pub options: ImageOptions,
}

pub async fn run(args: EditArgs, config: &Config) -> Result<()> {
    // Load the source image
    let image_path = args.image.canonicalize()
        .context("Image file not found")?;

    let bytes = tokio::fs::read(&image_path).await
        .context("Failed to load image file")?;
    let reference = InlineImage::from_bytes(&bytes)
        .with_context(|| {
            format!("{} is not a PNG, JPEG, WebP or GIF image", image_path.display())
        })?;

    let studio = Studio::from_config(config.clone());
    let mut request = args
        .options
        .apply(studio.request(&args.prompt))
        .with_reference_image(reference);
    if let Some(strength) = args.strength {
        request.strength = strength.clamp(0.0, 1.0);
    }

    execute(&studio, request, &args.options, config).await
}
