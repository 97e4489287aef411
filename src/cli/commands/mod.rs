pub mod chat;
pub mod config;
pub mod edit;
pub mod generate;
pub mod models;
pub mod serve;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::InlineImage;

/// Spinner for text output; None for machine-readable formats
pub(crate) fn spinner(format: &str, message: String) -> Result<Option<ProgressBar>> {
    if format != "text" {
        return Ok(None);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.yellow} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(Some(pb))
}

/// Write images as `st_<id>_<n>.<ext>` and return their paths
pub(crate) async fn save_images(images: &[InlineImage], output_dir: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .context("Failed to create output directory")?;

    let batch = uuid::Uuid::new_v4().simple().to_string();
    let mut paths = Vec::with_capacity(images.len());

    for (i, image) in images.iter().enumerate() {
        let path = output_dir.join(format!("st_{}_{}.{}", &batch[..8], i, image.extension()));
        tokio::fs::write(&path, image.decode()?)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        paths.push(path);
    }

    Ok(paths)
}

/// Display an image in the terminal using viuer
pub(crate) fn display_image_terminal(path: &Path) {
    let conf = viuer::Config {
        width: Some(80),
        height: Some(30),
        absolute_offset: false,
        ..Default::default()
    };

    if let Err(e) = viuer::print_from_file(path, &conf) {
        tracing::debug!("Failed to display image in terminal: {}", e);
    }
}
