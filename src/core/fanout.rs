//! Concurrent generation of N independent images, all or nothing.

use futures_util::future::try_join_all;
use rand::Rng;

use super::error::StudioError;
use super::image::InlineImage;
use super::models::ModelDescriptor;
use crate::api::{materialize, ImageJob, ImageProvider};

/// Shared settings for every job of one request
#[derive(Debug, Clone, PartialEq)]
pub struct JobTemplate {
    pub prompt: String,
    pub negative_prompt: String,
    pub reference_image: Option<InlineImage>,
    pub strength: f32,
    pub guidance_scale: f32,
    pub num_inference_steps: u32,
    pub width: u32,
    pub height: u32,
}

/// One job per image. A fixed seed gives `seed + i`, otherwise every job draws its own.
pub fn plan_jobs<R: Rng + ?Sized>(
    template: &JobTemplate,
    count: u8,
    seed: Option<u64>,
    rng: &mut R,
) -> Vec<ImageJob> {
    (0..count as u64)
        .map(|i| ImageJob {
            prompt: template.prompt.clone(),
            negative_prompt: template.negative_prompt.clone(),
            reference_image: template.reference_image.clone(),
            strength: template.strength,
            guidance_scale: template.guidance_scale,
            num_inference_steps: template.num_inference_steps,
            seed: match seed {
                Some(seed) => seed.wrapping_add(i),
                None => rng.gen::<u32>() as u64,
            },
            width: template.width,
            height: template.height,
        })
        .collect()
}

/// Run every job concurrently and normalize the answers.
///
/// The first failure drops the calls still in flight and is returned as is.
pub async fn generate_all(
    provider: &dyn ImageProvider,
    model: &ModelDescriptor,
    jobs: &[ImageJob],
) -> Result<Vec<InlineImage>, StudioError> {
    let calls = jobs.iter().enumerate().map(|(index, job)| async move {
        tracing::debug!(model = model.id, index, seed = job.seed, "Requesting image");
        let image = provider.generate(model, job).await?;
        materialize(provider, image).await
    });

    let images = try_join_all(calls).await?;

    if images.len() != jobs.len() {
        return Err(StudioError::GenerationFailed(format!(
            "Expected {} images, got {}",
            jobs.len(),
            images.len()
        )));
    }

    Ok(images)
}
