use async_trait::async_trait;
use reqwest::Url;

use super::{ImageJob, ImageProvider, ProviderImage};
use crate::core::{ModelDescriptor, Provider, StudioError};

/// Largest reference data URL that still fits a GET request line
pub const MAX_REFERENCE_URL_BYTES: usize = 12 * 1024;

/// Pollinations public image endpoint. No credential; the image is a GET on
/// a URL built from the prompt, fetched during normalization.
pub struct PollinationsClient {
    base_url: String,
}

impl PollinationsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn image_url(&self, model: &ModelDescriptor, job: &ImageJob) -> Result<Url, StudioError> {
        let reference = job
            .reference_image
            .as_ref()
            .map(|image| image.to_data_url())
            .map(check_reference_size)
            .transpose()?;

        let mut url = Url::parse(&self.base_url).map_err(|e| {
            StudioError::ConfigError(format!("Invalid Pollinations base URL: {}", e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                StudioError::ConfigError("Pollinations base URL cannot have a path".to_string())
            })?
            .pop_if_empty()
            .push("prompt")
            .push(&job.prompt);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("model", model.upstream)
                .append_pair("width", &job.width.to_string())
                .append_pair("height", &job.height.to_string())
                .append_pair("seed", &job.seed.to_string())
                .append_pair("nologo", "true");
            if !job.negative_prompt.is_empty() {
                query.append_pair("negative", &job.negative_prompt);
            }
            if let Some(image) = &reference {
                query.append_pair("image", image);
            }
        }

        Ok(url)
    }
}

fn check_reference_size(data_url: String) -> Result<String, StudioError> {
    if data_url.len() > MAX_REFERENCE_URL_BYTES {
        return Err(StudioError::InvalidInput(format!(
            "Reference image is too large for Pollinations ({} KB encoded, limit {} KB). \
             Use a smaller image or configure OPENAI_API_KEY or GEMINI_API_KEY for edits",
            data_url.len() / 1024,
            MAX_REFERENCE_URL_BYTES / 1024
        )));
    }
    Ok(data_url)
}

#[async_trait]
impl ImageProvider for PollinationsClient {
    fn provider(&self) -> Provider {
        Provider::Pollinations
    }

    async fn generate(
        &self,
        model: &ModelDescriptor,
        job: &ImageJob,
    ) -> Result<ProviderImage, StudioError> {
        Ok(ProviderImage::Url(self.image_url(model, job)?.to_string()))
    }
}
