use async_trait::async_trait;
use serde::Serialize;

use super::{ensure_success, ImageJob, ImageProvider, ProviderImage};
use crate::core::{ModelDescriptor, Provider, StudioError};
use crate::http_client::HTTP_CLIENT;

/// HuggingFace Inference router client. Answers with raw image bytes.
pub struct HuggingFaceClient {
    token: String,
    base_url: String,
}

impl HuggingFaceClient {
    pub fn new(token: &str, base_url: &str) -> Self {
        Self {
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn model_url(&self, model: &ModelDescriptor) -> String {
        format!("{}/{}", self.base_url, model.upstream)
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: Parameters<'a>,
}

#[derive(Debug, Serialize)]
struct Parameters<'a> {
    guidance_scale: f32,
    num_inference_steps: u32,
    negative_prompt: &'a str,
    seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strength: Option<f32>,
}

fn build_request(job: &ImageJob) -> InferenceRequest<'_> {
    let reference = job.reference_image.as_ref();
    InferenceRequest {
        inputs: &job.prompt,
        parameters: Parameters {
            guidance_scale: job.guidance_scale,
            num_inference_steps: job.num_inference_steps,
            negative_prompt: &job.negative_prompt,
            seed: job.seed,
            image: reference.map(|image| image.data.as_str()),
            strength: reference.map(|_| job.strength),
        },
    }
}

#[async_trait]
impl ImageProvider for HuggingFaceClient {
    fn provider(&self) -> Provider {
        Provider::HuggingFace
    }

    async fn generate(
        &self,
        model: &ModelDescriptor,
        job: &ImageJob,
    ) -> Result<ProviderImage, StudioError> {
        let url = self.model_url(model);
        tracing::debug!("Sending inference request to: {}", url);

        let response = HTTP_CLIENT
            .post(&url)
            .bearer_auth(&self.token)
            .json(&build_request(job))
            .send()
            .await?;
        let response = ensure_success(Provider::HuggingFace, response).await?;

        Ok(ProviderImage::Bytes(response.bytes().await?.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{models, InlineImage};

    fn job() -> ImageJob {
        ImageJob {
            prompt: "a lighthouse".to_string(),
            negative_prompt: "blurry".to_string(),
            reference_image: None,
            strength: 0.6,
            guidance_scale: 7.5,
            num_inference_steps: 25,
            seed: 42,
            width: 1024,
            height: 1024,
        }
    }

    #[test]
    fn test_txt2img_body() {
        let job = job();
        let body = serde_json::to_value(build_request(&job)).unwrap();
        assert_eq!(body["inputs"], "a lighthouse");
        assert_eq!(body["parameters"]["seed"], 42);
        assert_eq!(body["parameters"]["negative_prompt"], "blurry");
        assert!(body["parameters"].get("image").is_none());
        assert!(body["parameters"].get("strength").is_none());
    }

    #[test]
    fn test_img2img_body_sends_bare_base64() {
        let mut job = job();
        job.reference_image = Some(InlineImage {
            mime_type: "image/png".to_string(),
            data: "AAAA".to_string(),
        });
        let body = serde_json::to_value(build_request(&job)).unwrap();
        assert_eq!(body["parameters"]["image"], "AAAA");
        assert!((body["parameters"]["strength"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_model_url() {
        let client = HuggingFaceClient::new("t", "https://router.example/hf-inference/models/");
        let model = models::lookup("flux-schnell").unwrap();
        assert_eq!(
            client.model_url(model),
            "https://router.example/hf-inference/models/black-forest-labs/FLUX.1-schnell"
        );
    }
}
