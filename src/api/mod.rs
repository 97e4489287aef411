mod gemini;
mod huggingface;
mod openai;
mod pollinations;
mod sse;
mod types;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use futures_util::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

pub use gemini::GeminiClient;
pub use huggingface::HuggingFaceClient;
pub use openai::OpenAiClient;
pub use pollinations::PollinationsClient;

use crate::config::Config;
use crate::core::{ChatMessage, InlineImage, ModelDescriptor, Provider, StudioError};
use crate::http_client::HTTP_CLIENT;

/// Text segments of a streamed completion
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, StudioError>> + Send>>;

/// Everything one provider call needs to produce one image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageJob {
    pub prompt: String,
    pub negative_prompt: String,
    pub reference_image: Option<InlineImage>,
    pub strength: f32,
    pub guidance_scale: f32,
    pub num_inference_steps: u32,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
}

/// What a provider handed back before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderImage {
    Bytes(Vec<u8>),
    Base64(String),
    Url(String),
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate(
        &self,
        model: &ModelDescriptor,
        job: &ImageJob,
    ) -> Result<ProviderImage, StudioError>;

    /// Download an image the provider only returned a link to
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StudioError> {
        fetch_bytes(self.provider(), url).await
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        model: &ModelDescriptor,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, StudioError>;

    async fn stream(
        &self,
        model: &ModelDescriptor,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<TextStream, StudioError>;
}

/// Normalize a provider answer to an inline image, fetching once if it is a URL
pub async fn materialize(
    provider: &dyn ImageProvider,
    image: ProviderImage,
) -> Result<InlineImage, StudioError> {
    match image {
        ProviderImage::Bytes(bytes) => InlineImage::from_bytes(&bytes),
        ProviderImage::Base64(data) => InlineImage::from_base64(&data),
        ProviderImage::Url(url) => {
            tracing::debug!("Fetching generated image from {}", redact_url(&url));
            let bytes = provider.fetch(&url).await?;
            InlineImage::from_bytes(&bytes)
        }
    }
}

/// Provider clients keyed by provider
#[derive(Clone, Default)]
pub struct Providers {
    image: HashMap<Provider, Arc<dyn ImageProvider>>,
    chat: HashMap<Provider, Arc<dyn ChatProvider>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client for every provider that has a credential
    pub fn from_config(config: &Config) -> Self {
        let mut providers = Self::new();
        let credentials = &config.credentials;

        if let Some(key) = non_blank(&credentials.openai_api_key) {
            let client = Arc::new(OpenAiClient::new(key, &config.api.openai_base_url));
            providers.image.insert(Provider::OpenAi, client.clone());
            providers.chat.insert(Provider::OpenAi, client);
        }
        if let Some(key) = non_blank(&credentials.gemini_api_key) {
            let client = Arc::new(GeminiClient::new(key, &config.api.gemini_base_url));
            providers.image.insert(Provider::Gemini, client.clone());
            providers.chat.insert(Provider::Gemini, client);
        }
        if let Some(token) = non_blank(&credentials.huggingface_token) {
            providers.image.insert(
                Provider::HuggingFace,
                Arc::new(HuggingFaceClient::new(token, &config.api.huggingface_base_url)),
            );
        }
        if credentials.pollinations_enabled {
            providers.image.insert(
                Provider::Pollinations,
                Arc::new(PollinationsClient::new(&config.api.pollinations_base_url)),
            );
        }

        providers
    }

    #[cfg(test)]
    pub fn with_image(mut self, provider: Provider, client: Arc<dyn ImageProvider>) -> Self {
        self.image.insert(provider, client);
        self
    }

    #[cfg(test)]
    pub fn with_chat(mut self, provider: Provider, client: Arc<dyn ChatProvider>) -> Self {
        self.chat.insert(provider, client);
        self
    }

    pub fn image(&self, provider: Provider) -> Result<Arc<dyn ImageProvider>, StudioError> {
        self.image
            .get(&provider)
            .cloned()
            .ok_or_else(|| StudioError::missing_credential(provider))
    }

    pub fn chat(&self, provider: Provider) -> Result<Arc<dyn ChatProvider>, StudioError> {
        self.chat
            .get(&provider)
            .cloned()
            .ok_or_else(|| StudioError::missing_credential(provider))
    }
}

/// Turn a non-success response into an upstream error carrying status and body
pub(crate) async fn ensure_success(
    provider: Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response, StudioError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!("{} error response ({}): {}", provider, status, body);

    Err(StudioError::Upstream {
        provider,
        status: status.as_u16(),
        message: truncate(&body, 500),
    })
}

/// GET an image. Transport errors drop the URL, which can carry the prompt or a reference image.
pub(crate) async fn fetch_bytes(provider: Provider, url: &str) -> Result<Vec<u8>, StudioError> {
    let response = HTTP_CLIENT
        .get(url)
        .send()
        .await
        .map_err(|e| StudioError::from(e.without_url()))?;
    let response = ensure_success(provider, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| StudioError::from(e.without_url()))?;
    Ok(bytes.to_vec())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Drop the query string, which may carry a prompt or key
fn redact_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
