//! Request pipelines shared by the HTTP handlers and the CLI.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::chat::{extract_image_prompt, ChatMessage, COMPANION_PERSONA};
use super::error::StudioError;
use super::fanout::{generate_all, plan_jobs, JobTemplate};
use super::image::InlineImage;
use super::models::{self, ModelDescriptor};
use super::params::{GenerationRequest, MAX_IMAGES, MIN_IMAGES};
use super::prompt::{enhance_prompt, PromptMode};
use super::selection::{select_chat_model, select_image_model, Availability};
use crate::api::{Providers, TextStream};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    #[serde(rename = "txt2img")]
    TextToImage,
    #[serde(rename = "img2img")]
    ImageToImage,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::TextToImage => "txt2img",
            Mode::ImageToImage => "img2img",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub images: Vec<InlineImage>,
    /// Prompt actually sent upstream
    pub prompt: String,
    pub original_prompt: String,
    pub model: &'static ModelDescriptor,
    pub model_switched: bool,
    pub switch_reason: Option<String>,
    pub mode: Mode,
    pub count: u8,
    pub available_models: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub model: &'static ModelDescriptor,
}

#[derive(Debug, Clone, Default)]
pub struct CompanionRequest {
    pub message: String,
    pub history: Vec<ChatMessage>,
    /// Replaces the built-in persona when set
    pub persona: Option<String>,
    pub generate_image: bool,
}

#[derive(Debug, Clone)]
pub struct CompanionReply {
    /// Reply with the image marker line removed
    pub text: String,
    pub image: Option<InlineImage>,
    pub image_prompt: Option<String>,
    pub model: &'static ModelDescriptor,
}

/// Configuration plus provider clients; immutable once built
pub struct Studio {
    config: Config,
    providers: Providers,
}

impl Studio {
    pub fn new(config: Config, providers: Providers) -> Self {
        Self { config, providers }
    }

    pub fn from_config(config: Config) -> Self {
        let providers = Providers::from_config(&config);
        Self::new(config, providers)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn availability(&self) -> Availability {
        self.config.availability()
    }

    /// Image model ids usable with the configured credentials
    pub fn available_models(&self) -> Vec<&'static str> {
        let availability = self.availability();
        models::image_models()
            .filter(|m| availability.has(m.provider))
            .map(|m| m.id)
            .collect()
    }

    /// A request carrying the configured tuning defaults
    pub fn request(&self, prompt: impl Into<String>) -> GenerationRequest {
        let defaults = &self.config.defaults;
        GenerationRequest {
            strength: defaults.strength,
            guidance_scale: defaults.guidance_scale,
            num_inference_steps: defaults.num_inference_steps,
            ..GenerationRequest::new(prompt)
        }
    }

    pub async fn generate_images(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, StudioError> {
        let mut rng = StdRng::from_entropy();
        self.generate_images_with(request, &mut rng).await
    }

    pub async fn generate_images_with<R: Rng + Send + ?Sized>(
        &self,
        request: GenerationRequest,
        rng: &mut R,
    ) -> Result<GenerationResult, StudioError> {
        if request.prompt.trim().is_empty() {
            return Err(StudioError::InvalidInput("Prompt is required".to_string()));
        }

        let selection = select_image_model(
            request.model.as_deref(),
            &self.config.defaults.image_model,
            &self.availability(),
            request.is_edit(),
        )?;
        let provider = self.providers.image(selection.model.provider)?;

        let (mode, prompt_mode) = if request.is_edit() {
            (Mode::ImageToImage, PromptMode::Edit)
        } else {
            (Mode::TextToImage, PromptMode::Generate)
        };
        let prompt = enhance_prompt(&request.prompt, request.enhance, prompt_mode, rng);
        let count = request.count.clamp(MIN_IMAGES, MAX_IMAGES);

        let template = JobTemplate {
            prompt: prompt.clone(),
            negative_prompt: request
                .negative_prompt
                .clone()
                .unwrap_or_else(|| self.config.defaults.negative_prompt.clone()),
            reference_image: request.reference_image.clone(),
            strength: request.strength,
            guidance_scale: request.guidance_scale,
            num_inference_steps: request.num_inference_steps,
            width: self.config.defaults.width,
            height: self.config.defaults.height,
        };
        let jobs = plan_jobs(&template, count, request.seed, rng);

        tracing::info!(
            model = selection.model.id,
            count,
            mode = mode.as_str(),
            switched = selection.switched,
            "Generating images"
        );
        if let Some(reason) = &selection.reason {
            tracing::info!("Model switched: {}", reason);
        }

        let images = generate_all(provider.as_ref(), selection.model, &jobs).await?;

        Ok(GenerationResult {
            images,
            prompt,
            original_prompt: request.prompt,
            model: selection.model,
            model_switched: selection.switched,
            switch_reason: selection.reason,
            mode,
            count,
            available_models: self.available_models(),
        })
    }

    /// One-shot completion under the configured system prompt
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatReply, StudioError> {
        let model = self.chat_model(messages)?;
        let provider = self.providers.chat(model.provider)?;

        let text = provider
            .complete(model, &self.config.defaults.system_prompt, messages)
            .await?;
        Ok(ChatReply { text, model })
    }

    /// Streamed completion; the stream ends when the provider finishes
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<(&'static ModelDescriptor, TextStream), StudioError> {
        let model = self.chat_model(messages)?;
        let provider = self.providers.chat(model.provider)?;

        let stream = provider
            .stream(model, &self.config.defaults.system_prompt, messages)
            .await?;
        Ok((model, stream))
    }

    /// Persona reply plus at most one auxiliary image drawn from its `[IMAGE]:` line.
    ///
    /// Failing to produce the image never fails the reply.
    pub async fn companion(
        &self,
        request: CompanionRequest,
    ) -> Result<CompanionReply, StudioError> {
        if request.message.trim().is_empty() {
            return Err(StudioError::InvalidInput("Message is required".to_string()));
        }

        let mut messages = request.history;
        messages.push(ChatMessage::user(request.message));

        let model = self.chat_model(&messages)?;
        let provider = self.providers.chat(model.provider)?;
        let persona = request
            .persona
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(COMPANION_PERSONA);

        let reply = provider.complete(model, persona, &messages).await?;
        let (text, image_prompt) = extract_image_prompt(&reply);

        let image = match (&image_prompt, request.generate_image) {
            (Some(prompt), true) => self.companion_image(prompt).await,
            _ => None,
        };

        Ok(CompanionReply {
            text,
            image,
            image_prompt,
            model,
        })
    }

    async fn companion_image(&self, prompt: &str) -> Option<InlineImage> {
        let model = match models::lookup(&self.config.defaults.companion_image_model) {
            Some(model) if model.family.is_image() => model,
            _ => {
                tracing::warn!(
                    "Companion image model '{}' is not known",
                    self.config.defaults.companion_image_model
                );
                return None;
            }
        };
        if !self.availability().has(model.provider) {
            tracing::debug!("Skipping companion image: {} is not configured", model.provider);
            return None;
        }

        let result = async {
            let provider = self.providers.image(model.provider)?;
            let mut rng = StdRng::from_entropy();
            let template = JobTemplate {
                prompt: enhance_prompt(prompt, true, PromptMode::Generate, &mut rng),
                negative_prompt: self.config.defaults.negative_prompt.clone(),
                reference_image: None,
                strength: self.config.defaults.strength,
                guidance_scale: self.config.defaults.guidance_scale,
                num_inference_steps: self.config.defaults.num_inference_steps,
                width: self.config.defaults.width,
                height: self.config.defaults.height,
            };
            let jobs = plan_jobs(&template, 1, None, &mut rng);
            generate_all(provider.as_ref(), model, &jobs).await
        }
        .await;

        match result {
            Ok(images) => images.into_iter().next(),
            Err(e) => {
                tracing::warn!("Companion image generation failed: {}", e);
                None
            }
        }
    }

    fn chat_model(
        &self,
        messages: &[ChatMessage],
    ) -> Result<&'static ModelDescriptor, StudioError> {
        if messages.is_empty() {
            return Err(StudioError::InvalidInput("Messages are required".to_string()));
        }

        let selection = select_chat_model(
            None,
            &self.config.defaults.chat_model,
            &self.availability(),
        )?;
        if let Some(reason) = &selection.reason {
            tracing::info!("Chat model switched: {}", reason);
        }
        Ok(selection.model)
    }
}
