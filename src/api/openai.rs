//! OpenAI images and chat completions.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::sse::data_events;
use super::{ensure_success, ChatProvider, ImageJob, ImageProvider, ProviderImage, TextStream};
use crate::core::{
    ChatMessage, ChatPart, MessageContent, ModelDescriptor, Provider, Role, StudioError,
};
use crate::http_client::HTTP_CLIENT;

const IMAGE_SIZE: &str = "1024x1024";

pub struct OpenAiClient {
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn generation(
        &self,
        model: &ModelDescriptor,
        job: &ImageJob,
    ) -> Result<ImagesResponse, StudioError> {
        let request = ImageRequest {
            model: model.upstream,
            prompt: &job.prompt,
            n: 1,
            size: IMAGE_SIZE,
            // gpt-image models always answer with base64 and reject this field
            response_format: (!model.upstream.starts_with("gpt-image")).then_some("url"),
        };

        let response = HTTP_CLIENT
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(Provider::OpenAi, response).await?;
        Ok(response.json().await?)
    }

    async fn edit(
        &self,
        model: &ModelDescriptor,
        job: &ImageJob,
    ) -> Result<ImagesResponse, StudioError> {
        let Some(reference) = &job.reference_image else {
            return Err(StudioError::InvalidInput("Edit requires a reference image".to_string()));
        };

        let image = Part::bytes(reference.decode()?)
            .file_name(format!("reference.{}", reference.extension()))
            .mime_str(&reference.mime_type)?;
        let form = Form::new()
            .text("model", model.upstream.to_string())
            .text("prompt", job.prompt.clone())
            .text("n", "1")
            .text("size", IMAGE_SIZE)
            .part("image", image);

        let response = HTTP_CLIENT
            .post(format!("{}/images/edits", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(Provider::OpenAi, response).await?;
        Ok(response.json().await?)
    }

    fn chat_request<'a>(
        &self,
        model: &'a ModelDescriptor,
        system: &'a str,
        messages: &'a [ChatMessage],
        stream: bool,
    ) -> ChatRequest<'a> {
        let mut wire = vec![WireMessage {
            role: "system",
            content: WireContent::Text(system),
        }];
        wire.extend(messages.iter().map(|message| WireMessage {
            role: match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            },
            content: match &message.content {
                MessageContent::Text(text) => WireContent::Text(text),
                MessageContent::Parts(parts) => WireContent::Parts(
                    parts
                        .iter()
                        .map(|part| match part {
                            ChatPart::Text { text } => WirePart::Text { text },
                            ChatPart::Image { image } => WirePart::ImageUrl {
                                image_url: ImageUrl { url: image },
                            },
                        })
                        .collect(),
                ),
            },
        }));

        ChatRequest {
            model: model.upstream,
            messages: wire,
            stream,
        }
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

impl ImagesResponse {
    fn into_image(self) -> Result<ProviderImage, StudioError> {
        let datum = self
            .data
            .into_iter()
            .next()
            .ok_or_else(|| StudioError::InvalidResponse("OpenAI returned no images".to_string()))?;

        match (datum.b64_json, datum.url) {
            (Some(data), _) => Ok(ProviderImage::Base64(data)),
            (None, Some(url)) => Ok(ProviderImage::Url(url)),
            (None, None) => Err(StudioError::InvalidResponse(
                "OpenAI image entry has neither b64_json nor url".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// Text carried by one streamed chunk, empty for role/usage-only chunks
fn chunk_text(data: &str) -> Result<String, StudioError> {
    let chunk: ChatChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect())
}

#[async_trait]
impl ImageProvider for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(
        &self,
        model: &ModelDescriptor,
        job: &ImageJob,
    ) -> Result<ProviderImage, StudioError> {
        let response = if job.reference_image.is_some() {
            self.edit(model, job).await?
        } else {
            self.generation(model, job).await?
        };
        response.into_image()
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn complete(
        &self,
        model: &ModelDescriptor,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, StudioError> {
        let request = self.chat_request(model, system, messages, false);

        let response = HTTP_CLIENT
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(Provider::OpenAi, response).await?;
        let response: ChatResponse = response.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                StudioError::InvalidResponse("OpenAI returned no completion".to_string())
            })
    }

    async fn stream(
        &self,
        model: &ModelDescriptor,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<TextStream, StudioError> {
        let request = self.chat_request(model, system, messages, true);

        let response = HTTP_CLIENT
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(Provider::OpenAi, response).await?;

        let stream = data_events(response.bytes_stream()).filter_map(|event| async move {
            let text = event.and_then(|data| match data.as_str() {
                "[DONE]" => Ok(String::new()),
                data => chunk_text(data),
            });
            match text {
                Ok(text) if text.is_empty() => None,
                other => Some(other),
            }
        });

        Ok(Box::pin(stream))
    }
}
