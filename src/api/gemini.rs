use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use super::sse::data_events;
use super::types::*;
use super::{ensure_success, ChatProvider, ImageJob, ImageProvider, ProviderImage, TextStream};
use crate::core::{
    ChatMessage, ChatPart, InlineImage, MessageContent, ModelDescriptor, Provider, Role,
    StudioError,
};
use crate::http_client::HTTP_CLIENT;

/// Gemini API client
pub struct GeminiClient {
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, StudioError> {
        tracing::debug!("Sending generateContent request for {}", model);

        let response = HTTP_CLIENT
            .post(self.url(model, "generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(upstream_error(status.as_u16(), &body));
        }

        let response: GenerateResponse = serde_json::from_str(&body)?;
        Ok(response)
    }

    /// Build the API request body for an image job
    fn build_image_request(&self, job: &ImageJob) -> GenerateRequest {
        let mut parts = vec![ContentPart::Text {
            text: job.prompt.clone(),
        }];

        // Reference image goes first for editing
        if let Some(image) = &job.reference_image {
            parts.insert(0, inline_part(image));
        }

        GenerateRequest {
            contents: vec![Content {
                parts,
                role: Some("user".to_string()),
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                seed: Some((job.seed % i32::MAX as u64) as i32),
            }),
        }
    }

    fn build_chat_request(&self, system: &str, messages: &[ChatMessage]) -> GenerateRequest {
        // Gemini has no system role inside contents; fold those into the instruction
        let mut instruction = vec![system.to_string()];
        let mut contents = Vec::new();

        for message in messages {
            let role = match message.role {
                Role::System => {
                    instruction.push(message.content.text());
                    continue;
                }
                Role::User => "user",
                Role::Assistant => "model",
            };
            contents.push(Content {
                parts: content_parts(&message.content),
                role: Some(role.to_string()),
            });
        }

        GenerateRequest {
            contents,
            system_instruction: Some(Content {
                parts: vec![ContentPart::Text {
                    text: instruction.join("\n\n"),
                }],
                role: None,
            }),
            generation_config: None,
        }
    }
}

/// Surface a blocked prompt or a refused candidate as an error
fn check_refusal(response: &GenerateResponse, refused: &str) -> Result<(), StudioError> {
    if let Some(reason) = response.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_ref()) {
        tracing::warn!("Prompt blocked: {}", reason);
        return Err(StudioError::GenerationFailed(format!("Prompt blocked: {}", reason)));
    }

    for candidate in response.candidates.iter().flatten() {
        if let Some(reason) = &candidate.finish_reason {
            if reason != "STOP" && reason != "MAX_TOKENS" {
                let message = candidate.finish_message.as_deref().unwrap_or(refused);
                tracing::warn!("Generation refused: {} - {}", reason, message);
                return Err(StudioError::GenerationFailed(message.to_string()));
            }
        }
    }

    Ok(())
}

/// Pull the first image out of a response, surfacing refusals as errors
pub(crate) fn extract_image(response: GenerateResponse) -> Result<ProviderImage, StudioError> {
    check_refusal(&response, "Image generation was refused by the API")?;

    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            for part in content.parts {
                match part {
                    ContentPart::InlineData { inline_data } => {
                        return Ok(ProviderImage::Base64(inline_data.data));
                    }
                    ContentPart::Text { text } => {
                        tracing::debug!("Response text: {}", text);
                    }
                }
            }
        }
    }

    Err(StudioError::GenerationFailed("No images in response".to_string()))
}

/// Text of a complete chat reply; an empty reply is an error
fn extract_text(response: &GenerateResponse) -> Result<String, StudioError> {
    check_refusal(response, "Reply was refused by the API")?;

    let text = response.text();
    if text.is_empty() {
        return Err(StudioError::InvalidResponse(
            "Gemini returned no completion".to_string(),
        ));
    }
    Ok(text)
}

/// Text of each streamed chunk; a blocked or refused chunk ends in an error
fn chat_segments<S>(events: S) -> impl Stream<Item = Result<String, StudioError>> + Send
where
    S: Stream<Item = Result<String, StudioError>> + Send,
{
    events.filter_map(|event| async move {
        let text = event.and_then(|data| {
            let chunk: GenerateResponse = serde_json::from_str(&data)?;
            check_refusal(&chunk, "Reply was refused by the API")?;
            Ok(chunk.text())
        });
        match text {
            Ok(text) if text.is_empty() => None,
            other => Some(other),
        }
    })
}

fn upstream_error(status: u16, body: &str) -> StudioError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => format!(
            "{} ({}): {}",
            parsed.error.status, parsed.error.code, parsed.error.message
        ),
        Err(_) => body.to_string(),
    };
    StudioError::Upstream {
        provider: Provider::Gemini,
        status,
        message,
    }
}

fn inline_part(image: &InlineImage) -> ContentPart {
    ContentPart::InlineData {
        inline_data: InlineData {
            mime_type: image.mime_type.clone(),
            data: image.data.clone(),
        },
    }
}

fn content_parts(content: &MessageContent) -> Vec<ContentPart> {
    match content {
        MessageContent::Text(text) => vec![ContentPart::Text { text: text.clone() }],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ChatPart::Text { text } => Some(ContentPart::Text { text: text.clone() }),
                ChatPart::Image { image } => match InlineImage::from_data_url(image) {
                    Ok(image) => Some(inline_part(&image)),
                    Err(_) => {
                        // Gemini only takes inline bytes here
                        tracing::warn!("Skipping image part that is not an inline data URL");
                        None
                    }
                },
            })
            .collect(),
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(
        &self,
        model: &ModelDescriptor,
        job: &ImageJob,
    ) -> Result<ProviderImage, StudioError> {
        let request = self.build_image_request(job);
        let response = self.generate_content(model.upstream, &request).await?;
        extract_image(response)
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn complete(
        &self,
        model: &ModelDescriptor,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, StudioError> {
        let request = self.build_chat_request(system, messages);
        let response = self.generate_content(model.upstream, &request).await?;
        extract_text(&response)
    }

    async fn stream(
        &self,
        model: &ModelDescriptor,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<TextStream, StudioError> {
        let request = self.build_chat_request(system, messages);
        let url = format!("{}?alt=sse", self.url(model.upstream, "streamGenerateContent"));

        let response = HTTP_CLIENT
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(Provider::Gemini, response).await?;

        Ok(Box::pin(chat_segments(data_events(response.bytes_stream()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(prompt: &str) -> ImageJob {
        ImageJob {
            prompt: prompt.to_string(),
            negative_prompt: String::new(),
            reference_image: None,
            strength: 0.75,
            guidance_scale: 7.5,
            num_inference_steps: 25,
            seed: 9,
            width: 1024,
            height: 1024,
        }
    }

    #[test]
    fn test_image_request_puts_reference_first() {
        let client = GeminiClient::new("k", "https://example.test/v1beta/");
        let mut job = job("make it blue");
        job.reference_image = Some(InlineImage {
            mime_type: "image/png".to_string(),
            data: "AAAA".to_string(),
        });

        let body = serde_json::to_value(client.build_image_request(&job)).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "make it blue");
        assert_eq!(body["generationConfig"]["responseModalities"][1], "IMAGE");
        assert_eq!(
            client.url("m", "generateContent"),
            "https://example.test/v1beta/models/m:generateContent"
        );
    }

    #[test]
    fn test_chat_request_maps_roles() {
        let client = GeminiClient::new("k", "https://example.test");
        let messages = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage {
                role: Role::System,
                content: MessageContent::Text("be brief".to_string()),
            },
        ];
        let body = serde_json::to_value(client.build_chat_request("sys", &messages)).unwrap();
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys\n\nbe brief");
    }

    #[test]
    fn test_extract_image() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"here"},{"inlineData":{"mimeType":"image/png","data":"AAAA"}}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_image(response).unwrap(), ProviderImage::Base64("AAAA".to_string()));
    }

    #[test]
    fn test_extract_image_refusal() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"finishReason":"IMAGE_SAFETY","finishMessage":"refused"}]}"#,
        )
        .unwrap();
        match extract_image(response) {
            Err(StudioError::GenerationFailed(message)) => assert_eq!(message, "refused"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extract_image_text_only() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"no"}]}}]}"#)
                .unwrap();
        assert!(matches!(extract_image(response), Err(StudioError::GenerationFailed(_))));
    }

    #[test]
    fn test_extract_text_blocked_prompt() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        match extract_text(&response) {
            Err(StudioError::GenerationFailed(message)) => {
                assert_eq!(message, "Prompt blocked: SAFETY")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extract_text_refused_or_empty() {
        let refused: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"RECITATION"}]}"#).unwrap();
        assert!(matches!(extract_text(&refused), Err(StudioError::GenerationFailed(_))));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(extract_text(&empty), Err(StudioError::InvalidResponse(_))));

        let ok: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(&ok).unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_stream_blocked_chunk_is_error() {
        let body: &'static str = concat!(
            r#"data: {"candidates":[{"content":{"parts":[{"text":"Hel"}]}}]}"#,
            "\n\n",
            r#"data: {"candidates":[{"finishReason":"SAFETY"}]}"#,
            "\n\n",
        );
        let chunks = futures_util::stream::iter(vec![Ok::<_, reqwest::Error>(body)]);
        let items: Vec<Result<String, StudioError>> =
            chat_segments(data_events(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Hel");
        assert!(matches!(items[1], Err(StudioError::GenerationFailed(_))));
    }

    #[test]
    fn test_upstream_error_parses_api_error() {
        let err = upstream_error(
            400,
            r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#,
        );
        assert!(err.to_string().contains("INVALID_ARGUMENT (400): API key not valid"));
    }
}
