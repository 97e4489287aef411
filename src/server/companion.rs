use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, AppState};
use crate::core::{ChatMessage, CompanionRequest, InlineImage};

#[derive(Debug, Deserialize)]
pub struct CompanionBody {
    message: Option<Value>,
    #[serde(default)]
    history: Vec<ChatMessage>,
    persona: Option<String>,
    #[serde(default = "default_generate_image")]
    generate_image: bool,
}

fn default_generate_image() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct CompanionResponse {
    success: bool,
    text: String,
    /// Data URL, or null when no image was produced
    image: Option<String>,
    image_prompt: String,
    message: String,
}

pub(super) async fn post_companion(
    State(state): State<AppState>,
    payload: Result<Json<CompanionBody>, JsonRejection>,
) -> Result<Json<CompanionResponse>, ApiError> {
    let Json(body) = payload?;

    let message = match body.message {
        Some(Value::String(message)) if !message.trim().is_empty() => message,
        _ => return Err(ApiError::client("Message is required")),
    };

    let reply = state
        .companion(CompanionRequest {
            message: message.clone(),
            history: body.history,
            persona: body.persona,
            generate_image: body.generate_image,
        })
        .await
        .map_err(|e| ApiError::from_studio(e, "Failed to generate response"))?;

    Ok(Json(CompanionResponse {
        success: true,
        text: reply.text,
        image: reply.image.as_ref().map(InlineImage::to_data_url),
        image_prompt: reply.image_prompt.unwrap_or_default(),
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support;
    use axum::http::StatusCode;
    use serde_json::json;

    fn body(value: Value) -> Result<Json<CompanionBody>, JsonRejection> {
        Ok(Json(serde_json::from_value(value).unwrap()))
    }

    #[tokio::test]
    async fn test_reply_with_image() {
        let (state, _, images) =
            test_support::with_chat("Morning! ☀️\n[image]: misty pine forest at sunrise");
        let Json(response) = post_companion(
            State(state),
            body(json!({
                "message": "good morning",
                "history": [{ "role": "assistant", "content": "Hi!" }]
            })),
        )
        .await
        .unwrap();

        assert!(response.success);
        assert_eq!(response.text, "Morning! ☀️");
        assert_eq!(response.image_prompt, "misty pine forest at sunrise");
        assert!(response.image.unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(response.message, "good morning");
        assert_eq!(images.calls(), 1);
    }

    #[tokio::test]
    async fn test_reply_without_marker() {
        let (state, _, images) = test_support::with_chat("Just text");
        let Json(response) = post_companion(State(state), body(json!({ "message": "hey" })))
            .await
            .unwrap();

        assert_eq!(response.text, "Just text");
        assert_eq!(response.image_prompt, "");
        assert!(response.image.is_none());
        assert_eq!(images.calls(), 0);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["image"].is_null());
    }

    #[tokio::test]
    async fn test_missing_message_is_400() {
        let (state, _, _) = test_support::with_chat("x");
        let err = post_companion(State(state), body(json!({ "message": 12 })))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
