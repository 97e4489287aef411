use async_stream::stream;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use super::{ApiError, AppState};
use crate::core::ChatMessage;

const FAILURE: &str = "Failed to get response";

/// Terminates every event stream
pub const DONE: &str = "[DONE]";

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default = "default_stream")]
    stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    success: bool,
    text: String,
    model: &'static str,
}

pub(super) async fn post_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    if body.messages.is_empty() {
        return Err(ApiError::client("Messages are required"));
    }

    if !body.stream {
        let reply = state
            .chat(&body.messages)
            .await
            .map_err(|e| ApiError::from_studio(e, FAILURE))?;
        return Ok(Json(ChatResponse {
            success: true,
            text: reply.text,
            model: reply.model.id,
        })
        .into_response());
    }

    let (model, mut segments) = state
        .chat_stream(&body.messages)
        .await
        .map_err(|e| ApiError::from_studio(e, FAILURE))?;
    tracing::debug!(model = model.id, "Streaming chat reply");

    let events = stream! {
        while let Some(segment) = segments.next().await {
            match segment {
                Ok(text) => yield Ok::<_, Infallible>(Event::default().data(text)),
                Err(e) => {
                    tracing::warn!("Chat stream failed: {}", e);
                    yield Ok(Event::default().event("error").data(e.to_string()));
                    break;
                }
            }
        }
        yield Ok(Event::default().data(DONE));
    };

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}
