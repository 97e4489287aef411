use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core::StudioError;

/// Error envelope returned by every handler
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: message.into(),
                details: None,
            },
        }
    }

    /// Map a core error, using `context` as the headline for server-side failures
    pub fn from_studio(err: StudioError, context: &str) -> Self {
        match err {
            StudioError::InvalidInput(message) => Self::client(message),
            StudioError::MissingCredential { provider, hint } => {
                tracing::error!("{} credential not configured", provider);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: ErrorBody {
                        error: format!("{} credential not configured", provider),
                        details: Some(hint),
                    },
                }
            }
            other => {
                tracing::error!("{}: {}", context, other);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: ErrorBody {
                        error: context.to_string(),
                        details: Some(other.to_string()),
                    },
                }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "Invalid request body".to_string(),
                details: Some(rejection.body_text()),
            },
        }
    }
}
