use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::Studio;

mod chat;
mod companion;
pub mod error;
mod generate;
mod models;

pub use error::ApiError;

pub type AppState = Arc<Studio>;

/// Reference images arrive inline as base64
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config().server.cors_origins);

    Router::new()
        .route("/chat", post(chat::post_chat))
        .route("/companion", post(companion::post_companion))
        .route("/generate", post(generate::post_generate))
        .route("/models", get(models::get_models))
        .route("/healthz", get(get_health))
        .fallback(get_404)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(studio: Studio, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    let availability = studio.availability();
    info!(
        openai = availability.openai,
        gemini = availability.gemini,
        huggingface = availability.huggingface,
        pollinations = availability.pollinations,
        "Listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, router(Arc::new(studio)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| {
            let value = HeaderValue::from_str(origin).ok();
            if value.is_none() {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
            }
            value
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn get_health() -> StatusCode {
    StatusCode::OK
}

async fn get_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
