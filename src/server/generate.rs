use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, AppState};
use crate::core::params::clamp_count;
use crate::core::{InlineImage, Mode};

const FAILURE: &str = "Failed to generate image";

#[derive(Debug, Default, Deserialize)]
pub struct GenerateBody {
    prompt: Option<Value>,
    count: Option<Value>,
    /// Data URL or bare base64
    image: Option<String>,
    strength: Option<f32>,
    model: Option<String>,
    enhance: Option<bool>,
    negative_prompt: Option<String>,
    guidance_scale: Option<f32>,
    num_inference_steps: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    success: bool,
    images: Vec<String>,
    prompt: String,
    original_prompt: String,
    count: u8,
    model: &'static str,
    model_switched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    switch_reason: Option<String>,
    mode: Mode,
    available_models: Vec<&'static str>,
}

pub(super) async fn post_generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) = payload?;

    let prompt = match body.prompt {
        Some(Value::String(prompt)) if !prompt.trim().is_empty() => prompt,
        _ => return Err(ApiError::client("Prompt is required")),
    };

    let mut request = state.request(prompt);
    request.count = clamp_count(body.count.as_ref());
    request.model = body.model.filter(|m| !m.trim().is_empty());
    request.negative_prompt = body.negative_prompt.filter(|n| !n.trim().is_empty());
    request.seed = body.seed;
    if let Some(enhance) = body.enhance {
        request.enhance = enhance;
    }
    if let Some(strength) = body.strength {
        request.strength = strength.clamp(0.0, 1.0);
    }
    if let Some(guidance_scale) = body.guidance_scale {
        request.guidance_scale = guidance_scale;
    }
    if let Some(steps) = body.num_inference_steps {
        request.num_inference_steps = steps;
    }
    if let Some(image) = body.image.filter(|i| !i.trim().is_empty()) {
        let image = InlineImage::from_data_url(&image)
            .map_err(|e| ApiError::from_studio(e, FAILURE))?;
        request.reference_image = Some(image);
    }

    let result = state
        .generate_images(request)
        .await
        .map_err(|e| ApiError::from_studio(e, FAILURE))?;

    Ok(Json(GenerateResponse {
        success: true,
        images: result.images.iter().map(InlineImage::to_data_url).collect(),
        prompt: result.prompt,
        original_prompt: result.original_prompt,
        count: result.count,
        model: result.model.id,
        model_switched: result.model_switched,
        switch_reason: result.switch_reason,
        mode: result.mode,
        available_models: result.available_models,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeImageProvider;
    use crate::api::Providers;
    use crate::config::Config;
    use crate::core::image::tests::{png_data_url, PNG_BYTES};
    use crate::core::{Provider, Studio};
    use crate::server::test_support;
    use std::sync::Arc;
    use axum::http::StatusCode;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde_json::json;

    fn body(value: Value) -> Result<Json<GenerateBody>, JsonRejection> {
        Ok(Json(serde_json::from_value(value).unwrap()))
    }

    #[tokio::test]
    async fn test_two_flux_images() {
        let (state, fake) = test_support::free_tier();
        let Json(response) = post_generate(
            State(state),
            body(json!({ "prompt": "a cat", "count": 2, "model": "flux" })),
        )
        .await
        .unwrap();

        assert!(response.success);
        assert_eq!(response.images.len(), 2);
        assert_eq!(response.count, 2);
        assert_eq!(response.model, "flux");
        assert!(!response.model_switched);
        assert_eq!(response.mode, Mode::TextToImage);
        assert_eq!(fake.calls(), 2);

        for image in &response.images {
            let data = image.strip_prefix("data:image/png;base64,").unwrap();
            assert_eq!(BASE64.decode(data).unwrap(), PNG_BYTES);
        }
    }

    #[tokio::test]
    async fn test_edit_switches_model() {
        let (state, _) = test_support::free_tier();
        let Json(response) = post_generate(
            State(state),
            body(json!({ "prompt": "edit this", "image": png_data_url(), "model": "flux" })),
        )
        .await
        .unwrap();

        assert!(response.model_switched);
        assert_eq!(response.model, "kontext");
        assert_eq!(response.mode, Mode::ImageToImage);
        assert!(response.switch_reason.is_some());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mode"], "img2img");
    }

    #[tokio::test]
    async fn test_missing_prompt_is_400_without_calls() {
        for value in [json!({}), json!({ "prompt": "" }), json!({ "prompt": 7 })] {
            let (state, fake) = test_support::free_tier();
            let err = post_generate(State(state), body(value)).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert_eq!(fake.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_count_is_clamped() {
        let (state, fake) = test_support::free_tier();
        let Json(response) = post_generate(
            State(state),
            body(json!({ "prompt": "a cat", "count": "9", "enhance": false })),
        )
        .await
        .unwrap();

        assert_eq!(response.count, 4);
        assert_eq!(response.prompt, "a cat");
        assert_eq!(fake.calls(), 4);
    }

    #[tokio::test]
    async fn test_bad_reference_image_is_400() {
        let (state, fake) = test_support::free_tier();
        let err = post_generate(
            State(state),
            body(json!({ "prompt": "edit", "image": "data:image/png;base64,***" })),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_500() {
        let fake = Arc::new(FakeImageProvider::new().failing_on_call(1));
        let studio = Studio::new(
            Config::default(),
            Providers::new().with_image(Provider::Pollinations, fake),
        );

        let err = post_generate(
            State(Arc::new(studio)),
            body(json!({ "prompt": "a cat" })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
