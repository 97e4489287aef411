use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::core::models::{ModelDescriptor, MODELS};

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    default_model: String,
    models: Vec<ModelEntry>,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    #[serde(flatten)]
    model: &'static ModelDescriptor,
    available: bool,
}

pub(super) async fn get_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let availability = state.availability();

    Json(ModelsResponse {
        default_model: state.config().defaults.image_model.clone(),
        models: MODELS
            .iter()
            .map(|model| ModelEntry {
                model,
                available: availability.has(model.provider),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support;

    #[tokio::test]
    async fn test_catalogue_marks_availability() {
        let (state, _) = test_support::free_tier();
        let Json(response) = get_models(State(state)).await;
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["default_model"], "flux");
        let models = json["models"].as_array().unwrap();
        assert_eq!(models.len(), MODELS.len());

        let kontext = models.iter().find(|m| m["id"] == "kontext").unwrap();
        assert_eq!(kontext["available"], true);
        assert_eq!(kontext["supports_reference_image"], true);
        assert_eq!(kontext["provider"], "pollinations");
        assert!(kontext.get("upstream").is_none());

        let dalle = models.iter().find(|m| m["id"] == "dall-e-3").unwrap();
        assert_eq!(dalle["available"], false);
    }
}
