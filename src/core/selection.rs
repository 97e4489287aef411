//! Decides which model actually serves a request.
//!
//! Two gates run in order: credential gating swaps a model whose provider is
//! not configured for the best configured alternative of the same or a lower
//! tier, then capability gating swaps a model that cannot take a reference
//! image for one of the designated edit models.

use super::error::StudioError;
use super::models::{self, ModelDescriptor, Provider, ProviderFamily, EDIT_FALLBACKS};

/// Which providers can be called right now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability {
    pub openai: bool,
    pub gemini: bool,
    pub huggingface: bool,
    pub pollinations: bool,
}

impl Availability {
    pub fn has(&self, provider: Provider) -> bool {
        match provider {
            Provider::OpenAi => self.openai,
            Provider::Gemini => self.gemini,
            Provider::HuggingFace => self.huggingface,
            Provider::Pollinations => self.pollinations,
        }
    }

    #[cfg(test)]
    pub fn all() -> Self {
        Self {
            openai: true,
            gemini: true,
            huggingface: true,
            pollinations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub model: &'static ModelDescriptor,
    pub requested: Option<String>,
    pub switched: bool,
    pub reason: Option<String>,
}

impl Selection {
    fn new(model: &'static ModelDescriptor, requested: Option<&str>) -> Self {
        Self {
            model,
            requested: requested.map(str::to_string),
            switched: false,
            reason: None,
        }
    }

    fn switch_to(&mut self, model: &'static ModelDescriptor, reason: String) {
        self.model = model;
        self.switched = true;
        self.reason = Some(match self.reason.take() {
            Some(previous) => format!("{}; {}", previous, reason),
            None => reason,
        });
    }
}

/// Pick the image model for a request.
pub fn select_image_model(
    requested: Option<&str>,
    default_id: &str,
    availability: &Availability,
    has_reference: bool,
) -> Result<Selection, StudioError> {
    let default = models::lookup(default_id)
        .filter(|m| m.family.is_image())
        .ok_or_else(|| {
            StudioError::ConfigError(format!("Default image model '{}' is not known", default_id))
        })?;

    let mut selection = resolve_requested(requested, default, |m| m.family.is_image());

    if !availability.has(selection.model.provider) {
        let current = selection.model;
        let alternative = credential_fallback(current, availability)
            .ok_or_else(|| StudioError::missing_credential(current.provider))?;
        selection.switch_to(alternative, unavailable_reason(current, alternative));
    }

    if has_reference && !selection.model.supports_edit {
        let current = selection.model;
        let alternative = EDIT_FALLBACKS
            .iter()
            .filter_map(|id| models::lookup(id))
            .find(|m| availability.has(m.provider))
            .ok_or_else(|| {
                StudioError::Capability(format!(
                    "'{}' cannot use a reference image and no reference-capable model is configured. \
                     Set OPENAI_API_KEY or GEMINI_API_KEY, or enable Pollinations",
                    current.id
                ))
            })?;
        selection.switch_to(
            alternative,
            format!(
                "'{}' does not support reference images; using '{}'",
                current.id, alternative.id
            ),
        );
    }

    tracing::debug!(
        model = selection.model.id,
        switched = selection.switched,
        "Selected image model"
    );

    Ok(selection)
}

/// Pick the chat model. Only credential gating applies, within the chat family.
pub fn select_chat_model(
    requested: Option<&str>,
    default_id: &str,
    availability: &Availability,
) -> Result<Selection, StudioError> {
    let default = models::lookup(default_id)
        .filter(|m| m.family == ProviderFamily::FirstPartyChat)
        .ok_or_else(|| {
            StudioError::ConfigError(format!("Default chat model '{}' is not known", default_id))
        })?;

    let mut selection = resolve_requested(requested, default, |m| {
        m.family == ProviderFamily::FirstPartyChat
    });

    if !availability.has(selection.model.provider) {
        let current = selection.model;
        let alternative = models::chat_models()
            .filter(|m| availability.has(m.provider))
            .min_by_key(|m| !m.recommended)
            .ok_or_else(|| StudioError::missing_credential(current.provider))?;
        selection.switch_to(alternative, unavailable_reason(current, alternative));
    }

    Ok(selection)
}

fn resolve_requested(
    requested: Option<&str>,
    default: &'static ModelDescriptor,
    accepts: impl Fn(&ModelDescriptor) -> bool,
) -> Selection {
    let requested = requested.map(str::trim).filter(|id| !id.is_empty());
    match requested {
        None => Selection::new(default, None),
        Some(id) => match models::lookup(id).filter(|m| accepts(m)) {
            Some(model) => Selection::new(model, Some(id)),
            None => {
                let mut selection = Selection::new(default, Some(id));
                selection.switch_to(
                    default,
                    format!("Unknown model '{}'; using default '{}'", id, default.id),
                );
                selection
            }
        },
    }
}

/// Same family first, then each lower tier; recommended entries lead within a family.
fn credential_fallback(
    current: &ModelDescriptor,
    availability: &Availability,
) -> Option<&'static ModelDescriptor> {
    let tier = current.family.image_tier()?;

    let mut candidates: Vec<&'static ModelDescriptor> = models::image_models()
        .filter(|m| m.id != current.id && availability.has(m.provider))
        .filter(|m| m.family.image_tier().is_some_and(|t| t <= tier))
        .collect();

    // Stable sort keeps table order among equals.
    candidates.sort_by_key(|m| {
        (
            m.family != current.family,
            std::cmp::Reverse(m.family.image_tier()),
            !m.recommended,
        )
    });

    candidates.into_iter().next()
}

fn unavailable_reason(current: &ModelDescriptor, alternative: &ModelDescriptor) -> String {
    let what = current
        .provider
        .credential_env()
        .map(|var| format!("{} is not configured", var))
        .unwrap_or_else(|| format!("{} is disabled", current.provider));
    format!(
        "'{}' requires {} but {}; using '{}'",
        current.id, current.provider, what, alternative.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(providers: &[Provider]) -> Availability {
        let mut availability = Availability::default();
        for p in providers {
            match p {
                Provider::OpenAi => availability.openai = true,
                Provider::Gemini => availability.gemini = true,
                Provider::HuggingFace => availability.huggingface = true,
                Provider::Pollinations => availability.pollinations = true,
            }
        }
        availability
    }

    #[test]
    fn test_requested_model_kept_when_available() {
        let s = select_image_model(Some("flux"), "flux", &only(&[Provider::Pollinations]), false)
            .unwrap();
        assert_eq!(s.model.id, "flux");
        assert!(!s.switched);
        assert!(s.reason.is_none());
    }

    #[test]
    fn test_absent_model_uses_default_silently() {
        let s = select_image_model(None, "flux", &only(&[Provider::Pollinations]), false).unwrap();
        assert_eq!(s.model.id, "flux");
        assert!(!s.switched);
    }

    #[test]
    fn test_unknown_model_uses_default() {
        let s = select_image_model(
            Some("nope"),
            "flux",
            &only(&[Provider::Pollinations]),
            false,
        )
        .unwrap();
        assert_eq!(s.model.id, "flux");
        assert!(s.switched);
        assert!(s.reason.unwrap().contains("Unknown model 'nope'"));
    }

    #[test]
    fn test_chat_model_is_not_an_image_model() {
        let s = select_image_model(
            Some("gpt-4o-mini"),
            "flux",
            &Availability::all(),
            false,
        )
        .unwrap();
        assert_eq!(s.model.id, "flux");
        assert!(s.switched);
    }

    #[test]
    fn test_missing_credential_prefers_same_family() {
        // HF model requested, no HF token, pollinations on
        let s = select_image_model(
            Some("flux-dev"),
            "flux",
            &only(&[Provider::Pollinations, Provider::OpenAi]),
            false,
        )
        .unwrap();
        assert_eq!(s.model.provider, Provider::Pollinations);
        assert!(s.switched);
        assert!(s.reason.unwrap().contains("HF_TOKEN"));
    }

    #[test]
    fn test_missing_credential_same_family_other_provider() {
        let s = select_image_model(
            Some("dall-e-3"),
            "flux",
            &only(&[Provider::Gemini, Provider::Pollinations]),
            false,
        )
        .unwrap();
        assert_eq!(s.model.id, "gemini-2.5-flash-image");
    }

    #[test]
    fn test_missing_credential_never_returns_that_provider() {
        let availability = only(&[Provider::HuggingFace, Provider::Pollinations]);
        for model in models::image_models() {
            let s = select_image_model(Some(model.id), "flux", &availability, false).unwrap();
            assert!(availability.has(s.model.provider), "{} -> {}", model.id, s.model.id);
            if !availability.has(model.provider) {
                assert!(s.switched);
                assert_ne!(s.model.provider, model.provider);
            }
        }
    }

    #[test]
    fn test_lower_tier_never_upgrades() {
        // Pollinations disabled, only OpenAI configured: free tier has nowhere lower to go
        let err = select_image_model(Some("turbo"), "turbo", &only(&[Provider::OpenAi]), false)
            .unwrap_err();
        assert!(matches!(
            err,
            StudioError::MissingCredential {
                provider: Provider::Pollinations,
                ..
            }
        ));
    }

    #[test]
    fn test_reference_image_switches_to_capable_model() {
        let s = select_image_model(Some("flux"), "flux", &only(&[Provider::Pollinations]), true)
            .unwrap();
        assert_eq!(s.model.id, "kontext");
        assert!(s.switched);
        assert!(s.model.supports_edit);
        assert!(!s.reason.unwrap().is_empty());
    }

    #[test]
    fn test_reference_image_prefers_first_party() {
        let s = select_image_model(Some("flux"), "flux", &Availability::all(), true).unwrap();
        assert_eq!(s.model.id, "gpt-image-1");

        let s = select_image_model(
            Some("flux"),
            "flux",
            &only(&[Provider::Gemini, Provider::Pollinations]),
            true,
        )
        .unwrap();
        assert_eq!(s.model.id, "gemini-2.5-flash-image");
    }

    #[test]
    fn test_reference_image_kept_on_capable_model() {
        let s = select_image_model(Some("sdxl"), "flux", &only(&[Provider::HuggingFace]), true)
            .unwrap();
        assert_eq!(s.model.id, "sdxl");
        assert!(!s.switched);
    }

    #[test]
    fn test_reference_image_without_capable_model_fails() {
        let err = select_image_model(
            Some("flux-schnell"),
            "flux",
            &only(&[Provider::HuggingFace]),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, StudioError::Capability(_)));
    }

    #[test]
    fn test_both_gates_join_reasons() {
        let s = select_image_model(
            Some("flux-schnell"),
            "flux",
            &only(&[Provider::Pollinations]),
            true,
        )
        .unwrap();
        assert_eq!(s.model.id, "kontext");
        let reason = s.reason.unwrap();
        assert!(reason.contains("HF_TOKEN"));
        assert!(reason.contains("does not support reference images"));
    }

    #[test]
    fn test_bad_default_is_config_error() {
        let err = select_image_model(None, "gpt-4o-mini", &Availability::all(), false).unwrap_err();
        assert!(matches!(err, StudioError::ConfigError(_)));
    }

    #[test]
    fn test_chat_fallback_between_providers() {
        let s = select_chat_model(None, "gemini-2.0-flash", &only(&[Provider::OpenAi])).unwrap();
        assert_eq!(s.model.id, "gpt-4o-mini");
        assert!(s.switched);
        assert!(s.reason.unwrap().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_chat_without_any_credential() {
        let err = select_chat_model(None, "gemini-2.0-flash", &only(&[Provider::Pollinations]))
            .unwrap_err();
        assert!(matches!(err, StudioError::MissingCredential { .. }));
    }
}
