use thiserror::Error;

use super::models::Provider;

#[derive(Error, Debug)]
pub enum StudioError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{provider} credential not configured")]
    MissingCredential {
        provider: Provider,
        hint: String,
    },

    #[error("Unsupported capability: {0}")]
    Capability(String),

    #[error("{provider} API error: {status} - {message}")]
    Upstream {
        provider: Provider,
        status: u16,
        message: String,
    },

    #[error("API error: {message}")]
    ApiError {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StudioError {
    pub fn missing_credential(provider: Provider) -> Self {
        let hint = match provider.credential_env() {
            Some(var) => format!(
                "Set the {} environment variable or run: studio config set {} <value>",
                var,
                provider.config_key()
            ),
            None => format!(
                "Enable it with: studio config set {} true",
                provider.config_key()
            ),
        };
        StudioError::MissingCredential { provider, hint }
    }

    /// Whether the caller sent something unusable, as opposed to a server-side failure.
    #[cfg(test)]
    pub fn is_client_error(&self) -> bool {
        matches!(self, StudioError::InvalidInput(_))
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(err: reqwest::Error) -> Self {
        StudioError::ApiError {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        StudioError::InvalidResponse(err.to_string())
    }
}
