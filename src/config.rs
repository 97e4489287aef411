use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::core::chat::DEFAULT_SYSTEM_PROMPT;
use crate::core::{models, Availability};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(skip)]
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub huggingface_token: Option<String>,
    /// Pollinations needs no key; this is its on/off switch
    #[serde(default = "default_true")]
    pub pollinations_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    #[serde(default = "default_huggingface_base_url")]
    pub huggingface_base_url: String,
    #[serde(default = "default_pollinations_base_url")]
    pub pollinations_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_companion_image_model")]
    pub companion_image_model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_strength")]
    pub strength: f32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[serde(default = "default_num_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: String,
    #[serde(default = "default_true")]
    pub auto_download: bool,
    #[serde(default = "default_display")]
    pub display: DisplayMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Terminal,
    None,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Terminal => "terminal",
            DisplayMode::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => DisplayMode::None,
            _ => DisplayMode::Terminal,
        }
    }
}

// Default value functions
fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_huggingface_base_url() -> String {
    "https://router.huggingface.co/hf-inference/models".to_string()
}

fn default_pollinations_base_url() -> String {
    "https://image.pollinations.ai".to_string()
}

fn default_image_model() -> String {
    "flux".to_string()
}

fn default_chat_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_companion_image_model() -> String {
    "flux-schnell".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_strength() -> f32 {
    0.75
}

fn default_guidance_scale() -> f32 {
    7.5
}

fn default_num_inference_steps() -> u32 {
    25
}

fn default_negative_prompt() -> String {
    "blurry, low quality, distorted, deformed, ugly, bad anatomy, watermark, signature, text"
        .to_string()
}

fn default_dimension() -> u32 {
    1024
}

fn default_output_directory() -> String {
    "./studio-output".to_string()
}

fn default_true() -> bool {
    true
}

fn default_display() -> DisplayMode {
    DisplayMode::Terminal
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            gemini_api_key: None,
            huggingface_token: None,
            pollinations_enabled: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            openai_base_url: default_openai_base_url(),
            gemini_base_url: default_gemini_base_url(),
            huggingface_base_url: default_huggingface_base_url(),
            pollinations_base_url: default_pollinations_base_url(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            image_model: default_image_model(),
            chat_model: default_chat_model(),
            companion_image_model: default_companion_image_model(),
            system_prompt: default_system_prompt(),
            strength: default_strength(),
            guidance_scale: default_guidance_scale(),
            num_inference_steps: default_num_inference_steps(),
            negative_prompt: default_negative_prompt(),
            width: default_dimension(),
            height: default_dimension(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            auto_download: true,
            display: DisplayMode::Terminal,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            credentials: CredentialsConfig::default(),
            api: ApiConfig::default(),
            defaults: DefaultsConfig::default(),
            output: OutputConfig::default(),
            config_path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "promptstudio", "prompt-studio")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from file or create default, then overlay the environment
    pub fn load_or_create() -> Result<Self> {
        let mut config = Self::load_file()?;

        // Environment variables take precedence
        config.apply_env(|name| std::env::var(name).ok());

        Ok(config)
    }

    /// Load config from file or create default, ignoring the environment
    pub fn load_file() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str::<Config>(&content).context("Failed to parse config file")?
        } else {
            let config = Config {
                config_path: config_path.clone(),
                ..Config::default()
            };
            // Create config directory and save default config
            config.save()?;
            config
        };
        config.config_path = config_path;

        Ok(config)
    }

    /// Overlay credentials found in the environment
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.credentials.openai_api_key = Some(key);
        }
        if let Some(key) =
            non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_GENERATIVE_AI_API_KEY"))
        {
            self.credentials.gemini_api_key = Some(key);
        }
        if let Some(token) = non_empty("HF_TOKEN") {
            self.credentials.huggingface_token = Some(token);
        }
        if let Some(bind) = non_empty("STUDIO_BIND") {
            self.server.bind = bind;
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&self.config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Which providers have what they need to be called
    pub fn availability(&self) -> Availability {
        let set = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        Availability {
            openai: set(&self.credentials.openai_api_key),
            gemini: set(&self.credentials.gemini_api_key),
            huggingface: set(&self.credentials.huggingface_token),
            pollinations: self.credentials.pollinations_enabled,
        }
    }

    /// Set a config value by key path (e.g., "defaults.image_model")
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let secret = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        match key {
            "server.bind" => self.server.bind = value.to_string(),
            "server.cors_origins" => {
                self.server.cors_origins = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "credentials.openai_api_key" => self.credentials.openai_api_key = secret(value),
            "credentials.gemini_api_key" => self.credentials.gemini_api_key = secret(value),
            "credentials.huggingface_token" => self.credentials.huggingface_token = secret(value),
            "credentials.pollinations_enabled" => {
                self.credentials.pollinations_enabled = value.parse()
                    .context("Invalid boolean value")?;
            }
            "api.openai_base_url" => self.api.openai_base_url = value.to_string(),
            "api.gemini_base_url" => self.api.gemini_base_url = value.to_string(),
            "api.huggingface_base_url" => self.api.huggingface_base_url = value.to_string(),
            "api.pollinations_base_url" => self.api.pollinations_base_url = value.to_string(),
            "defaults.image_model" => {
                match models::lookup(value) {
                    Some(model) if model.family.is_image() => {
                        self.defaults.image_model = value.to_string()
                    }
                    _ => anyhow::bail!(
                        "Unknown image model. Valid values: {}",
                        models::image_models().map(|m| m.id).collect::<Vec<_>>().join(", ")
                    ),
                }
            }
            "defaults.chat_model" => match models::lookup(value) {
                Some(model) if !model.family.is_image() => {
                    self.defaults.chat_model = value.to_string()
                }
                _ => anyhow::bail!(
                    "Unknown chat model. Valid values: {}",
                    models::chat_models().map(|m| m.id).collect::<Vec<_>>().join(", ")
                ),
            },
            "defaults.companion_image_model" => match models::lookup(value) {
                Some(model) if model.family.is_image() => {
                    self.defaults.companion_image_model = value.to_string()
                }
                _ => anyhow::bail!("Unknown image model: {}", value),
            },
            "defaults.system_prompt" => self.defaults.system_prompt = value.to_string(),
            "defaults.strength" => {
                let strength: f32 = value.parse().context("Invalid number")?;
                if !(0.0..=1.0).contains(&strength) {
                    anyhow::bail!("Strength must be between 0 and 1");
                }
                self.defaults.strength = strength;
            }
            "defaults.guidance_scale" => {
                self.defaults.guidance_scale = value.parse().context("Invalid number")?;
            }
            "defaults.num_inference_steps" => {
                self.defaults.num_inference_steps = value.parse().context("Invalid number")?;
            }
            "defaults.negative_prompt" => self.defaults.negative_prompt = value.to_string(),
            "defaults.width" => self.defaults.width = value.parse().context("Invalid number")?,
            "defaults.height" => self.defaults.height = value.parse().context("Invalid number")?,
            "output.directory" => self.output.directory = value.to_string(),
            "output.auto_download" => {
                self.output.auto_download = value.parse()
                    .context("Invalid boolean value")?;
            }
            "output.display" => {
                self.output.display = DisplayMode::from_str(value);
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    /// Get a config value by key path
    pub fn get(&self, key: &str) -> Option<String> {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "****".to_string());

        match key {
            "server.bind" => Some(self.server.bind.clone()),
            "server.cors_origins" => Some(self.server.cors_origins.join(",")),
            "credentials.openai_api_key" => mask(&self.credentials.openai_api_key),
            "credentials.gemini_api_key" => mask(&self.credentials.gemini_api_key),
            "credentials.huggingface_token" => mask(&self.credentials.huggingface_token),
            "credentials.pollinations_enabled" => {
                Some(self.credentials.pollinations_enabled.to_string())
            }
            "api.openai_base_url" => Some(self.api.openai_base_url.clone()),
            "api.gemini_base_url" => Some(self.api.gemini_base_url.clone()),
            "api.huggingface_base_url" => Some(self.api.huggingface_base_url.clone()),
            "api.pollinations_base_url" => Some(self.api.pollinations_base_url.clone()),
            "defaults.image_model" => Some(self.defaults.image_model.clone()),
            "defaults.chat_model" => Some(self.defaults.chat_model.clone()),
            "defaults.companion_image_model" => Some(self.defaults.companion_image_model.clone()),
            "defaults.system_prompt" => Some(self.defaults.system_prompt.clone()),
            "defaults.strength" => Some(self.defaults.strength.to_string()),
            "defaults.guidance_scale" => Some(self.defaults.guidance_scale.to_string()),
            "defaults.num_inference_steps" => Some(self.defaults.num_inference_steps.to_string()),
            "defaults.negative_prompt" => Some(self.defaults.negative_prompt.clone()),
            "defaults.width" => Some(self.defaults.width.to_string()),
            "defaults.height" => Some(self.defaults.height.to_string()),
            "output.directory" => Some(self.output.directory.clone()),
            "output.auto_download" => Some(self.output.auto_download.to_string()),
            "output.display" => Some(self.output.display.as_str().to_string()),
            _ => None,
        }
    }

    /// Current values grouped by section, in key order
    pub fn sections(&self) -> Vec<(&'static str, Vec<(&'static str, Option<String>)>)> {
        let mut sections: Vec<(&'static str, Vec<(&'static str, Option<String>)>)> = Vec::new();
        for key in Self::keys() {
            let (section, field) = key.split_once('.').unwrap_or(("", key));
            let entry = (field, self.get(key));
            match sections.last_mut() {
                Some((name, fields)) if *name == section => fields.push(entry),
                _ => sections.push((section, vec![entry])),
            }
        }
        sections
    }

    /// Drop every setting back to its default, keeping the file location
    pub fn reset(&mut self) {
        let config_path = std::mem::take(&mut self.config_path);
        *self = Config {
            config_path,
            ..Config::default()
        };
    }

    /// Get all config keys
    pub fn keys() -> &'static [&'static str] {
        &[
            "server.bind",
            "server.cors_origins",
            "credentials.openai_api_key",
            "credentials.gemini_api_key",
            "credentials.huggingface_token",
            "credentials.pollinations_enabled",
            "api.openai_base_url",
            "api.gemini_base_url",
            "api.huggingface_base_url",
            "api.pollinations_base_url",
            "defaults.image_model",
            "defaults.chat_model",
            "defaults.companion_image_model",
            "defaults.system_prompt",
            "defaults.strength",
            "defaults.guidance_scale",
            "defaults.num_inference_steps",
            "defaults.negative_prompt",
            "defaults.width",
            "defaults.height",
            "output.directory",
            "output.auto_download",
            "output.display",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_availability_is_free_tier_only() {
        let availability = Config::default().availability();
        assert!(availability.pollinations);
        assert!(!availability.openai && !availability.gemini && !availability.huggingface);
    }

    #[test]
    fn test_env_overrides_credentials() {
        let env: HashMap<&str, &str> = [
            ("GOOGLE_GENERATIVE_AI_API_KEY", "g-key"),
            ("HF_TOKEN", "hf_abc"),
            ("OPENAI_API_KEY", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.credentials.gemini_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.credentials.huggingface_token.as_deref(), Some("hf_abc"));
        assert!(config.credentials.openai_api_key.is_none());
        assert!(config.availability().huggingface);
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("defaults.image_model", "sdxl").unwrap();
        config.set("credentials.huggingface_token", "hf_secret").unwrap();
        config.set("credentials.pollinations_enabled", "false").unwrap();

        assert_eq!(config.get("defaults.image_model").as_deref(), Some("sdxl"));
        assert_eq!(config.get("credentials.huggingface_token").as_deref(), Some("****"));
        assert_eq!(config.get("credentials.openai_api_key"), None);
        assert!(!config.availability().pollinations);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("defaults.image_model", "gpt-4o-mini").is_err());
        assert!(config.set("defaults.chat_model", "flux").is_err());
        assert!(config.set("defaults.strength", "1.5").is_err());
        assert!(config.set("nope.key", "x").is_err());
    }

    #[test]
    fn test_every_key_is_readable() {
        let mut config = Config::default();
        config.credentials.openai_api_key = Some("k".to_string());
        config.credentials.gemini_api_key = Some("k".to_string());
        config.credentials.huggingface_token = Some("k".to_string());
        for key in Config::keys() {
            assert!(config.get(key).is_some(), "{}", key);
        }
    }

    #[test]
    fn test_sections_group_keys_and_mask_secrets() {
        let mut config = Config::default();
        config.credentials.openai_api_key = Some("sk-live".to_string());

        let sections = config.sections();
        let names: Vec<&str> = sections.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["server", "credentials", "api", "defaults", "output"]);

        let (_, credentials) = &sections[1];
        assert_eq!(credentials[0], ("openai_api_key", Some("****".to_string())));
        assert_eq!(credentials[1], ("gemini_api_key", None));
        assert_eq!(credentials[3], ("pollinations_enabled", Some("true".to_string())));
    }

    #[test]
    fn test_reset_keeps_path() {
        let mut config = Config::default();
        config.config_path = PathBuf::from("/tmp/studio/config.toml");
        config.set("defaults.image_model", "turbo").unwrap();
        config.credentials.huggingface_token = Some("hf_x".to_string());

        config.reset();
        assert_eq!(config.defaults.image_model, "flux");
        assert!(config.credentials.huggingface_token.is_none());
        assert_eq!(config.config_path, PathBuf::from("/tmp/studio/config.toml"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[defaults]\nimage_model = \"turbo\"\n").unwrap();
        assert_eq!(config.defaults.image_model, "turbo");
        assert_eq!(config.defaults.num_inference_steps, 25);
        assert!(config.credentials.pollinations_enabled);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }
}
