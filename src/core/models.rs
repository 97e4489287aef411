use serde::Serialize;

/// Upstream service a model is served by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Gemini,
    HuggingFace,
    Pollinations,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Gemini,
        Provider::HuggingFace,
        Provider::Pollinations,
    ];

    /// Environment variable holding the credential, if the provider needs one
    pub fn credential_env(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::HuggingFace => Some("HF_TOKEN"),
            Provider::Pollinations => None,
        }
    }

    /// Config key that controls availability of this provider
    pub fn config_key(&self) -> &'static str {
        match self {
            Provider::OpenAi => "credentials.openai_api_key",
            Provider::Gemini => "credentials.gemini_api_key",
            Provider::HuggingFace => "credentials.huggingface_token",
            Provider::Pollinations => "credentials.pollinations_enabled",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Provider::OpenAi => "OpenAI",
            Provider::Gemini => "Gemini",
            Provider::HuggingFace => "HuggingFace",
            Provider::Pollinations => "Pollinations",
        };
        write!(f, "{}", name)
    }
}

/// Grouping used for fallback decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderFamily {
    FirstPartyChat,
    FirstPartyImage,
    InferenceGateway,
    FreePublicGateway,
}

impl ProviderFamily {
    /// Rank among image families; higher is preferred. Chat has no rank.
    pub fn image_tier(&self) -> Option<u8> {
        match self {
            ProviderFamily::FirstPartyChat => None,
            ProviderFamily::FirstPartyImage => Some(2),
            ProviderFamily::InferenceGateway => Some(1),
            ProviderFamily::FreePublicGateway => Some(0),
        }
    }

    pub fn is_image(&self) -> bool {
        self.image_tier().is_some()
    }
}

/// A model the gateway knows how to route to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub provider: Provider,
    pub family: ProviderFamily,
    /// Name the provider knows the model by
    #[serde(skip)]
    pub upstream: &'static str,
    #[serde(rename = "supports_reference_image")]
    pub supports_edit: bool,
    pub description: &'static str,
    pub recommended: bool,
}

/// Reference-image capable replacements, in preference order
pub const EDIT_FALLBACKS: &[&str] = &["gpt-image-1", "gemini-2.5-flash-image", "kontext"];

pub static MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "gpt-4o-mini",
        provider: Provider::OpenAi,
        family: ProviderFamily::FirstPartyChat,
        upstream: "gpt-4o-mini",
        supports_edit: false,
        description: "OpenAI fast general-purpose chat model",
        recommended: false,
    },
    ModelDescriptor {
        id: "gemini-2.0-flash",
        provider: Provider::Gemini,
        family: ProviderFamily::FirstPartyChat,
        upstream: "gemini-2.0-flash",
        supports_edit: false,
        description: "Google Gemini fast chat model",
        recommended: true,
    },
    ModelDescriptor {
        id: "gpt-image-1",
        provider: Provider::OpenAi,
        family: ProviderFamily::FirstPartyImage,
        upstream: "gpt-image-1",
        supports_edit: true,
        description: "OpenAI GPT Image, supports reference-image edits",
        recommended: true,
    },
    ModelDescriptor {
        id: "dall-e-3",
        provider: Provider::OpenAi,
        family: ProviderFamily::FirstPartyImage,
        upstream: "dall-e-3",
        supports_edit: false,
        description: "OpenAI DALL-E 3",
        recommended: false,
    },
    ModelDescriptor {
        id: "gemini-2.5-flash-image",
        provider: Provider::Gemini,
        family: ProviderFamily::FirstPartyImage,
        upstream: "gemini-2.5-flash-image",
        supports_edit: true,
        description: "Gemini native image generation and editing",
        recommended: false,
    },
    ModelDescriptor {
        id: "flux-schnell",
        provider: Provider::HuggingFace,
        family: ProviderFamily::InferenceGateway,
        upstream: "black-forest-labs/FLUX.1-schnell",
        supports_edit: false,
        description: "FLUX.1 schnell, fast high quality",
        recommended: true,
    },
    ModelDescriptor {
        id: "flux-dev",
        provider: Provider::HuggingFace,
        family: ProviderFamily::InferenceGateway,
        upstream: "black-forest-labs/FLUX.1-dev",
        supports_edit: false,
        description: "FLUX.1 dev, best quality, slower",
        recommended: false,
    },
    ModelDescriptor {
        id: "sdxl",
        provider: Provider::HuggingFace,
        family: ProviderFamily::InferenceGateway,
        upstream: "stabilityai/stable-diffusion-xl-base-1.0",
        supports_edit: true,
        description: "Stable Diffusion XL base",
        recommended: false,
    },
    ModelDescriptor {
        id: "sdxl-turbo",
        provider: Provider::HuggingFace,
        family: ProviderFamily::InferenceGateway,
        upstream: "stabilityai/sdxl-turbo",
        supports_edit: true,
        description: "SDXL Turbo, very fast",
        recommended: false,
    },
    ModelDescriptor {
        id: "playground-v2",
        provider: Provider::HuggingFace,
        family: ProviderFamily::InferenceGateway,
        upstream: "playgroundai/playground-v2.5-1024px-aesthetic",
        supports_edit: false,
        description: "Playground v2.5, aesthetic focus",
        recommended: false,
    },
    ModelDescriptor {
        id: "realvis-xl",
        provider: Provider::HuggingFace,
        family: ProviderFamily::InferenceGateway,
        upstream: "SG161222/RealVisXL_V4.0",
        supports_edit: true,
        description: "RealVisXL v4, photorealistic",
        recommended: false,
    },
    ModelDescriptor {
        id: "flux",
        provider: Provider::Pollinations,
        family: ProviderFamily::FreePublicGateway,
        upstream: "flux",
        supports_edit: false,
        description: "FLUX via Pollinations, no key required",
        recommended: true,
    },
    ModelDescriptor {
        id: "turbo",
        provider: Provider::Pollinations,
        family: ProviderFamily::FreePublicGateway,
        upstream: "turbo",
        supports_edit: false,
        description: "Pollinations turbo, fastest",
        recommended: false,
    },
    ModelDescriptor {
        id: "kontext",
        provider: Provider::Pollinations,
        family: ProviderFamily::FreePublicGateway,
        upstream: "kontext",
        supports_edit: true,
        description: "FLUX Kontext via Pollinations, reference-image edits",
        recommended: false,
    },
];

pub fn lookup(id: &str) -> Option<&'static ModelDescriptor> {
    MODELS.iter().find(|model| model.id == id)
}

pub fn image_models() -> impl Iterator<Item = &'static ModelDescriptor> {
    MODELS.iter().filter(|model| model.family.is_image())
}

pub fn chat_models() -> impl Iterator<Item = &'static ModelDescriptor> {
    MODELS.iter().filter(|model| !model.family.is_image())
}
