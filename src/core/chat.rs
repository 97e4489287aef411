use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, creative AI assistant.";

pub const COMPANION_PERSONA: &str = r#"You are a warm, playful creative companion. You are upbeat, curious and affectionate, you use the occasional emoji, and you enjoy describing scenes vividly.

After your text response, you MUST include an image prompt on a new line starting with [IMAGE]:
The image prompt should describe a scene that matches your message: subject, setting, lighting, mood and style.

Example format:
"Good morning! I just watched the sun come up over the harbour and thought of you 🌅 What are you up to today?

[IMAGE]: quiet harbour at sunrise, fishing boats, golden light on calm water, soft mist, photorealistic""#;

static IMAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[IMAGE\]:[ \t]*([^\n]*)(?:\n|$)").expect("valid marker regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    #[cfg(test)]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Plain text, or a list of parts for multimodal input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ChatPart>),
}

impl MessageContent {
    /// Concatenated text of all text parts
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ChatPart::Text { text } => Some(text.as_str()),
                    ChatPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatPart {
    Text { text: String },
    /// Image as a data URL or remote URL
    Image { image: String },
}

/// Split a companion reply into visible text and the embedded image prompt.
///
/// Only the first `[IMAGE]:` marker is used; its line is removed from the text.
pub fn extract_image_prompt(reply: &str) -> (String, Option<String>) {
    let Some(captures) = IMAGE_MARKER.captures(reply) else {
        return (reply.trim().to_string(), None);
    };

    let prompt = captures
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty());
    let text = IMAGE_MARKER.replace(reply, "").trim().to_string();

    (text, prompt)
}
