pub mod chat;
pub mod error;
pub mod fanout;
pub mod image;
pub mod models;
pub mod params;
pub mod prompt;
pub mod selection;
pub mod studio;

pub use chat::{ChatMessage, ChatPart, MessageContent, Role};
pub use error::StudioError;
pub use image::InlineImage;
pub use models::{ModelDescriptor, Provider};
pub use params::GenerationRequest;
pub use selection::Availability;
pub use studio::{CompanionRequest, GenerationResult, Mode, Studio};
