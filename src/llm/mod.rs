// Generation client layer
//
// Every agent talks to the hosted model through the `TextGenerator` trait.
// The HTTP implementation lives in `client`, a scripted stand-in for tests
// lives in `mock`.

pub mod client;
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::OpenAiCompatClient;
pub use mock::{StubGenerator, StubReply};

/// Errors raised by a generation backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("generation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation service returned an empty response")]
    EmptyResponse,

    #[error("could not decode generation response: {0}")]
    Decode(String),

    #[error("unsupported generation request: {0}")]
    Unsupported(String),
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// What kind of artifact the caller wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modality {
    #[default]
    Text,
    Image,
}

/// Sampling parameters for a single call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub modality: Modality,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            modality: Modality::Text,
        }
    }
}

/// A prompt ready to be sent to the model
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub params: GenerationParams,
}

impl GenerationRequest {
    /// Single user turn with default parameters
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            messages: vec![Message::user(prompt)],
            params: GenerationParams::default(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.params.max_tokens = max_tokens;
        self
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.params.modality = modality;
        self
    }

    /// The last user message, which carries the rendered prompt
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Output of a generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Text(String),
    Image { mime_type: String, bytes: Vec<u8> },
}

impl Generation {
    /// Returns the text body, treating an image as a decode failure
    pub fn into_text(self) -> GenerationResult<String> {
        match self {
            Generation::Text(text) if text.trim().is_empty() => Err(GenerationError::EmptyResponse),
            Generation::Text(text) => Ok(text),
            Generation::Image { .. } => Err(GenerationError::Decode(
                "expected text, received image".to_string(),
            )),
        }
    }
}

/// A backend able to turn prompts into text or images.
///
/// Implementations must be safe to share between concurrently running
/// agents.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult<Generation>;
}
