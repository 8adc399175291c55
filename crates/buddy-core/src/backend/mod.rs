// ABOUTME: Backend trait defining how buddy reaches a generative model API
// ABOUTME: Request contents, declared tools and the event stream every backend emits

mod gemini;

pub use gemini::{GeminiBackend, GeminiConfig};

use crate::error::Result;
use crate::models::{GroundingSource, InlineImage};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

/// Who produced a piece of conversation content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRole {
    User,
    Model,
}

impl ContentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentRole::User => "user",
            ContentRole::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Base64 payload with its mime type
    InlineData { mime_type: String, data: String },
}

/// One role-tagged entry of the request contents
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: ContentRole,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// All text parts, concatenated
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect()
    }
}

/// Capabilities declared to the model. The two modes never mix.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSet {
    /// Callable function declarations (JSON array)
    Functions(Value),
    WebSearch,
    None,
}

/// Everything a backend needs for one turn
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    /// Ordered, role-tagged contents; the last entry is the new user turn
    pub contents: Vec<Content>,
    pub tools: ToolSet,
}

/// Events emitted by backends during response generation
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Text chunk from the model
    Text(String),
    /// Model asks the client to run a declared function
    FunctionCall { name: String, args: Value },
    /// Web citations backing the answer
    Grounding(Vec<GroundingSource>),
    /// Response complete
    Done,
    /// Error occurred
    Error(String),
}

/// A backend is an adapter for one generative API.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Unique name for this backend
    fn name(&self) -> &'static str;

    /// Send a request and receive a stream of events. A non-streaming API
    /// yields its whole answer as one `Text` event before `Done`.
    async fn generate(&self, request: GenerationRequest)
        -> Result<BoxStream<'static, BackendEvent>>;

    /// Render an image for the infographic tool
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<InlineImage>;
}
