use async_trait::async_trait;
use epm_core::Result;
use futures_util::Stream;
use std::fmt;
use std::pin::Pin;

pub mod dummy;
pub mod gemini;

/// Incremental text deltas of a streamed reply.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Bias the model towards a bare JSON document.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationOptions {
    pub response_format: ResponseFormat,
    /// Let the model ground its answer with web search.
    pub web_search: bool,
}

impl GenerationOptions {
    pub fn json() -> Self {
        Self {
            response_format: ResponseFormat::Json,
            web_search: false,
        }
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOptions {
    pub model: String,
    pub system_instruction: String,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// One-shot generation against `request.model`.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Opens a stateful conversation bound to one model and system instruction.
    async fn open_chat(&self, options: &ChatOptions) -> Result<Box<dyn ChatSession>>;
}

#[async_trait]
pub trait ChatSession: Send {
    /// Sends a user message and streams the reply. The session remembers the
    /// exchange for later turns.
    async fn send_stream(&mut self, message: &str) -> Result<TextStream>;
}
