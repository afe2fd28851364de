use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use epm_core::{Error, Result};

pub mod handler;
pub mod json;
pub mod models;
pub mod synthetic;

pub use handler::{Layer, LayeredRequestHandler, LayeredResponse, SYNTHETIC_STUB};
pub use models::dummy::DummyModel;
pub use models::gemini::GeminiModel;
pub use models::{
    ChatOptions, ChatSession, GenerationOptions, GenerationRequest, GenerationResponse,
    GenerativeModel, ResponseFormat, TextStream,
};
pub use synthetic::SyntheticAnalyst;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PRIMARY_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_ANALYST_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.0-flash-lite-preview-02-05";

#[derive(Clone)]
pub struct InferenceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Layer-1 model for discovery and chat.
    pub primary_model: String,
    /// Layer-1 model for the analyst features (market pulse, risk, validation).
    pub analyst_model: String,
    /// Layer-2 model, shared by every feature.
    pub fallback_model: String,
    pub chat_model: String,
    /// Upper bound for a single layer attempt.
    pub request_timeout: Duration,
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("primary_model", &self.primary_model)
            .field("analyst_model", &self.analyst_model)
            .field("fallback_model", &self.fallback_model)
            .field("chat_model", &self.chat_model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            analyst_model: DEFAULT_ANALYST_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            chat_model: DEFAULT_PRIMARY_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl InferenceConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = env_var("GEMINI_API_KEY").or_else(|| env_var("API_KEY"));
        if let Some(url) = env_var("EPM_GEMINI_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = env_var("EPM_PRIMARY_MODEL") {
            config.chat_model = model.clone();
            config.primary_model = model;
        }
        if let Some(model) = env_var("EPM_ANALYST_MODEL") {
            config.analyst_model = model;
        }
        if let Some(model) = env_var("EPM_FALLBACK_MODEL") {
            config.fallback_model = model;
        }
        if let Some(secs) = env_var("EPM_REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Builds a model by name: `gemini` or `dummy` (offline, every call fails).
pub fn create_model(kind: &str, config: &InferenceConfig) -> Result<Arc<dyn GenerativeModel>> {
    match kind {
        "gemini" => Ok(Arc::new(
            GeminiModel::new(config.api_key.clone())?.with_base_url(&config.base_url),
        )),
        "dummy" => Ok(Arc::new(DummyModel::new())),
        other => Err(Error::Inference(format!(
            "Unknown model '{}'. Available models: gemini, dummy",
            other
        ))),
    }
}

pub mod prelude {
    pub use super::create_model;
    pub use super::{InferenceConfig, LayeredRequestHandler, SyntheticAnalyst};
    pub use epm_core::{Error, Result};
}
