use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::models::{GenerationOptions, GenerationRequest, GenerativeModel};
use crate::InferenceConfig;

/// Neutral "no data" document returned when both model layers are down.
pub const SYNTHETIC_STUB: &str = r#"{"articles":[],"error":"Quota Exceeded - Switched to Synthetic"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Primary,
    Secondary,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayeredResponse {
    pub text: String,
    pub layer: Layer,
}

impl LayeredResponse {
    pub fn is_synthetic(&self) -> bool {
        self.layer == Layer::Synthetic
    }

    fn stub() -> Self {
        Self {
            text: SYNTHETIC_STUB.to_string(),
            layer: Layer::Synthetic,
        }
    }
}

/// Runs a prompt against the primary model, then the fallback model, then
/// gives up with [`SYNTHETIC_STUB`]. Each layer is tried once.
#[derive(Debug, Clone)]
pub struct LayeredRequestHandler {
    model: Arc<dyn GenerativeModel>,
    primary_model: String,
    fallback_model: String,
    timeout: Duration,
}

impl LayeredRequestHandler {
    pub fn new(model: Arc<dyn GenerativeModel>, config: &InferenceConfig) -> Self {
        Self {
            model,
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
            timeout: config.request_timeout,
        }
    }

    pub fn model(&self) -> &Arc<dyn GenerativeModel> {
        &self.model
    }

    /// Never fails. `model_override` replaces the layer-1 model only.
    pub async fn request(
        &self,
        prompt: &str,
        options: GenerationOptions,
        model_override: Option<&str>,
    ) -> LayeredResponse {
        let primary = model_override.unwrap_or(&self.primary_model);
        let layers = [(Layer::Primary, primary), (Layer::Secondary, self.fallback_model.as_str())];

        for (layer, model_id) in layers {
            let request = GenerationRequest::new(model_id, prompt, options);
            match tokio::time::timeout(self.timeout, self.model.generate(&request)).await {
                Ok(Ok(response)) => {
                    debug!(?layer, model = model_id, "AI request served");
                    return LayeredResponse {
                        text: response.text,
                        layer,
                    };
                }
                Ok(Err(e)) => {
                    warn!(?layer, model = model_id, error = %e, "AI layer failed, falling through");
                }
                Err(_) => {
                    warn!(?layer, model = model_id, timeout = ?self.timeout, "AI layer timed out, falling through");
                }
            }
        }

        warn!("Engaging synthetic layer");
        LayeredResponse::stub()
    }
}
