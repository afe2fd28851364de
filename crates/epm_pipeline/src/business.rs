use epm_core::{BusinessValidation, Language};
use epm_inference::json::{de, parse_structured};
use epm_inference::{GenerationOptions, SyntheticAnalyst};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::service::IntelligenceService;

pub const ANALYSIS_UNAVAILABLE: &str = "Analysis unavailable";
pub const MARKET_SIZE_UNKNOWN: &str = "N/A";

/// Every field is optional; whatever the model omits gets a neutral default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationPayload {
    #[serde(default, deserialize_with = "de::lenient")]
    score: f64,
    #[serde(default, deserialize_with = "de::optional")]
    analysis: Option<String>,
    #[serde(default, deserialize_with = "de::lenient")]
    risks: Vec<String>,
    #[serde(default, deserialize_with = "de::lenient")]
    opportunities: Vec<String>,
    #[serde(default, deserialize_with = "de::optional")]
    market_size_estimate: Option<String>,
    #[serde(default, deserialize_with = "de::lenient")]
    competitor_landscape: Vec<String>,
}

impl From<ValidationPayload> for BusinessValidation {
    fn from(payload: ValidationPayload) -> Self {
        BusinessValidation {
            score: payload.score.clamp(0.0, 100.0),
            analysis: payload
                .analysis
                .unwrap_or_else(|| ANALYSIS_UNAVAILABLE.to_string()),
            risks: payload.risks,
            opportunities: payload.opportunities,
            market_size_estimate: Some(
                payload
                    .market_size_estimate
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| MARKET_SIZE_UNKNOWN.to_string()),
            ),
            competitor_landscape: payload.competitor_landscape,
        }
    }
}

pub fn validation_prompt(idea: &str, region: &str, language: Language) -> String {
    format!(
        "ROLE: Venture Analyst.\n\
         TASK: Validate this business idea: \"{idea}\" for the \"{region}\" market.\n\
         Output strictly in {language}.\n\
         RETURN JSON: {{ \"score\": number (0-100), \"analysis\": string, \"risks\": [string], \
         \"opportunities\": [string], \"marketSizeEstimate\": string, \"competitorLandscape\": [string] }}",
        idea = idea.trim(),
        region = region.trim(),
        language = language.prompt_name(),
    )
}

fn validation_cache_key(idea: &str, region: &str, language: Language) -> String {
    let digest = Sha256::digest(format!("{}\u{0}{}", idea.trim(), region.trim()).as_bytes());
    let short: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("validation_{}_{}", language, short)
}

impl IntelligenceService {
    pub async fn validate_business_idea(
        &self,
        idea: &str,
        region: &str,
        language: Language,
    ) -> BusinessValidation {
        let key = validation_cache_key(idea, region, language);
        if let Some(cached) = self.cache.get::<BusinessValidation>(&key).await {
            debug!(%key, "Serving validation from cache");
            return cached;
        }

        let response = self
            .handler
            .request(
                &validation_prompt(idea, region, language),
                GenerationOptions::json(),
                Some(&self.config.analyst_model),
            )
            .await;

        let payload = if response.is_synthetic() {
            None
        } else {
            parse_structured::<ValidationPayload>(&response.text)
        };
        match payload {
            Some(payload) => {
                let validation = BusinessValidation::from(payload);
                self.cache.set(&key, &validation).await;
                validation
            }
            None => {
                warn!(region, "Validation unavailable, using placeholder result");
                SyntheticAnalyst::generate_business_validation()
            }
        }
    }
}
