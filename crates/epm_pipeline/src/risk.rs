use epm_core::{
    now_millis, CorporateProfile, CorporateRiskReport, Language, RiskAlert, SectorTrend, Severity,
};
use epm_inference::json::{de, parse_structured};
use epm_inference::{GenerationOptions, SyntheticAnalyst};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::service::IntelligenceService;

/// `overallRiskScore` must be a JSON number; anything else is rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiskPayload {
    overall_risk_score: f64,
    #[serde(default)]
    sector_trend: SectorTrend,
    #[serde(default, deserialize_with = "de::lenient")]
    executive_brief: String,
    #[serde(default, deserialize_with = "de::lenient")]
    active_alerts: Vec<AlertPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertPayload {
    #[serde(default, deserialize_with = "de::optional")]
    id: Option<String>,
    #[serde(default, deserialize_with = "de::lenient")]
    title: String,
    #[serde(default)]
    severity: Severity,
    #[serde(default, deserialize_with = "de::lenient")]
    impact_analysis: String,
    #[serde(default, deserialize_with = "de::lenient")]
    mitigation_suggestion: String,
}

impl RiskPayload {
    fn into_report(self) -> CorporateRiskReport {
        CorporateRiskReport {
            overall_risk_score: self.overall_risk_score.clamp(0.0, 100.0),
            sector_trend: self.sector_trend,
            active_alerts: self
                .active_alerts
                .into_iter()
                .enumerate()
                .map(|(idx, alert)| RiskAlert {
                    id: alert.id.unwrap_or_else(|| format!("alert-{}", idx + 1)),
                    title: alert.title,
                    severity: alert.severity,
                    impact_analysis: alert.impact_analysis,
                    mitigation_suggestion: alert.mitigation_suggestion,
                })
                .collect(),
            executive_brief: self.executive_brief,
            last_updated: now_millis(),
        }
    }
}

pub fn risk_prompt(profile: &CorporateProfile, language: Language) -> String {
    let mut context = String::new();
    if !profile.key_locations.is_empty() {
        context.push_str(&format!("Key locations: {}.\n", profile.key_locations.join(", ")));
    }
    if !profile.supply_chain_focus.trim().is_empty() {
        context.push_str(&format!("Supply chain focus: {}.\n", profile.supply_chain_focus));
    }
    format!(
        "Act as a Corporate Risk Analyst. Language: {language}.\n\
         Assess {company} ({sector}) using current news.\n\
         {context}\
         Output strictly JSON: {{ \"overallRiskScore\": number (0-100), \
         \"sectorTrend\": \"Stabilizing|Volatile|Collapsing|Booming\", \"executiveBrief\": string, \
         \"activeAlerts\": [{{ \"id\": string, \"title\": string, \"severity\": \"CRITICAL|HIGH|MEDIUM|LOW\", \
         \"impactAnalysis\": string, \"mitigationSuggestion\": string }}] }}",
        language = language.prompt_name(),
        company = profile.company_name,
        sector = profile.sector,
    )
}

fn risk_cache_key(profile: &CorporateProfile, language: Language) -> String {
    let mut hasher = Sha256::new();
    hasher.update(profile.company_name.trim().to_lowercase());
    hasher.update([0u8]);
    hasher.update(profile.sector.trim().to_lowercase());
    hasher.update([0u8]);
    hasher.update(profile.key_locations.join("|"));
    hasher.update([0u8]);
    hasher.update(&profile.supply_chain_focus);
    let digest = hasher.finalize();
    let short: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("risk_{}_{}", language, short)
}

impl IntelligenceService {
    /// Risk assessment for one company, grounded with web search.
    pub async fn calculate_corporate_risk(
        &self,
        profile: &CorporateProfile,
        language: Language,
    ) -> CorporateRiskReport {
        let key = risk_cache_key(profile, language);
        if let Some(cached) = self.cache.get::<CorporateRiskReport>(&key).await {
            debug!(%key, "Serving risk report from cache");
            return cached;
        }

        let options = GenerationOptions::json().with_web_search();
        let response = self
            .handler
            .request(&risk_prompt(profile, language), options, Some(&self.config.analyst_model))
            .await;

        let payload = if response.is_synthetic() {
            None
        } else {
            parse_structured::<RiskPayload>(&response.text)
        };
        match payload {
            Some(payload) => {
                let report = payload.into_report();
                self.cache.set(&key, &report).await;
                report
            }
            None => {
                warn!(company = %profile.company_name, "Risk payload unusable, using synthetic report");
                SyntheticAnalyst::generate_risk_report(profile)
            }
        }
    }
}
