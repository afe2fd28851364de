use epm_core::{
    Category, Competitor, Continent, Language, MarketPulseReport, Momentum, ShareOfVoice,
    SpecificMetric,
};
use epm_inference::json::{de, parse_structured};
use epm_inference::{GenerationOptions, SyntheticAnalyst};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::service::IntelligenceService;

/// `shareOfVoice` and `competitors` are required; a report without them is
/// replaced wholesale by the synthetic one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PulsePayload {
    #[serde(default, deserialize_with = "de::optional")]
    sector: Option<String>,
    #[serde(default, deserialize_with = "de::optional")]
    region: Option<String>,
    #[serde(default, deserialize_with = "de::lenient")]
    sentiment_score: f64,
    share_of_voice: Vec<SharePayload>,
    competitors: Vec<CompetitorPayload>,
    #[serde(default, deserialize_with = "de::lenient")]
    emerging_trend: String,
    #[serde(default, deserialize_with = "de::lenient")]
    strategic_action: String,
    #[serde(default, deserialize_with = "de::lenient")]
    volatility_index: f64,
    #[serde(default, deserialize_with = "de::optional")]
    specific_metrics: Option<Vec<SpecificMetric>>,
}

#[derive(Debug, Deserialize)]
struct SharePayload {
    name: String,
    #[serde(default, deserialize_with = "de::lenient")]
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompetitorPayload {
    name: String,
    #[serde(default)]
    movement: Momentum,
    #[serde(default, deserialize_with = "de::lenient")]
    market_share: f64,
    #[serde(default, deserialize_with = "de::lenient")]
    recent_activity: String,
    #[serde(default, deserialize_with = "de::optional")]
    headquarters: Option<String>,
}

impl PulsePayload {
    fn into_report(self, category: Category, continent: Continent) -> MarketPulseReport {
        MarketPulseReport {
            sector: self.sector.unwrap_or_else(|| category.to_string()),
            region: self.region.unwrap_or_else(|| continent.to_string()),
            sentiment_score: self.sentiment_score.clamp(0.0, 100.0),
            share_of_voice: self
                .share_of_voice
                .into_iter()
                .map(|s| ShareOfVoice {
                    name: s.name,
                    value: s.value,
                })
                .collect(),
            competitors: self
                .competitors
                .into_iter()
                .map(|c| Competitor {
                    name: c.name,
                    movement: c.movement,
                    market_share: c.market_share,
                    recent_activity: c.recent_activity,
                    headquarters: c.headquarters,
                })
                .collect(),
            emerging_trend: self.emerging_trend,
            strategic_action: self.strategic_action,
            volatility_index: self.volatility_index.clamp(0.0, 100.0),
            specific_metrics: self
                .specific_metrics
                .unwrap_or_else(SyntheticAnalyst::default_specific_metrics),
        }
    }
}

pub fn market_pulse_prompt(
    continent: Continent,
    category: Category,
    language: Language,
    sub_category: Option<&str>,
) -> String {
    let language = language.prompt_name();
    let focus = sub_category.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("General");
    let metrics = SyntheticAnalyst::category_metric_examples(category);

    format!(
        "ROLE: Senior Financial Analyst & Industry Specialist.\n\
         TASK: Generate a detailed Market Pulse Report for the \"{category}\" sector (Focus: {focus}) in \"{continent}\".\n\
         LANGUAGE: Strictly {language}. All text must be in {language}.\n\
         \n\
         REQUIREMENTS:\n\
         1. List TOP COMPANIES specifically for {continent}.\n\
         2. Generate 4 key \"specificMetrics\" relevant to {category} (e.g. {metrics}).\n\
         \n\
         RETURN JSON:\n\
         {{\n\
             \"sector\": \"{category}\",\n\
             \"region\": \"{continent}\",\n\
             \"sentimentScore\": number (0-100),\n\
             \"shareOfVoice\": [{{\"name\": \"Company A\", \"value\": 40}}, ...],\n\
             \"competitors\": [{{\"name\": \"Company A\", \"movement\": \"up|down|stable\", \"marketShare\": 40, \"recentActivity\": \"...\", \"headquarters\": \"Country\"}}],\n\
             \"emergingTrend\": \"Short description of a trend in {language}\",\n\
             \"strategicAction\": \"Buy|Sell|Hold|Pivot (translated)\",\n\
             \"volatilityIndex\": number (0-100),\n\
             \"specificMetrics\": [{{\"label\": \"Metric Name\", \"value\": \"Value\", \"trend\": \"up|down|neutral\"}}]\n\
         }}"
    )
}

impl IntelligenceService {
    pub async fn fetch_market_pulse(
        &self,
        continent: Continent,
        category: Category,
        language: Language,
        sub_category: Option<&str>,
    ) -> MarketPulseReport {
        let key = format!(
            "pulse_{}_{}_{}_{}",
            continent,
            category,
            language,
            sub_category.unwrap_or("none")
        );
        if let Some(cached) = self.cache.get::<MarketPulseReport>(&key).await {
            debug!(%key, "Serving market pulse from cache");
            return cached;
        }

        let prompt = market_pulse_prompt(continent, category, language, sub_category);
        let response = self
            .handler
            .request(&prompt, GenerationOptions::json(), Some(&self.config.analyst_model))
            .await;

        let payload = if response.is_synthetic() {
            None
        } else {
            parse_structured::<PulsePayload>(&response.text)
        };
        match payload {
            Some(payload) => {
                let report = payload.into_report(category, continent);
                self.cache.set(&key, &report).await;
                report
            }
            None => {
                warn!(%category, %continent, "Invalid market pulse structure, using synthetic report");
                SyntheticAnalyst::generate_market_pulse(category, continent)
            }
        }
    }
}
