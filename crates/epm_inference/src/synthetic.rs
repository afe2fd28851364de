//! Offline generators that stand in for the model when it cannot deliver.
//!
//! Everything here is infallible. Numeric fields are drawn from narrow,
//! plausible ranges; the `*_with` variants take the RNG explicitly.

use epm_core::{
    now_millis, BusinessValidation, Category, Competitor, Continent, CorporateProfile,
    CorporateRiskReport, MarketPulseReport, MetricTrend, Momentum, RiskAlert, SectorTrend,
    Severity, ShareOfVoice, SpecificMetric,
};
use rand::Rng;

const COMPETITORS: [(&str, &str, Momentum, f64, &str); 4] = [
    ("Alpha Industries", "USA", Momentum::Up, 32.0, "Launching new division"),
    ("Beta Corp", "Germany", Momentum::Stable, 28.0, "Quarterly earnings stable"),
    ("Gamma Tech", "Japan", Momentum::Down, 15.0, "Supply chain disruptions"),
    ("Delta Logistics", "Brazil", Momentum::Up, 12.0, "Expansion into Asia"),
];

const SHARE_OF_VOICE: [(&str, f64); 4] = [
    ("Market Leader", 45.0),
    ("Challenger A", 25.0),
    ("Challenger B", 15.0),
    ("Others", 15.0),
];

pub struct SyntheticAnalyst;

impl SyntheticAnalyst {
    /// Long-form markdown body for an article known only by title and summary.
    pub fn generate_report(title: &str, summary: &str, context: &str) -> String {
        format!(
            "# EPM SYSTEM REPORT: {upper}\n\
             **Source:** Synthetic Intelligence Node (Fallback Layer)\n\
             **Status:** Validated via {context}\n\
             \n\
             ## EXECUTIVE SUMMARY\n\
             {summary}\n\
             \n\
             ## ANALYSIS\n\
             Based on available metadata, this event represents a significant development in the sector. \
             Analysts suggest that the implications of \"{title}\" will be felt across immediate market cycles. \
             The core narrative revolves around:\n\
             - {summary}\n\
             - Broader implications for the region.\n\
             \n\
             ## STRATEGIC VIEW\n\
             While automated processing detected this event, manual verification is recommended for high-stakes \
             decision making. The data suggests a continuation of existing trends observed over the last quarter.\n\
             \n\
             ## CONCLUSION\n\
             Monitoring is advised. This report was generated by the EPM Failsafe Engine to ensure continuity \
             of intelligence during high-traffic periods.\n",
            upper = title.to_uppercase(),
            title = title,
            summary = summary,
            context = context,
        )
    }

    pub fn generate_risk_report(profile: &CorporateProfile) -> CorporateRiskReport {
        Self::generate_risk_report_with(profile, &mut rand::thread_rng())
    }

    /// Baseline assessment with one generic medium alert and a score in [20, 50).
    pub fn generate_risk_report_with<R: Rng + ?Sized>(
        profile: &CorporateProfile,
        rng: &mut R,
    ) -> CorporateRiskReport {
        CorporateRiskReport {
            overall_risk_score: f64::from(rng.gen_range(20u32..50)),
            sector_trend: SectorTrend::Stabilizing,
            active_alerts: vec![RiskAlert {
                id: "syn-1".to_string(),
                title: "General Sector Volatility".to_string(),
                severity: Severity::Medium,
                impact_analysis: "Standard market fluctuations detected.".to_string(),
                mitigation_suggestion: "Maintain diversified supply chain buffers.".to_string(),
            }],
            executive_brief: format!(
                "(Synthetic Mode) Due to high global query volume, we are providing a baseline assessment for {}. \
                 Standard operations appear stable, though routine monitoring of {} is advised.",
                profile.company_name, profile.sector
            ),
            last_updated: now_millis(),
        }
    }

    pub fn generate_market_pulse(category: Category, continent: Continent) -> MarketPulseReport {
        Self::generate_market_pulse_with(category, continent, &mut rand::thread_rng())
    }

    pub fn generate_market_pulse_with<R: Rng + ?Sized>(
        category: Category,
        continent: Continent,
        rng: &mut R,
    ) -> MarketPulseReport {
        let sentiment_score = f64::from(rng.gen_range(40u32..80));
        let strategic_action = if rng.gen_bool(0.5) { "BUY" } else { "HOLD" };
        let volatility_index = f64::from(rng.gen_range(20u32..70));

        MarketPulseReport {
            sector: category.to_string(),
            region: continent.to_string(),
            sentiment_score,
            share_of_voice: SHARE_OF_VOICE
                .iter()
                .map(|(name, value)| ShareOfVoice {
                    name: name.to_string(),
                    value: *value,
                })
                .collect(),
            competitors: COMPETITORS
                .iter()
                .map(|(name, hq, movement, share, activity)| Competitor {
                    name: name.to_string(),
                    movement: *movement,
                    market_share: *share,
                    recent_activity: activity.to_string(),
                    headquarters: Some(hq.to_string()),
                })
                .collect(),
            emerging_trend: "Digital integration in traditional workflows is accelerating globally."
                .to_string(),
            strategic_action: strategic_action.to_string(),
            volatility_index,
            specific_metrics: Self::placeholder_metrics(category),
        }
    }

    /// Example metric names used to steer a model towards figures that matter
    /// for `category`.
    pub fn category_metric_examples(category: Category) -> &'static str {
        match category {
            Category::Agribusiness => "Harvest Yield, Commodity Prices, Export Vol",
            Category::Marketing => "Ad Spend, CTR Trends, Social Sentiment",
            _ => "Revenue, Market Cap, Growth",
        }
    }

    /// Filled in when a live report omits its metrics.
    pub fn default_specific_metrics() -> Vec<SpecificMetric> {
        vec![
            metric("Market Volatility", "Medium", MetricTrend::Neutral),
            metric("Sector Growth", "+2.3%", MetricTrend::Up),
        ]
    }

    /// Returned when validation output is unusable.
    pub fn generate_business_validation() -> BusinessValidation {
        BusinessValidation {
            score: 50.0,
            analysis: "Service currently under high load.".to_string(),
            risks: vec!["Data unavailable".to_string()],
            opportunities: vec!["Manual verification required".to_string()],
            market_size_estimate: None,
            competitor_landscape: Vec::new(),
        }
    }

    fn placeholder_metrics(category: Category) -> Vec<SpecificMetric> {
        match category {
            Category::Agribusiness => vec![
                metric("Harvest Yield", "+4.5%", MetricTrend::Up),
                metric("Commodity Prices", "Stable", MetricTrend::Neutral),
            ],
            Category::Marketing => vec![
                metric("Ad Spend", "+4.5%", MetricTrend::Up),
                metric("CTR Trends", "Stable", MetricTrend::Neutral),
            ],
            _ => vec![
                metric("YoY Growth", "+4.5%", MetricTrend::Up),
                metric("Market Cap", "$1.2T", MetricTrend::Neutral),
            ],
        }
    }
}

fn metric(label: &str, value: &str, trend: MetricTrend) -> SpecificMetric {
    SpecificMetric {
        label: label.to_string(),
        value: value.to_string(),
        trend,
    }
}
