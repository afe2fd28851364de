use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Declares a closed set of labels that travel as plain strings.
///
/// Parsing is case-insensitive and also accepts the variant name with spaces,
/// dashes or underscores removed. Deserialization never fails on an unknown
/// label: it maps to the enum's default, so a single odd value coming back
/// from a model does not invalidate the surrounding document.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident, {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim();
                let compact = wanted.replace([' ', '_', '-'], "");
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| {
                        v.as_str().eq_ignore_ascii_case(wanted)
                            || format!("{:?}", v).eq_ignore_ascii_case(&compact)
                    })
                    .ok_or_else(|| {
                        Error::InvalidValue(format!("unknown {} '{}'", stringify!($name), s))
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok(raw.parse().unwrap_or_default())
            }
        }
    };
}

wire_enum!(Continent, default = Global, {
    Global => "Global",
    Africa => "Africa",
    Asia => "Asia",
    Europe => "Europe",
    NorthAmerica => "North America",
    SouthAmerica => "South America",
    Oceania => "Oceania",
});

wire_enum!(Category, default = Global, {
    Global => "Global",
    Business => "Business",
    Technology => "Technology",
    Economy => "Economy",
    Politics => "Politics",
    Health => "Health",
    Culture => "Culture",
    MarketSentiment => "Market Sentiment",
    Sports => "Sports",
    Agribusiness => "Agribusiness",
    Travel => "Travel",
    Marketing => "Marketing",
});

wire_enum!(Language, default = En, {
    En => "en",
    Pt => "pt",
    Es => "es",
    Fr => "fr",
    De => "de",
});

wire_enum!(TimeRange, default = Today, {
    Today => "24h",
    Week => "7d",
    Month => "30d",
});

wire_enum!(Sentiment, default = Neutral, {
    Positive => "positive",
    Negative => "negative",
    Neutral => "neutral",
});

wire_enum!(
    /// Direction a competitor is moving in.
    Momentum, default = Stable, {
        Up => "up",
        Down => "down",
        Stable => "stable",
    }
);

wire_enum!(MetricTrend, default = Neutral, {
    Up => "up",
    Down => "down",
    Neutral => "neutral",
});

wire_enum!(Severity, default = Medium, {
    Critical => "CRITICAL",
    High => "HIGH",
    Medium => "MEDIUM",
    Low => "LOW",
});

wire_enum!(SectorTrend, default = Stabilizing, {
    Stabilizing => "Stabilizing",
    Volatile => "Volatile",
    Collapsing => "Collapsing",
    Booming => "Booming",
});

wire_enum!(BroadcastType, default = Live, {
    Live => "LIVE",
    Replay => "REPLAY",
});

impl Language {
    /// Name used when instructing a model which language to answer in.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Pt => "Portuguese (Português)",
            Language::Es => "Spanish (Español)",
            Language::Fr => "French (Français)",
            Language::De => "German (Deutsch)",
        }
    }

    /// Google News edition parameters as `(hl, gl, ceid)`.
    pub fn news_locale(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Language::En => ("en-US", "US", "US:en"),
            Language::Pt => ("pt-BR", "BR", "BR:pt-419"),
            Language::Es => ("es-419", "MX", "MX:es-419"),
            Language::Fr => ("fr-FR", "FR", "FR:fr"),
            Language::De => ("de-DE", "DE", "DE:de"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    pub continent: Continent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "timestamp")]
    pub published_at: DateTime<Utc>,
    pub image_url: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub forecasts: Vec<String>,
    /// When the pipeline produced this article (epoch ms).
    #[serde(rename = "fetchTimestamp")]
    pub fetched_at: i64,
}

/// Filter selection for one page of the news feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsQuery {
    #[serde(default)]
    pub continent: Continent,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl NewsQuery {
    pub fn new(continent: Continent, category: Category, language: Language) -> Self {
        Self {
            continent,
            category,
            language,
            time_range: TimeRange::default(),
            offset: 0,
            sub_category: None,
            country: None,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_sub_category(mut self, sub_category: impl Into<String>) -> Self {
        self.sub_category = Some(sub_category.into());
        self
    }

    pub fn cache_key(&self) -> String {
        format!(
            "news_v19_{}_{}_{}_{}_{}_{}_{}",
            self.continent,
            self.category,
            self.language,
            self.time_range,
            self.offset,
            non_empty(&self.country).unwrap_or("all"),
            non_empty(&self.sub_category).unwrap_or("none"),
        )
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareOfVoice {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub name: String,
    pub movement: Momentum,
    pub market_share: f64,
    pub recent_activity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headquarters: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificMetric {
    pub label: String,
    pub value: String,
    pub trend: MetricTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPulseReport {
    pub sector: String,
    pub region: String,
    /// 0-100.
    pub sentiment_score: f64,
    pub share_of_voice: Vec<ShareOfVoice>,
    pub competitors: Vec<Competitor>,
    pub emerging_trend: String,
    /// Free-form recommendation such as "BUY", "HOLD" or a translated label.
    pub strategic_action: String,
    /// 0-100.
    pub volatility_index: f64,
    pub specific_metrics: Vec<SpecificMetric>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorporateProfile {
    pub company_name: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub key_locations: Vec<String>,
    #[serde(default)]
    pub supply_chain_focus: String,
}

impl CorporateProfile {
    pub fn new(company_name: impl Into<String>, sector: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            sector: sector.into(),
            key_locations: Vec::new(),
            supply_chain_focus: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAlert {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub impact_analysis: String,
    pub mitigation_suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorporateRiskReport {
    /// 0-100.
    pub overall_risk_score: f64,
    pub sector_trend: SectorTrend,
    pub active_alerts: Vec<RiskAlert>,
    pub executive_brief: String,
    /// Epoch ms.
    pub last_updated: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessValidation {
    pub score: f64,
    pub analysis: String,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_size_estimate: Option<String>,
    #[serde(default)]
    pub competitor_landscape: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastProgram {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub continent: Continent,
    #[serde(rename = "type")]
    pub kind: BroadcastType,
    pub thumbnail: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}
