use chrono::Utc;
use epm_core::{now_millis, Article, Continent, Language, NewsQuery, Sentiment, TimeRange};
use epm_feeds::FeedRequest;
use epm_inference::json::{de, parse_structured};
use epm_inference::{GenerationOptions, SyntheticAnalyst};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::service::IntelligenceService;

/// Items requested from the model per page.
pub const DISCOVERY_BATCH: usize = 4;
pub const DEFAULT_AI_AUTHOR: &str = "EPM Intelligence";

#[derive(Debug, Deserialize)]
struct DiscoveryPayload {
    /// Items are decoded one by one; see [`DiscoveryPayload::items`].
    articles: Vec<Value>,
}

impl DiscoveryPayload {
    /// Usable items. Malformed or untitled entries are dropped individually.
    fn items(self) -> Vec<DiscoveredItem> {
        self.articles
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<DiscoveredItem>(raw) {
                Ok(item) if !item.title.trim().is_empty() => Some(item),
                Ok(_) => None,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed discovered item");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveredItem {
    #[serde(default, deserialize_with = "de::lenient")]
    title: String,
    #[serde(default, deserialize_with = "de::lenient")]
    summary: String,
    #[serde(default, deserialize_with = "de::optional")]
    source_url: Option<String>,
    #[serde(default, deserialize_with = "de::lenient")]
    sentiment: Sentiment,
    #[serde(default, deserialize_with = "de::optional")]
    author: Option<String>,
}

fn time_window(range: TimeRange) -> &'static str {
    match range {
        TimeRange::Today => "the last 24 hours",
        TimeRange::Week => "the last 7 days",
        TimeRange::Month => "the last 30 days",
    }
}

/// The page offset is not part of the prompt; it only keys the cache and
/// slices the RSS fallback.
pub fn discovery_prompt(query: &NewsQuery) -> String {
    let focus = match query.sub_category.as_deref().map(str::trim) {
        Some(sub) if !sub.is_empty() => sub.to_string(),
        _ => format!("major {} news", query.category),
    };
    let location = match query.country.as_deref().map(str::trim) {
        Some(country) if !country.is_empty() => country.to_string(),
        _ if query.continent == Continent::Global => "the world".to_string(),
        _ => query.continent.to_string(),
    };
    let language = query.language.prompt_name();

    format!(
        "ROLE: Elite Multilingual Journalist.\n\
         TASK: Find {batch} recent, real news items for \"{focus}\" in \"{location}\", published within {window}.\n\
         \n\
         CRITICAL INSTRUCTION: The 'title' and 'summary' MUST be in {language}. \
         Do not output English unless the requested language is English.\n\
         \n\
         FORMAT: JSON object.\n\
         {{ \"articles\": [{{ \"title\": \"...\", \"summary\": \"...\", \"sourceUrl\": \"...\", \"sentiment\": \"positive|negative|neutral\" }}] }}",
        batch = DISCOVERY_BATCH,
        window = time_window(query.time_range),
    )
}

impl IntelligenceService {
    /// One page of the news feed: cache, then model discovery, then RSS.
    pub async fn fetch_news(&self, query: &NewsQuery) -> Vec<Article> {
        let key = query.cache_key();
        if let Some(cached) = self.cache.get::<Vec<Article>>(&key).await {
            debug!(%key, "Serving news from cache");
            return cached;
        }

        let discovered = self.discover_news(query).await;
        if !discovered.is_empty() {
            info!(count = discovered.len(), "📰 AI discovery delivered articles");
            self.cache.set(&key, &discovered).await;
            return discovered;
        }

        let request = FeedRequest::new(query.continent, query.category, query.language)
            .with_offset(query.offset)
            .with_country(query.country.clone());
        let fallback = self.rss.fetch(&request).await;
        if fallback.is_empty() {
            warn!(%key, "No articles from AI discovery or RSS fallback");
        } else {
            info!(count = fallback.len(), "📡 Serving RSS fallback articles");
            self.cache.set(&key, &fallback).await;
        }
        fallback
    }

    /// Free-text search. Goes straight to the RSS feed.
    pub async fn search_news(&self, query: &str, language: Language, offset: usize) -> Vec<Article> {
        self.rss.fetch(&FeedRequest::search(query, language, offset)).await
    }

    async fn discover_news(&self, query: &NewsQuery) -> Vec<Article> {
        let options = GenerationOptions::json().with_web_search();
        let response = self
            .handler
            .request(&discovery_prompt(query), options, None)
            .await;
        if response.is_synthetic() {
            return Vec::new();
        }
        let Some(payload) = parse_structured::<DiscoveryPayload>(&response.text) else {
            warn!(layer = ?response.layer, "Discarding malformed discovery response");
            return Vec::new();
        };

        let now_ms = now_millis();
        let enrich = payload
            .items()
            .into_iter()
            .enumerate()
            .map(|(idx, item)| self.enrich_discovered(item, idx + query.offset, query, now_ms));
        join_all(enrich).await
    }

    async fn enrich_discovered(
        &self,
        item: DiscoveredItem,
        position: usize,
        query: &NewsQuery,
        now_ms: i64,
    ) -> Article {
        let image_url = self.image_for(&item.title).await;
        let content = SyntheticAnalyst::generate_report(&item.title, &item.summary, "AI Discovery");
        Article {
            id: format!("ai-{}-{}", now_ms, position),
            title: item.title,
            summary: item.summary,
            content,
            category: query.category,
            sub_category: query.sub_category.clone(),
            continent: query.continent,
            country: query.country.clone(),
            published_at: Utc::now(),
            image_url,
            author: item
                .author
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_AI_AUTHOR.to_string()),
            source_url: item.source_url,
            sentiment: item.sentiment,
            pros: Vec::new(),
            cons: Vec::new(),
            forecasts: Vec::new(),
            fetched_at: now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{self, BrokenImages, PRIMARY};
    use axum::routing::get;
    use axum::{Json, Router};
    use epm_core::Category;
    use epm_inference::DummyModel;
    use epm_storage::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    const DISCOVERY: &str = r#"```json
{"articles": [
  {"title": "Chipmakers rally", "summary": "Demand for accelerators grows.", "sourceUrl": "https://a.example.com", "sentiment": "positive"},
  {"title": "Ports congested", "summary": "Delays mount.", "sentiment": "bearish"}
]}
```"#;

    async fn bridge() -> Json<serde_json::Value> {
        let items: Vec<_> = (0..8)
            .map(|i| {
                json!({
                    "title": format!("Wire story {} shows growth", i),
                    "description": "<p>Details</p>",
                    "pubDate": "2024-05-01 08:00:00",
                    "link": format!("https://wire.example.com/{}", i),
                })
            })
            .collect();
        Json(json!({"status": "ok", "items": items}))
    }

    async fn bridge_url() -> String {
        let base = testing::spawn_server(Router::new().route("/api.json", get(bridge))).await;
        format!("{}/api.json", base)
    }

    #[test]
    fn test_prompt_embeds_filters_but_not_offset() {
        let query = NewsQuery::new(Continent::Europe, Category::Technology, Language::Pt)
            .with_offset(8)
            .with_country("Portugal")
            .with_time_range(TimeRange::Week);
        let prompt = discovery_prompt(&query);
        assert!(prompt.contains("major Technology news"));
        assert!(prompt.contains("\"Portugal\""));
        assert!(prompt.contains("Portuguese (Português)"));
        assert!(prompt.contains("the last 7 days"));
        assert!(!prompt.contains('8'));

        let global = discovery_prompt(&NewsQuery::new(Continent::Global, Category::Business, Language::En));
        assert!(global.contains("\"the world\""));
    }

    #[tokio::test]
    async fn test_ai_discovery_is_enriched_and_cached() {
        let (service, model, _) = testing::service(DummyModel::new().reply(PRIMARY, DISCOVERY));
        let query = NewsQuery::new(Continent::Asia, Category::Technology, Language::En).with_offset(4);

        let articles = service.fetch_news(&query).await;
        assert_eq!(articles.len(), 2);
        assert!(articles[0].id.starts_with("ai-"));
        assert!(articles[0].id.ends_with("-4"));
        assert!(articles[1].id.ends_with("-5"));
        assert_eq!(articles[0].sentiment, Sentiment::Positive);
        assert_eq!(articles[1].sentiment, Sentiment::Neutral);
        assert_eq!(articles[0].author, DEFAULT_AI_AUTHOR);
        assert_eq!(articles[0].source_url.as_deref(), Some("https://a.example.com"));
        assert!(articles[0].content.contains("## STRATEGIC VIEW"));
        assert!(articles.iter().all(|a| !a.image_url.is_empty()));

        let again = service.fetch_news(&query).await;
        assert_eq!(again, articles);
        assert_eq!(model.called_models(), vec![PRIMARY]);

        let request = &model.calls()[0];
        assert!(request.options.web_search);
    }

    #[tokio::test]
    async fn test_total_ai_outage_serves_rss() {
        let bridge = bridge_url().await;
        let (service, model, _) = testing::service_with_bridge(DummyModel::new(), &bridge);
        let query = NewsQuery::new(Continent::Global, Category::Business, Language::En);

        let articles = service.fetch_news(&query).await;
        assert_eq!(articles.len(), 6);
        assert_eq!(model.called_models().len(), 2);
        for article in &articles {
            assert!(article.id.starts_with("rss-"));
            assert!(!article.image_url.is_empty());
            assert!(matches!(
                article.sentiment,
                Sentiment::Positive | Sentiment::Negative | Sentiment::Neutral
            ));
        }

        let direct = service
            .rss
            .fetch(&FeedRequest::new(Continent::Global, Category::Business, Language::En))
            .await;
        let titles = |list: &[Article]| list.iter().map(|a| a.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&articles), titles(&direct));
    }

    #[tokio::test]
    async fn test_malformed_discovery_falls_back_to_rss() {
        let bridge = bridge_url().await;
        let model = DummyModel::new().reply(PRIMARY, r#"{"articles": "soon"}"#);
        let (service, _, _) = testing::service_with_bridge(model, &bridge);
        let query = NewsQuery::new(Continent::Global, Category::Business, Language::En).with_offset(6);
        let articles = service.fetch_news(&query).await;
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Wire story 6 shows growth");
    }

    #[tokio::test]
    async fn test_null_fields_keep_the_batch() {
        let discovery = r#"{"articles": [
            {"title": "Rates hold", "summary": null, "sentiment": null, "author": null},
            {"title": null, "summary": "No headline"},
            42,
            {"title": "Exports rise", "summary": "Up 4%", "sentiment": "positive", "sourceUrl": 7}
        ]}"#;
        let (service, _, _) = testing::service(DummyModel::new().reply(PRIMARY, discovery));
        let articles = service
            .fetch_news(&NewsQuery::new(Continent::Europe, Category::Economy, Language::En))
            .await;

        assert_eq!(articles.len(), 2);
        assert!(articles.iter().all(|a| a.id.starts_with("ai-")));
        assert_eq!(articles[0].title, "Rates hold");
        assert_eq!(articles[0].summary, "");
        assert_eq!(articles[0].sentiment, Sentiment::Neutral);
        assert_eq!(articles[0].author, DEFAULT_AI_AUTHOR);
        assert_eq!(articles[1].sentiment, Sentiment::Positive);
        assert_eq!(articles[1].source_url, None);
    }

    #[tokio::test]
    async fn test_exhausted_pipeline_returns_empty_and_skips_cache() {
        let (service, _, store) = testing::service(DummyModel::new());
        let query = NewsQuery::new(Continent::Global, Category::Global, Language::En);
        assert!(service.fetch_news(&query).await.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_image_keeps_siblings() {
        let model = Arc::new(DummyModel::new().reply(PRIMARY, DISCOVERY));
        let service = IntelligenceService::with_image_source(
            model,
            Arc::new(MemoryStore::new()),
            testing::config("http://127.0.0.1:9/api.json"),
            Arc::new(BrokenImages),
        );
        let articles = service
            .fetch_news(&NewsQuery::new(Continent::Global, Category::Global, Language::En))
            .await;
        assert_eq!(articles.len(), 2);
        assert!(articles.iter().all(|a| a.image_url == epm_feeds::DEFAULT_IMAGE_URL));
    }

    #[tokio::test]
    async fn test_search_uses_rss_only() {
        let bridge = bridge_url().await;
        let (service, model, _) = testing::service_with_bridge(DummyModel::new().reply_any(DISCOVERY), &bridge);
        let results = service.search_news("lithium", Language::En, 0).await;
        assert_eq!(results.len(), 6);
        assert!(model.called_models().is_empty());
        assert!(service.search_news("", Language::Fr, 100).await.is_empty());
    }
}
