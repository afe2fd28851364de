use std::sync::Arc;
use std::time::Duration;

use epm_core::{
    classify_sentiment, normalize_date, now_millis, Article, Category, Continent, Language, Result,
};
use epm_inference::json::de;
use epm_inference::SyntheticAnalyst;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::html::{first_image_src, strip_tags};
use crate::images::{ImageSource, DEFAULT_IMAGE_URL};

pub const DEFAULT_BRIDGE_URL: &str = "https://api.rss2json.com/v1/api.json";
pub const DEFAULT_GOOGLE_NEWS_URL: &str = "https://news.google.com/rss/search";
pub const DEFAULT_AUTHOR: &str = "Global Wire";

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// RSS-to-JSON bridge endpoint, called with `?rss_url=...`.
    pub bridge_url: String,
    pub google_news_url: String,
    pub page_size: usize,
    /// Characters of the description kept for the summary.
    pub summary_chars: usize,
    /// Upper bound for one bridge round trip.
    pub timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            google_news_url: DEFAULT_GOOGLE_NEWS_URL.to_string(),
            page_size: 6,
            summary_chars: 200,
            timeout: Duration::from_secs(15),
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("EPM_RSS_BRIDGE_URL") {
            if !url.trim().is_empty() {
                config.bridge_url = url;
            }
        }
        if let Some(secs) = std::env::var("EPM_RSS_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_bridge_url(mut self, url: impl Into<String>) -> Self {
        self.bridge_url = url.into();
        self
    }
}

/// What to look up in the syndication feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub continent: Continent,
    pub category: Category,
    pub language: Language,
    pub offset: usize,
    /// Free-text search; replaces the category-derived query.
    pub query: Option<String>,
    pub country: Option<String>,
}

impl FeedRequest {
    pub fn new(continent: Continent, category: Category, language: Language) -> Self {
        Self {
            continent,
            category,
            language,
            offset: 0,
            query: None,
            country: None,
        }
    }

    pub fn search(query: impl Into<String>, language: Language, offset: usize) -> Self {
        Self {
            offset,
            query: Some(query.into()),
            ..Self::new(Continent::Global, Category::Global, language)
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_country(mut self, country: Option<String>) -> Self {
        self.country = country;
        self
    }

    /// Search phrase sent to Google News.
    pub fn search_phrase(&self) -> String {
        let mut phrase = match non_empty(self.query.as_deref()) {
            Some(query) => query.to_string(),
            None if self.category == Category::Global => "Top News".to_string(),
            None => self.category.to_string(),
        };
        if let Some(country) = non_empty(self.country.as_deref()) {
            phrase.push_str(&format!(" in {}", country));
        } else if self.continent != Continent::Global {
            phrase.push_str(&format!(" in {}", self.continent));
        }
        phrase
    }
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    status: String,
    /// Kept raw so one malformed item only drops itself.
    #[serde(default, deserialize_with = "de::lenient")]
    items: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeItem {
    #[serde(default, deserialize_with = "de::lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "de::lenient")]
    pub description: String,
    #[serde(default, deserialize_with = "de::optional")]
    pub pub_date: Option<String>,
    #[serde(default, deserialize_with = "de::optional")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "de::optional")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "de::optional")]
    pub enclosure: Option<Enclosure>,
    #[serde(default, deserialize_with = "de::optional")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Enclosure {
    #[serde(default, deserialize_with = "de::optional")]
    pub link: Option<String>,
}

impl BridgeItem {
    /// Image shipped with the item: enclosure, then inline `<img>`, then thumbnail.
    pub fn embedded_image(&self) -> Option<String> {
        self.enclosure
            .as_ref()
            .and_then(|e| non_empty(e.link.as_deref()))
            .map(str::to_string)
            .or_else(|| first_image_src(&self.description))
            .or_else(|| non_empty(self.thumbnail.as_deref()).map(str::to_string))
    }

    /// Converts the item into an article. `index` is the position in the page.
    pub fn into_article(
        self,
        index: usize,
        request: &FeedRequest,
        config: &FeedConfig,
        image_url: String,
        now_ms: i64,
    ) -> Article {
        let plain = strip_tags(&self.description);
        let summary = format!("{}...", plain.chars().take(config.summary_chars).collect::<String>());
        let sentiment = classify_sentiment(&format!("{} {}", self.title, plain));
        let content = SyntheticAnalyst::generate_report(&self.title, &plain, "RSS Feed");

        Article {
            id: format!("rss-{}-{}", now_ms, index),
            title: self.title,
            summary,
            content,
            category: request.category,
            sub_category: None,
            continent: request.continent,
            country: request.country.clone(),
            published_at: normalize_date(self.pub_date.as_deref()),
            image_url,
            author: non_empty(self.author.as_deref())
                .unwrap_or(DEFAULT_AUTHOR)
                .to_string(),
            source_url: self.link,
            sentiment,
            pros: Vec::new(),
            cons: Vec::new(),
            forecasts: Vec::new(),
            fetched_at: now_ms,
        }
    }
}

/// Google News search through an RSS-to-JSON bridge. Used when the model
/// returns nothing, and for free-text search.
#[derive(Clone)]
pub struct RssFallback {
    client: Client,
    config: FeedConfig,
    images: Arc<dyn ImageSource>,
}

impl RssFallback {
    pub fn new(config: FeedConfig, images: Arc<dyn ImageSource>) -> Self {
        Self {
            client: Client::new(),
            config,
            images,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn feed_url(&self, request: &FeedRequest) -> Result<Url> {
        let (hl, gl, ceid) = request.language.news_locale();
        let rss_url = Url::parse_with_params(
            &self.config.google_news_url,
            &[("q", request.search_phrase().as_str()), ("hl", hl), ("gl", gl), ("ceid", ceid)],
        )?;
        Ok(Url::parse_with_params(&self.config.bridge_url, &[("rss_url", rss_url.as_str())])?)
    }

    /// Never fails: any transport or format problem, or a bridge slower
    /// than `timeout`, yields an empty list.
    pub async fn fetch(&self, request: &FeedRequest) -> Vec<Article> {
        match tokio::time::timeout(self.config.timeout, self.try_fetch(request)).await {
            Ok(Ok(articles)) => articles,
            Ok(Err(e)) => {
                warn!(error = %e, phrase = %request.search_phrase(), "RSS fallback failed");
                Vec::new()
            }
            Err(_) => {
                warn!(timeout = ?self.config.timeout, phrase = %request.search_phrase(), "RSS bridge timed out");
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self, request: &FeedRequest) -> Result<Vec<Article>> {
        let url = self.feed_url(request)?;
        debug!(%url, "Fetching RSS bridge");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body: BridgeResponse = response.json().await?;

        if body.status != "ok" {
            warn!(status = %body.status, "RSS bridge returned a non-ok status");
            return Ok(Vec::new());
        }

        let now_ms = now_millis();
        let items: Vec<BridgeItem> = body
            .items
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<BridgeItem>(raw) {
                Ok(item) if !item.title.trim().is_empty() => Some(item),
                Ok(_) => {
                    debug!("Skipping untitled RSS item");
                    None
                }
                Err(e) => {
                    debug!(error = %e, "Skipping malformed RSS item");
                    None
                }
            })
            .collect();
        let page = items
            .into_iter()
            .skip(request.offset)
            .take(self.config.page_size)
            .enumerate()
            .map(|(index, item)| async move {
                let image_url = match item.embedded_image() {
                    Some(url) => url,
                    None => self.acquire_image(&item.title).await,
                };
                item.into_article(index, request, &self.config, image_url, now_ms)
            });
        Ok(join_all(page).await)
    }

    async fn acquire_image(&self, title: &str) -> String {
        match self.images.acquire(title).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Image acquisition failed, using default image");
                DEFAULT_IMAGE_URL.to_string()
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageSwarm;
    use async_trait::async_trait;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use epm_core::{Error, Sentiment};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn items(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| {
                json!({
                    "title": format!("Headline {}", i),
                    "description": "<p>Plain description</p>",
                    "pubDate": "2024-03-01 10:00:00",
                    "link": format!("https://news.example.com/{}", i),
                    "author": "",
                    "enclosure": {},
                    "thumbnail": ""
                })
            })
            .collect()
    }

    /// Serves a fixed item list and echoes the requested feed URL in the
    /// first item's author field.
    async fn bridge(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let mut all = items(10);
        all[0]["author"] = json!(params.get("rss_url").cloned().unwrap_or_default());
        Json(json!({ "status": "ok", "items": all }))
    }

    struct BrokenImages;

    #[async_trait]
    impl ImageSource for BrokenImages {
        async fn acquire(&self, _query: &str) -> Result<String> {
            Err(Error::Feed("image service down".to_string()))
        }
    }

    fn fallback(base: &str, images: Arc<dyn ImageSource>) -> RssFallback {
        let config = FeedConfig::default().with_bridge_url(format!("{}/api.json", base));
        RssFallback::new(config, images)
    }

    #[test]
    fn test_search_phrase() {
        let global = FeedRequest::new(Continent::Global, Category::Global, Language::En);
        assert_eq!(global.search_phrase(), "Top News");

        let regional = FeedRequest::new(Continent::Europe, Category::Business, Language::En);
        assert_eq!(regional.search_phrase(), "Business in Europe");

        let country = regional.clone().with_country(Some("France".to_string()));
        assert_eq!(country.search_phrase(), "Business in France");

        let search = FeedRequest::search("lithium prices", Language::Pt, 0);
        assert_eq!(search.search_phrase(), "lithium prices");
    }

    #[test]
    fn test_feed_url_carries_locale() {
        let rss = RssFallback::new(FeedConfig::default(), Arc::new(ImageSwarm::new()));
        let request = FeedRequest::new(Continent::Asia, Category::Technology, Language::Pt);
        let url = rss.feed_url(&request).unwrap();
        assert!(url.as_str().starts_with(DEFAULT_BRIDGE_URL));

        let rss_url = url
            .query_pairs()
            .find(|(k, _)| k == "rss_url")
            .map(|(_, v)| Url::parse(&v).unwrap())
            .unwrap();
        let params: HashMap<String, String> = rss_url.query_pairs().into_owned().collect();
        assert_eq!(params["q"], "Technology in Asia");
        assert_eq!(params["hl"], "pt-BR");
        assert_eq!(params["gl"], "BR");
        assert_eq!(params["ceid"], "BR:pt-419");
    }

    #[test]
    fn test_embedded_image_preference() {
        let mut item = BridgeItem {
            description: r#"<img src="https://cdn.example.com/inline.jpg">"#.to_string(),
            thumbnail: Some("https://cdn.example.com/thumb.jpg".to_string()),
            enclosure: Some(Enclosure {
                link: Some("https://cdn.example.com/enclosure.jpg".to_string()),
            }),
            ..BridgeItem::default()
        };
        assert_eq!(item.embedded_image().as_deref(), Some("https://cdn.example.com/enclosure.jpg"));
        item.enclosure = None;
        assert_eq!(item.embedded_image().as_deref(), Some("https://cdn.example.com/inline.jpg"));
        item.description = "text".to_string();
        assert_eq!(item.embedded_image().as_deref(), Some("https://cdn.example.com/thumb.jpg"));
        item.thumbnail = None;
        assert_eq!(item.embedded_image(), None);
    }

    #[test]
    fn test_item_conversion() {
        let item = BridgeItem {
            title: "Profits surge".to_string(),
            description: format!("<b>{}</b>", "x".repeat(300)),
            pub_date: Some("not a date".to_string()),
            ..BridgeItem::default()
        };
        let request = FeedRequest::new(Continent::Africa, Category::Economy, Language::En);
        let article = item.into_article(3, &request, &FeedConfig::default(), "img".to_string(), 42);
        assert_eq!(article.id, "rss-42-3");
        assert_eq!(article.summary.chars().count(), 203);
        assert!(article.summary.ends_with("..."));
        assert!(!article.summary.contains('<'));
        assert_eq!(article.sentiment, Sentiment::Positive);
        assert_eq!(article.author, DEFAULT_AUTHOR);
        assert_eq!(article.category, Category::Economy);
        assert_eq!(article.continent, Continent::Africa);
        assert!(article.content.contains("## EXECUTIVE SUMMARY"));
        assert_eq!(article.fetched_at, 42);
    }

    #[tokio::test]
    async fn test_fetch_slices_page() {
        let base = spawn_server(Router::new().route("/api.json", get(bridge))).await;
        let rss = fallback(&base, Arc::new(ImageSwarm::new()));

        let request = FeedRequest::new(Continent::Europe, Category::Business, Language::En);
        let first = rss.fetch(&request).await;
        assert_eq!(first.len(), 6);
        assert_eq!(first[1].title, "Headline 1");
        assert!(first[0].author.contains("news.google.com"));
        assert_eq!(first[1].author, DEFAULT_AUTHOR);
        assert!(first.iter().all(|a| !a.image_url.is_empty()));

        let second = rss.fetch(&request.clone().with_offset(6)).await;
        assert_eq!(second.len(), 4);
        assert_eq!(second[0].title, "Headline 6");
        assert_eq!(second[0].id.rsplit('-').next(), Some("0"));

        assert!(rss.fetch(&request.with_offset(10)).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_image_uses_default() {
        let base = spawn_server(Router::new().route("/api.json", get(bridge))).await;
        let rss = fallback(&base, Arc::new(BrokenImages));
        let articles = rss
            .fetch(&FeedRequest::new(Continent::Global, Category::Global, Language::En))
            .await;
        assert_eq!(articles.len(), 6);
        assert!(articles.iter().all(|a| a.image_url == DEFAULT_IMAGE_URL));
    }

    #[tokio::test]
    async fn test_bad_items_only_drop_themselves() {
        async fn ragged() -> Json<Value> {
            let mut all = items(6);
            all[2]["description"] = Value::Null;
            all[3]["author"] = Value::Null;
            all[3]["enclosure"] = json!("not an object");
            all.push(json!("not an item"));
            all.push(json!({ "title": null, "description": "untitled" }));
            Json(json!({ "status": "ok", "items": all }))
        }
        let base = spawn_server(Router::new().route("/api.json", get(ragged))).await;
        let rss = fallback(&base, Arc::new(ImageSwarm::new()));

        let articles = rss
            .fetch(&FeedRequest::new(Continent::Global, Category::Global, Language::En))
            .await;
        assert_eq!(articles.len(), 6);
        assert_eq!(articles[2].title, "Headline 2");
        assert_eq!(articles[2].summary, "...");
        assert_eq!(articles[3].author, DEFAULT_AUTHOR);
    }

    #[tokio::test]
    async fn test_stalled_bridge_times_out() {
        let stalled = Router::new().route(
            "/api.json",
            get(|| async {
                std::future::pending::<()>().await;
                "unreachable"
            }),
        );
        let base = spawn_server(stalled).await;
        let config = FeedConfig::default()
            .with_bridge_url(format!("{}/api.json", base))
            .with_timeout(Duration::from_millis(200));
        let rss = RssFallback::new(config, Arc::new(ImageSwarm::new()));

        let request = FeedRequest::search("anything", Language::En, 0);
        let articles = tokio::time::timeout(Duration::from_secs(5), rss.fetch(&request))
            .await
            .expect("fetch should give up on a stalled bridge");
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_never_fails() {
        let router = Router::new()
            .route("/api.json", get(|| async { Json(json!({"status": "error", "items": []})) }))
            .route("/garbage/api.json", get(|| async { "not json" }))
            .route("/noitems/api.json", get(|| async { Json(json!({"status": "ok", "items": "none"})) }));
        let base = spawn_server(router).await;
        let request = FeedRequest::search("anything", Language::En, 0);

        for prefix in ["", "/garbage", "/noitems", "/missing"] {
            let rss = fallback(&format!("{}{}", base, prefix), Arc::new(ImageSwarm::new()));
            assert!(rss.fetch(&request).await.is_empty(), "prefix {}", prefix);
        }

        let unreachable = fallback("http://127.0.0.1:9", Arc::new(ImageSwarm::new()));
        assert!(unreachable.fetch(&request).await.is_empty());
    }
}
