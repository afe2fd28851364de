use std::sync::Arc;

use epm_feeds::{FeedConfig, ImageSource, ImageSwarm, RssFallback, DEFAULT_IMAGE_URL};
use epm_inference::{GenerativeModel, InferenceConfig, LayeredRequestHandler};
use epm_storage::{CacheConfig, KeyValueStore, TtlCache};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub inference: InferenceConfig,
    pub cache: CacheConfig,
    pub feeds: FeedConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            inference: InferenceConfig::from_env(),
            cache: CacheConfig::from_env(),
            feeds: FeedConfig::from_env(),
        }
    }
}

/// Entry point for every content pipeline.
///
/// None of the feature operations return an error: each one degrades to a
/// cached, fallback or synthetic result instead.
pub struct IntelligenceService {
    pub(crate) cache: TtlCache,
    pub(crate) handler: LayeredRequestHandler,
    pub(crate) rss: RssFallback,
    pub(crate) images: Arc<dyn ImageSource>,
    pub(crate) config: InferenceConfig,
}

impl IntelligenceService {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        store: Arc<dyn KeyValueStore>,
        config: ServiceConfig,
    ) -> Self {
        Self::with_image_source(model, store, config, Arc::new(ImageSwarm::new()))
    }

    pub fn with_image_source(
        model: Arc<dyn GenerativeModel>,
        store: Arc<dyn KeyValueStore>,
        config: ServiceConfig,
        images: Arc<dyn ImageSource>,
    ) -> Self {
        Self {
            cache: TtlCache::new(store, config.cache),
            handler: LayeredRequestHandler::new(model, &config.inference),
            rss: RssFallback::new(config.feeds, images.clone()),
            images,
            config: config.inference,
        }
    }

    pub fn model_name(&self) -> &str {
        self.handler.model().name()
    }

    /// Image for one enriched item; failures only affect that item.
    pub(crate) async fn image_for(&self, query: &str) -> String {
        match self.images.acquire(query).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, query, "Image acquisition failed, using default image");
                DEFAULT_IMAGE_URL.to_string()
            }
        }
    }
}
