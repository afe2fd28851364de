use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use epm_core::{Article, NewsQuery};
use tracing::debug;

use crate::service::IntelligenceService;

/// Tag handed to a request when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

/// Monotonic counter used to drop superseded results.
///
/// Every new request bumps the counter. A result is only delivered if no
/// newer request started while it was in flight.
#[derive(Debug, Clone, Default)]
pub struct RequestGenerations {
    latest: Arc<AtomicU64>,
}

impl RequestGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest.load(Ordering::SeqCst) == generation.0
    }

    /// Runs `work` as the newest request. `None` if it was superseded.
    pub async fn run<F, T>(&self, work: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let generation = self.begin();
        let result = work.await;
        if self.is_current(generation) {
            Some(result)
        } else {
            debug!(generation = generation.0, "Discarding stale result");
            None
        }
    }
}

/// A feed view whose filters can change while a page is loading.
#[derive(Clone)]
pub struct FeedSession {
    service: Arc<IntelligenceService>,
    generations: RequestGenerations,
}

impl FeedSession {
    pub fn new(service: Arc<IntelligenceService>) -> Self {
        Self {
            service,
            generations: RequestGenerations::new(),
        }
    }

    /// Loads a page; `None` if a later `load` started before this one finished.
    pub async fn load(&self, query: &NewsQuery) -> Option<Vec<Article>> {
        self.generations.run(self.service.fetch_news(query)).await
    }

    pub async fn search(&self, query: &str, language: epm_core::Language) -> Option<Vec<Article>> {
        self.generations
            .run(self.service.search_news(query, language, 0))
            .await
    }
}
