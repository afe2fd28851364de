use epm_core::{now_millis, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::KeyValueStore;

/// Bump the version suffix whenever a cached payload changes shape.
pub const DEFAULT_NAMESPACE: &str = "epm_ultra_v19_";
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 30;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub namespace: String,
    pub ttl: Duration,
    /// Entry ceiling for the namespace; reaching it flushes the namespace.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    /// Reads `EPM_CACHE_NAMESPACE`, `EPM_CACHE_TTL_SECS` and
    /// `EPM_CACHE_MAX_ENTRIES`, keeping defaults for anything unset or invalid.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(namespace) = std::env::var("EPM_CACHE_NAMESPACE") {
            if !namespace.is_empty() {
                config.namespace = namespace;
            }
        }
        if let Some(secs) = env_number("EPM_CACHE_TTL_SECS") {
            config.ttl = Duration::from_secs(secs);
        }
        if let Some(max) = env_number("EPM_CACHE_MAX_ENTRIES") {
            config.max_entries = max as usize;
        }
        config
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

fn env_number(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    d: &'a T,
    t: i64,
}

#[derive(Deserialize)]
struct Envelope<T> {
    d: T,
    t: i64,
}

/// Time-expiring cache over a [`KeyValueStore`].
///
/// Entries are stored as `{"d": payload, "t": epoch_ms}` under
/// `namespace + key`. Reads of missing, expired or unreadable entries are
/// misses. Writes never fail from the caller's point of view: errors are
/// logged and the cache behaves as if empty.
///
/// Eviction is a full flush: once the namespace holds `max_entries` entries,
/// writing a new key first removes every namespaced entry.
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.config.namespace, key)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.namespaced(key);
        let raw = match self.store.get(&full_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache read failed");
                return None;
            }
        };

        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(key = %full_key, error = %e, "Ignoring unreadable cache entry");
                return None;
            }
        };

        let age = now_millis() - envelope.t;
        if age < self.config.ttl.as_millis() as i64 {
            debug!(key = %full_key, age_ms = age, "Cache hit");
            Some(envelope.d)
        } else {
            debug!(key = %full_key, age_ms = age, "Cache entry expired");
            None
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_set(key, value).await {
            warn!(key = %key, error = %e, "Cache full or unavailable, skipping write");
        }
    }

    async fn try_set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let full_key = self.namespaced(key);
        let namespaced: Vec<String> = self
            .store
            .keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(&self.config.namespace))
            .collect();

        if namespaced.len() >= self.config.max_entries && !namespaced.contains(&full_key) {
            debug!(entries = namespaced.len(), "Cache ceiling reached, flushing namespace");
            for k in &namespaced {
                self.store.remove(k).await?;
            }
        }

        let payload = serde_json::to_string(&EnvelopeRef {
            d: value,
            t: now_millis(),
        })?;
        self.store.set(&full_key, payload).await
    }
}
