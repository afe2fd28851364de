use async_trait::async_trait;
use epm_core::Result;
use std::sync::Arc;

pub mod backends;
pub mod cache;
pub mod users;

pub use backends::*;
pub use cache::{CacheConfig, TtlCache};
pub use users::InMemoryUserRepository;

/// Flat string-keyed store the cache persists into.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Every key currently stored, across all namespaces.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Builds a store by name: `memory`, or `file` backed by `path`.
pub async fn create_store(kind: &str, path: Option<&str>) -> Result<Arc<dyn KeyValueStore>> {
    match kind {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "file" => {
            let path = path.ok_or_else(|| {
                epm_core::Error::Storage("File store requires a path".to_string())
            })?;
            Ok(Arc::new(FileStore::open(path).await?))
        }
        other => Err(epm_core::Error::Storage(format!("Unknown store backend: {}", other))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::cache::{CacheConfig, TtlCache};
    pub use super::KeyValueStore;
}
