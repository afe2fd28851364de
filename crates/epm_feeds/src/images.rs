use async_trait::async_trait;
use epm_core::{now_millis, Result};
use rand::Rng;

/// Shown when an image source cannot produce anything for an article.
pub const DEFAULT_IMAGE_URL: &str = "https://picsum.photos/seed/epm/720/480";

/// Characters of the query embedded in generated URLs.
const QUERY_CHARS: usize = 20;

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Returns an image URL for `query`.
    async fn acquire(&self, query: &str) -> Result<String>;
}

type Template = fn(&str, u64) -> String;

static SWARM_NODES: [Template; 20] = [
    |q, seed| format!("https://image.pollinations.ai/prompt/journalistic%20photo%20of%20{q}?width=720&height=480&nologo=true&seed={seed}"),
    |_, seed| format!("https://loremflickr.com/720/480/business,news?lock={seed}"),
    |_, seed| format!("https://picsum.photos/seed/{seed}/720/480"),
    |q, seed| format!("https://image.pollinations.ai/prompt/4k%20news%20broadcast%20{q}?width=720&height=480&nologo=true&seed={}", seed.wrapping_add(1)),
    |_, seed| format!("https://loremflickr.com/720/480/finance,tech?lock={}", seed.wrapping_add(1)),
    |q, seed| format!("https://image.pollinations.ai/prompt/corporate%20office%20{q}?width=720&height=480&nologo=true&seed={}", seed.wrapping_add(2)),
    |_, seed| format!("https://loremflickr.com/720/480/city,night?lock={}", seed.wrapping_add(2)),
    |q, seed| format!("https://image.pollinations.ai/prompt/editorial%20photography%20{q}?width=720&height=480&nologo=true&seed={}", seed.wrapping_add(3)),
    |_, seed| format!("https://loremflickr.com/720/480/technology?lock={}", seed.wrapping_add(3)),
    |q, seed| format!("https://image.pollinations.ai/prompt/ultra%20realistic%20{q}?width=720&height=480&nologo=true&seed={}", seed.wrapping_add(4)),
    // redundancy nodes
    |q, seed| format!("https://image.pollinations.ai/prompt/bbc%20news%20style%20{q}?width=720&height=480&nologo=true&seed={}", seed.wrapping_add(5)),
    |_, seed| format!("https://loremflickr.com/720/480/politics?lock={}", seed.wrapping_add(5)),
    |_, seed| format!("https://picsum.photos/seed/{}/720/480", seed.wrapping_add(100)),
    |q, seed| format!("https://image.pollinations.ai/prompt/reuters%20style%20{q}?width=720&height=480&nologo=true&seed={}", seed.wrapping_add(6)),
    |_, seed| format!("https://loremflickr.com/720/480/work?lock={}", seed.wrapping_add(6)),
    |q, seed| format!("https://image.pollinations.ai/prompt/financial%20times%20{q}?width=720&height=480&nologo=true&seed={}", seed.wrapping_add(7)),
    |_, seed| format!("https://loremflickr.com/720/480/meeting?lock={}", seed.wrapping_add(7)),
    |q, seed| format!("https://image.pollinations.ai/prompt/cnn%20broadcast%20{q}?width=720&height=480&nologo=true&seed={}", seed.wrapping_add(8)),
    |_, seed| format!("https://loremflickr.com/720/480/industry?lock={}", seed.wrapping_add(8)),
    |q, seed| format!("https://image.pollinations.ai/prompt/bloomberg%20terminal%20{q}?width=720&height=480&nologo=true&seed={}", seed.wrapping_add(9)),
];

/// Spreads image lookups over a pool of public image services.
///
/// Only URLs are built here; the images are fetched by whoever renders them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSwarm;

impl ImageSwarm {
    pub fn new() -> Self {
        Self
    }

    pub fn node_count(&self) -> usize {
        SWARM_NODES.len()
    }

    /// Picks a node with a fresh seed, so identical queries land on
    /// different images.
    pub fn acquire_image(&self, query: &str) -> String {
        let seed = (now_millis() as f64 * rand::thread_rng().gen::<f64>()).floor() as u64;
        self.acquire_with_seed(query, seed)
    }

    pub fn acquire_with_seed(&self, query: &str, seed: u64) -> String {
        let truncated: String = query.chars().take(QUERY_CHARS).collect();
        let encoded = urlencoding::encode(&truncated);
        let index = (query.chars().count() as u64).wrapping_add(seed) % SWARM_NODES.len() as u64;
        SWARM_NODES[index as usize](&encoded, seed)
    }
}

#[async_trait]
impl ImageSource for ImageSwarm {
    async fn acquire(&self, query: &str) -> Result<String> {
        Ok(self.acquire_image(query))
    }
}
