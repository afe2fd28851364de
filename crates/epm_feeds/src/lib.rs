pub mod html;
pub mod images;
pub mod rss;

pub use images::{ImageSource, ImageSwarm, DEFAULT_IMAGE_URL};
pub use rss::{FeedConfig, FeedRequest, RssFallback};

pub mod prelude {
    pub use super::images::{ImageSource, ImageSwarm};
    pub use super::rss::{FeedConfig, FeedRequest, RssFallback};
    pub use epm_core::{Article, Error, Result};
}
