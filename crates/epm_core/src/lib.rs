pub mod chat;
pub mod dates;
pub mod error;
pub mod sentiment;
pub mod types;
pub mod users;

pub use chat::{ChatMessage, ChatTranscript};
pub use dates::{normalize_date, normalize_date_string, parse_date};
pub use error::Error;
pub use sentiment::classify_sentiment;
pub use types::*;
pub use users::{Role, UserProfile, UserRepository, UserStatus};

pub type Result<T> = std::result::Result<T, Error>;

/// Milliseconds since the Unix epoch, the unit every fetch/cache stamp uses.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub mod prelude {
    pub use super::types::{Article, Category, Continent, Language, NewsQuery, Sentiment};
    pub use super::{Error, Result};
}
