pub mod auth;
pub mod broadcast;
pub mod business;
pub mod chat;
pub mod generation;
pub mod logging;
pub mod market;
pub mod news;
pub mod risk;
pub mod service;

pub use auth::{AdminCredential, AuthError, AuthService, Session};
pub use broadcast::broadcast_programs;
pub use chat::OFFLINE_NOTICE;
pub use generation::{FeedSession, Generation, RequestGenerations};
pub use logging::init_logging;
pub use service::{IntelligenceService, ServiceConfig};

pub mod prelude {
    pub use super::service::{IntelligenceService, ServiceConfig};
    pub use epm_core::prelude::*;
}
