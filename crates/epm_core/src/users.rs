use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reader,
    JournalistPending,
    JournalistApproved,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    PendingVerification,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub joined_at: i64,
    pub status: UserStatus,
    #[serde(skip)]
    pub password_digest: Option<String>,
    #[serde(skip)]
    pub verification_code: Option<String>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<UserProfile>>;

    /// Fails if a user with the same email already exists.
    async fn insert(&self, user: UserProfile) -> Result<()>;

    /// Replaces the stored user with the same id. Returns false if none exists.
    async fn update(&self, user: UserProfile) -> Result<bool>;

    async fn list(&self) -> Result<Vec<UserProfile>>;
}
