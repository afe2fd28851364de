use async_trait::async_trait;
use epm_core::{Error, Result, UserProfile, UserRepository};
use tokio::sync::RwLock;

/// Users held in process memory, lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<UserProfile>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<UserProfile>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: UserProfile) -> Result<()> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(Error::Auth("Email already exists".to_string()));
        }
        users.push(user);
        Ok(())
    }

    async fn update(&self, user: UserProfile) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                *existing = user;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<UserProfile>> {
        Ok(self.users.read().await.clone())
    }
}
