use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use epm_core::{now_millis, Role, UserProfile, UserRepository, UserStatus};
use rand::Rng;
use sha2::{Digest, Sha256};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const ADMIN_USER_ID: &str = "admin-001";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not verified. Please verify your account.")]
    NotVerified,

    #[error("Email already exists")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Administrator access required")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] epm_core::Error),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Administrator login, supplied by the deployment.
#[derive(Clone)]
pub struct AdminCredential {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl AdminCredential {
    /// `EPM_ADMIN_EMAIL` and `EPM_ADMIN_PASSWORD`; both must be set.
    pub fn from_env() -> Option<Self> {
        let email = std::env::var("EPM_ADMIN_EMAIL").ok()?;
        let password = std::env::var("EPM_ADMIN_PASSWORD").ok()?;
        if email.trim().is_empty() || password.is_empty() {
            return None;
        }
        Some(Self { email, password })
    }

    fn matches(&self, email: &str, password: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim()) && self.password == password
    }

    fn profile(&self) -> UserProfile {
        UserProfile {
            id: ADMIN_USER_ID.to_string(),
            name: "Administrator".to_string(),
            email: self.email.clone(),
            role: Role::Admin,
            avatar: None,
            joined_at: 0,
            status: UserStatus::Active,
            password_digest: None,
            verification_code: None,
        }
    }
}

fn digest_password(salt: &str, password: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", salt, password).as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}${}", salt, hex)
}

fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, _)) => digest_password(salt, password) == stored,
        None => false,
    }
}

/// A signed-in user and the bearer token that identifies the session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    #[serde(flatten)]
    pub user: UserProfile,
}

/// Accounts over a [`UserRepository`].
///
/// New accounts start as pending readers and become active once the emailed
/// six-digit code is confirmed. Delivery is a log line.
///
/// User management is reserved to sessions opened with the configured
/// [`AdminCredential`].
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    admin: Option<AdminCredential>,
    /// token -> user id
    sessions: RwLock<HashMap<String, String>>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, admin: Option<AdminCredential>) -> Self {
        Self {
            users,
            admin,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// [`login`](Self::login), then opens a session for the user.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        let user = self.login(email, password).await?;
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions
            .write()
            .await
            .insert(token.clone(), user.id.clone());
        Ok(Session { token, user })
    }

    pub async fn sign_out(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// Checks that `token` belongs to a session of the configured administrator.
    pub async fn require_admin(&self, token: Option<&str>) -> AuthResult<()> {
        let token = token.ok_or(AuthError::Unauthenticated)?;
        let sessions = self.sessions.read().await;
        let user_id = sessions.get(token).ok_or(AuthError::Unauthenticated)?;
        if self.admin.is_some() && user_id == ADMIN_USER_ID {
            Ok(())
        } else {
            warn!(%user_id, "Rejected user-management request");
            Err(AuthError::Forbidden)
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<UserProfile> {
        if let Some(admin) = &self.admin {
            if admin.matches(email, password) {
                info!("🔑 Administrator signed in");
                return Ok(admin.profile());
            }
        }

        let user = self
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let valid = user
            .password_digest
            .as_deref()
            .map(|stored| verify_password(stored, password))
            .unwrap_or(false);
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }
        if user.status == UserStatus::PendingVerification {
            return Err(AuthError::NotVerified);
        }
        Ok(user)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthResult<UserProfile> {
        let email = email.trim();
        if name.trim().is_empty() {
            return Err(AuthError::InvalidInput("Name is required".to_string()));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput("A valid email is required".to_string()));
        }
        if password.len() < 6 {
            return Err(AuthError::InvalidInput(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();
        let salt = uuid::Uuid::new_v4().simple().to_string();
        let user = UserProfile {
            id: format!("u-{}", uuid::Uuid::new_v4()),
            name: name.trim().to_string(),
            email: email.to_string(),
            role: Role::Reader,
            avatar: None,
            joined_at: now_millis(),
            status: UserStatus::PendingVerification,
            password_digest: Some(digest_password(&salt, password)),
            verification_code: Some(code.clone()),
        };
        self.users.insert(user.clone()).await.map_err(|e| match e {
            epm_core::Error::Auth(_) => AuthError::EmailTaken,
            other => AuthError::Repository(other),
        })?;

        info!(email = %user.email, code = %code, "📧 Sending verification code");
        Ok(user)
    }

    pub async fn verify_email(&self, email: &str, code: &str) -> AuthResult<UserProfile> {
        let mut user = self
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if user.verification_code.as_deref() != Some(code.trim()) {
            warn!(email = %user.email, "Rejected verification code");
            return Err(AuthError::InvalidCode);
        }
        user.status = UserStatus::Active;
        user.verification_code = None;
        if !self.users.update(user.clone()).await? {
            return Err(AuthError::UserNotFound);
        }
        Ok(user)
    }

    pub async fn list_users(&self) -> AuthResult<Vec<UserProfile>> {
        Ok(self.users.list().await?)
    }

    /// Returns false if no user has `user_id`.
    pub async fn update_role(&self, user_id: &str, role: Role) -> AuthResult<bool> {
        let Some(mut user) = self.users.find_by_id(user_id).await? else {
            return Ok(false);
        };
        user.role = role;
        Ok(self.users.update(user).await?)
    }
}
