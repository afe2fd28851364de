use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/news", get(handlers::news))
        .route("/api/search", get(handlers::search))
        .route("/api/market-pulse", get(handlers::market_pulse))
        .route("/api/risk", post(handlers::corporate_risk))
        .route("/api/validate", post(handlers::validate_idea))
        .route("/api/chat", post(handlers::chat))
        .route("/api/broadcasts", get(handlers::broadcasts))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/verify", post(handlers::verify))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/users", get(handlers::list_users))
        .route("/api/users/:id/role", put(handlers::update_role))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Binds `addr` and serves the API until the process exits.
pub async fn serve(state: AppState, addr: SocketAddr) -> epm_core::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Serving API on http://{}", listener.local_addr()?);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, AppState};
    pub use epm_core::{Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use epm_core::{Role, UserProfile, UserStatus};
    use epm_feeds::FeedConfig;
    use epm_inference::{DummyModel, InferenceConfig};
    use epm_pipeline::{AdminCredential, AuthService, IntelligenceService, ServiceConfig};
    use epm_storage::{CacheConfig, InMemoryUserRepository, MemoryStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn config() -> ServiceConfig {
        ServiceConfig {
            inference: InferenceConfig::default(),
            cache: CacheConfig::default(),
            feeds: FeedConfig::default().with_bridge_url("http://127.0.0.1:9/api.json"),
        }
    }

    fn app_with(model: DummyModel, users: Vec<UserProfile>, admin: Option<AdminCredential>) -> Router {
        let service = IntelligenceService::new(Arc::new(model), Arc::new(MemoryStore::new()), config());
        let auth = AuthService::new(Arc::new(InMemoryUserRepository::with_users(users)), admin);
        create_app(AppState::new(service, auth))
    }

    fn app(model: DummyModel) -> Router {
        app_with(model, Vec::new(), None)
    }

    fn pending_user() -> UserProfile {
        UserProfile {
            id: "u-1".to_string(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            role: Role::Reader,
            avatar: None,
            joined_at: 0,
            status: UserStatus::PendingVerification,
            password_digest: None,
            verification_code: Some("123456".to_string()),
        }
    }

    fn root() -> AdminCredential {
        AdminCredential {
            email: "root@example.com".to_string(),
            password: "hunter22".to_string(),
        }
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send_as(app, None, method, uri, body).await
    }

    async fn send_as(
        app: &Router,
        token: Option<&str>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_news_with_unknown_filters() {
        let discovery = r#"{"articles":[{"title":"Chip boom","summary":"Fabs expand"}]}"#;
        let app = app(DummyModel::new().reply_any(discovery));

        let (status, body) = send(&app, Method::GET, "/api/news?continent=Atlantis&category=Technology", None).await;
        assert_eq!(status, StatusCode::OK);
        let articles = body.as_array().unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0]["title"], "Chip boom");
        assert_eq!(articles[0]["continent"], "Global");
        assert_eq!(articles[0]["category"], "Technology");
    }

    #[tokio::test]
    async fn test_search_without_feed_is_empty() {
        let app = app(DummyModel::new());
        let (status, body) = send(&app, Method::GET, "/api/search?q=lithium&language=pt", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_analyst_endpoints_fall_back_to_synthetic() {
        let app = app(DummyModel::new());

        let (status, pulse) = send(&app, Method::GET, "/api/market-pulse?category=Agribusiness", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pulse["competitors"].as_array().unwrap().len(), 4);

        let risk_request = json!({ "profile": { "companyName": "Acme", "sector": "Mining" } });
        let (status, risk) = send(&app, Method::POST, "/api/risk", Some(risk_request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(risk["activeAlerts"].as_array().unwrap().len(), 1);

        let idea = json!({ "idea": "Drone delivery", "region": "Lisbon" });
        let (status, validation) = send(&app, Method::POST, "/api/validate", Some(idea)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(validation["score"], 50.0);
    }

    #[tokio::test]
    async fn test_chat_streams_events() {
        let app = app(DummyModel::new().chat_chunks(["Hello ", "world"]));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "query": "Status?" }).to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("\"Hello \""));
        assert!(text.contains("\"world\""));
    }

    #[tokio::test]
    async fn test_chat_outage_sends_notice() {
        let app = app(DummyModel::new());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "query": "Status?" }).to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("Intelligence Node overloaded or offline"));
    }

    #[tokio::test]
    async fn test_broadcasts_by_continent() {
        let app = app(DummyModel::new());
        let (status, body) = send(&app, Method::GET, "/api/broadcasts?continent=Europe", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 5);

        let (_, all) = send(&app, Method::GET, "/api/broadcasts", None).await;
        assert_eq!(all.as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_registration_errors() {
        let app = app(DummyModel::new());
        let signup = json!({ "name": "Ben", "email": "ben@example.com", "password": "password" });

        let (status, user) = send(&app, Method::POST, "/api/auth/register", Some(signup.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["status"], "pending_verification");
        assert!(user.get("verificationCode").is_none());

        let (status, body) = send(&app, Method::POST, "/api/auth/register", Some(signup)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Email already exists");

        let login = json!({ "email": "ben@example.com", "password": "password" });
        let (status, _) = send(&app, Method::POST, "/api/auth/login", Some(login)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let short = json!({ "name": "Cy", "email": "cy@example.com", "password": "123" });
        let (status, _) = send(&app, Method::POST, "/api/auth/register", Some(short)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_and_manage_roles() {
        let app = app_with(DummyModel::new(), vec![pending_user()], Some(root()));

        let wrong = json!({ "email": "ana@example.com", "code": "000000" });
        let (status, _) = send(&app, Method::POST, "/api/auth/verify", Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let unknown = json!({ "email": "nobody@example.com", "code": "123456" });
        let (status, _) = send(&app, Method::POST, "/api/auth/verify", Some(unknown)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let right = json!({ "email": "ana@example.com", "code": "123456" });
        let (status, user) = send(&app, Method::POST, "/api/auth/verify", Some(right)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["status"], "active");

        let login = json!({ "email": "root@example.com", "password": "hunter22" });
        let (_, session) = send(&app, Method::POST, "/api/auth/login", Some(login)).await;
        let token = session["token"].as_str().unwrap().to_string();

        let promote = json!({ "role": "journalist_approved" });
        let (status, _) =
            send_as(&app, Some(&token), Method::PUT, "/api/users/u-1/role", Some(promote.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            send_as(&app, Some(&token), Method::PUT, "/api/users/missing/role", Some(promote)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, users) = send_as(&app, Some(&token), Method::GET, "/api/users", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users[0]["role"], "journalist_approved");

        let (status, _) = send_as(&app, Some(&token), Method::POST, "/api/auth/logout", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send_as(&app, Some(&token), Method::GET, "/api/users", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_management_rejects_non_admins() {
        let app = app_with(DummyModel::new(), vec![pending_user()], Some(root()));
        let escalate = json!({ "role": "admin" });

        let (status, body) = send(&app, Method::PUT, "/api/users/u-1/role", Some(escalate.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");
        let (status, _) = send(&app, Method::GET, "/api/users", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            send_as(&app, Some("forged"), Method::PUT, "/api/users/u-1/role", Some(escalate.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // a verified reader has a session but no rights over accounts
        let users = Arc::new(InMemoryUserRepository::new());
        let auth = AuthService::new(users, Some(root()));
        let eve = auth.register("Eve", "eve@example.com", "password").await.unwrap();
        let code = eve.verification_code.clone().unwrap();
        auth.verify_email("eve@example.com", &code).await.unwrap();
        let service = IntelligenceService::new(Arc::new(DummyModel::new()), Arc::new(MemoryStore::new()), config());
        let app = create_app(AppState::new(service, auth));

        let login = json!({ "email": "eve@example.com", "password": "password" });
        let (status, session) = send(&app, Method::POST, "/api/auth/login", Some(login)).await;
        assert_eq!(status, StatusCode::OK);
        let token = session["token"].as_str().unwrap().to_string();

        let path = format!("/api/users/{}/role", eve.id);
        let (status, body) = send_as(&app, Some(&token), Method::PUT, &path, Some(escalate)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Administrator access required");
        let (status, _) = send_as(&app, Some(&token), Method::GET, "/api/users", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_login() {
        let app = app_with(DummyModel::new(), Vec::new(), Some(root()));

        let login = json!({ "email": "root@example.com", "password": "hunter22" });
        let (status, user) = send(&app, Method::POST, "/api/auth/login", Some(login)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["role"], "admin");
        assert!(user["token"].as_str().is_some_and(|t| !t.is_empty()));

        let bad = json!({ "email": "root@example.com", "password": "nope" });
        let (status, body) = send(&app, Method::POST, "/api/auth/login", Some(bad)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }
}
