use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use epm_core::{Category, Continent, CorporateProfile, Language, NewsQuery, Role};
use epm_pipeline::{broadcast_programs, AuthError};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::AppState;

/// `{ "error": message }` with a status derived from the auth failure.
pub struct ApiError(AuthError);

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AuthError::InvalidCredentials
            | AuthError::NotVerified
            | AuthError::InvalidCode
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::Repository(e) => {
                error!(error = %e, "User repository failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Token from `Authorization: Bearer <token>`.
fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> impl IntoResponse {
    Json(state.service.fetch_news(&query).await)
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub offset: usize,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    Json(
        state
            .service
            .search_news(&params.q, params.language, params.offset)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseParams {
    #[serde(default)]
    pub continent: Continent,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub sub_category: Option<String>,
}

pub async fn market_pulse(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PulseParams>,
) -> impl IntoResponse {
    Json(
        state
            .service
            .fetch_market_pulse(
                params.continent,
                params.category,
                params.language,
                params.sub_category.as_deref(),
            )
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct RiskRequest {
    pub profile: CorporateProfile,
    #[serde(default)]
    pub language: Language,
}

pub async fn corporate_risk(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RiskRequest>,
) -> impl IntoResponse {
    Json(
        state
            .service
            .calculate_corporate_risk(&request.profile, request.language)
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct ValidationRequest {
    pub idea: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub language: Language,
}

pub async fn validate_idea(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidationRequest>,
) -> impl IntoResponse {
    Json(
        state
            .service
            .validate_business_idea(&request.idea, &request.region, request.language)
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub language: Language,
}

/// One SSE event per chunk; each event's data is the chunk as a JSON string.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = state
        .service
        .ask_stream(&request.query, request.language)
        .map(|chunk| Event::default().json_data(chunk));
    Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct BroadcastParams {
    #[serde(default)]
    pub continent: Continent,
}

pub async fn broadcasts(Query(params): Query<BroadcastParams>) -> impl IntoResponse {
    Json(broadcast_programs(params.continent))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth.sign_in(&request.email, &request.password).await?;
    info!(user_id = %session.user.id, "👤 User signed in");
    Ok(Json(session))
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = bearer(&headers) {
        state.auth.sign_out(token).await;
    }
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .register(&request.name, &request.email, &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.auth.verify_email(&request.email, &request.code).await?;
    Ok(Json(user))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.require_admin(bearer(&headers)).await?;
    Ok(Json(state.auth.list_users().await?))
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<RoleUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.require_admin(bearer(&headers)).await?;
    if !state.auth.update_role(&id, update.role).await? {
        return Err(AuthError::UserNotFound.into());
    }
    Ok(Json(json!({ "id": id, "role": update.role })))
}
