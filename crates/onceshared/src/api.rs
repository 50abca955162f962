//! Storage service HTTP API
//!
//! ```text
//! POST /secret        store ciphertext (bearer token required in token mode)
//! GET  /secret/{id}   fetch-and-burn; 404 for missing, expired, and viewed alike
//! POST /login         exchange admin credentials for a bearer token
//! GET  /healthz
//! ```

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use onceshare_auth::{AuthMode, Authorizer};
use onceshare_core::api::{
    CreateSecretRequest, CreateSecretResponse, ErrorBody, LoginRequest, LoginResponse,
    LOGIN_PATH, SECRET_PATH,
};
use onceshare_core::config::ServerConfig;
use onceshare_core::error::SECRET_UNAVAILABLE;
use onceshare_core::{unix_now, SecretId, ShareError};
use onceshare_store::{MemoryStore, SecretStore};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::metrics::{healthz_handler, ShareMetrics};

/// Request validation bounds taken from `[server]`.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_length: usize,
    pub force_onetime_secrets: bool,
    pub max_expiry_secs: u64,
}

impl From<&ServerConfig> for Limits {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            max_length: cfg.max_length,
            force_onetime_secrets: cfg.force_onetime_secrets,
            max_expiry_secs: cfg.max_expiry_secs,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub auth: Arc<Authorizer>,
    pub metrics: ShareMetrics,
    pub limits: Limits,
}

pub fn router(state: AppState) -> Router {
    // Ciphertext travels base64-encoded inside JSON.
    let body_limit = state.limits.max_length / 3 * 4 + 64 * 1024;

    Router::new()
        .route(SECRET_PATH, post(create_secret))
        .route(&format!("{SECRET_PATH}/{{id}}"), get(fetch_secret))
        .route(LOGIN_PATH, post(login))
        .route("/healthz", get(healthz_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiFailure {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ShareError> for ApiFailure {
    fn from(err: ShareError) -> Self {
        match err {
            ShareError::SecretNotFound => ApiFailure::NotFound(SECRET_UNAVAILABLE.into()),
            ShareError::Auth(message) => ApiFailure::Unauthorized(message),
            ShareError::PayloadTooLarge { .. } => ApiFailure::BadRequest(err.user_message()),
            other => ApiFailure::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiFailure::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiFailure::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            ApiFailure::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiFailure::Internal(m) => {
                tracing::error!("request failed: {m}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn validate(req: &CreateSecretRequest, limits: &Limits) -> Result<(), ApiFailure> {
    let size = req.payload.ciphertext.len();
    if size > limits.max_length {
        return Err(ApiFailure::BadRequest(format!(
            "secret is too large ({size} bytes, maximum {})",
            limits.max_length
        )));
    }
    if req.max_views == 0 {
        return Err(ApiFailure::BadRequest("max_views must be at least 1".into()));
    }
    if limits.force_onetime_secrets && req.max_views != 1 {
        return Err(ApiFailure::BadRequest(
            "this server only accepts one-time secrets".into(),
        ));
    }
    if req.expiration == 0 || req.expiration > limits.max_expiry_secs {
        return Err(ApiFailure::BadRequest(format!(
            "expiration must be between 1 and {} seconds",
            limits.max_expiry_secs
        )));
    }
    Ok(())
}

async fn create_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateSecretRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let now = unix_now();
    let principal = state.auth.authorize(bearer_token(&headers), now)?;
    validate(&req, &state.limits)?;

    let expires_at = now.saturating_add(req.expiration);
    let id = state
        .store
        .create(req.payload, expires_at, req.max_views)
        .await?;
    state.metrics.created.inc();

    info!(
        by = principal.as_ref().map(|p| p.name.as_str()).unwrap_or("-"),
        views = req.max_views,
        expiration = req.expiration,
        "secret stored"
    );
    Ok((StatusCode::CREATED, Json(CreateSecretResponse { id })))
}

async fn fetch_secret(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let result = match id.parse::<SecretId>() {
        Ok(id) => state.store.fetch_and_burn(&id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(payload) => {
            state.metrics.retrieved.inc();
            debug!("secret handed out");
            Ok(([(header::CACHE_CONTROL, "no-store")], Json(payload)))
        }
        Err(e) => {
            if matches!(e, ShareError::SecretNotFound) {
                state.metrics.missing.inc();
            }
            Err(e.into())
        }
    }
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    if state.auth.mode() == AuthMode::None {
        return Err(ApiFailure::NotFound("login is disabled".into()));
    }

    let auth = state.auth.clone();
    let username = req.username.clone();
    let password = SecretString::from(req.password);
    let result = tokio::task::spawn_blocking(move || auth.login(&username, &password, unix_now()))
        .await
        .map_err(|e| ApiFailure::Internal(format!("login task: {e}")))?;

    match result {
        Ok(token) => {
            info!(username = %req.username, "login");
            Ok(Json(LoginResponse { token }))
        }
        Err(e) => {
            state.metrics.login_failures.inc();
            warn!(username = %req.username, "login rejected");
            Err(e.into())
        }
    }
}
