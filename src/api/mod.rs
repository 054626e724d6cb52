pub mod games;
pub mod leagues;
pub mod picks;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::error;

use crate::engine::leagues::LeagueError;
use crate::engine::picks::PickError;
use crate::engine::PickemEngine;
use crate::odds::Ingestor;

/// Header carrying the caller's user id, as issued by the identity provider.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub engine: PickemEngine,
    pub ingestor: Arc<Ingestor>,
}

/// Build the Axum router for the league API, optionally serving a built
/// frontend for every non-API path.
pub fn router(state: AppState, static_dir: Option<&str>) -> Router {
    let api = Router::new()
        .route("/api/auth/login", post(leagues::login))
        .route("/api/my-league", get(leagues::my_league))
        .route("/api/leagues", post(leagues::create_league))
        .route("/api/leagues/join", post(leagues::join_league))
        .route("/api/leagues/preview/:code", get(leagues::preview_league))
        .route("/api/leagues/:id", put(leagues::update_league))
        .route(
            "/api/leagues/:id/members/:member_id",
            delete(leagues::remove_member),
        )
        .route("/api/leagues/:id/payouts/:week", get(leagues::weekly_payouts))
        .route("/api/leagues/:id/season", get(leagues::season_totals))
        .route("/api/leaderboard/:league_id", get(leagues::leaderboard))
        .route("/api/current-week", get(games::current_week))
        .route("/api/weeks", get(games::weeks))
        .route("/api/games/:week", get(games::games))
        .route("/api/fetch-odds", post(games::fetch_odds))
        .route("/api/fetch-scores", post(games::fetch_scores))
        .route("/api/admin/scores", post(games::manual_scores))
        .route("/api/picks", post(picks::submit_pick))
        .route("/api/picks/:week", get(picks::league_picks))
        .route("/api/picks/:week/:confidence", delete(picks::clear_pick))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state));

    match static_dir {
        Some(dir) => {
            let index = Path::new(dir).join("index.html");
            api.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => api,
    }
}

/// The authenticated caller, taken from the `x-user-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Caller(id.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

/// Errors returned to HTTP clients as `{ "error": "..." }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not logged in")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(e) = &self {
            error!("Request failed: {:#}", e);
        }
        let body = Json(json!({ "error": format!("{:#}", self) }));
        (status, body).into_response()
    }
}

impl From<PickError> for ApiError {
    fn from(err: PickError) -> Self {
        match err {
            PickError::Storage(e) => ApiError::Internal(e),
            PickError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<LeagueError> for ApiError {
    fn from(err: LeagueError) -> Self {
        match err {
            LeagueError::Storage(e) => ApiError::Internal(e),
            LeagueError::InvalidInviteCode | LeagueError::NotFound => {
                ApiError::NotFound(err.to_string())
            }
            LeagueError::NotAdmin => ApiError::Forbidden(err.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}
