use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::models::Game;
use crate::odds::ingest::{ManualScoresResult, OddsRefresh, ScoresRefresh};
use crate::odds::ManualScore;

use super::{ApiError, AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct ManualScoresRequest {
    #[serde(default)]
    pub scores: Vec<ManualScore>,
}

pub async fn current_week(State(state): State<Arc<AppState>>) -> Json<Value> {
    let week = state.ingestor.calendar().week_for(Utc::now());
    Json(json!({ "week": week }))
}

pub async fn weeks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<u32>>, ApiError> {
    Ok(Json(state.engine.db().list_weeks()?))
}

pub async fn games(
    State(state): State<Arc<AppState>>,
    Path(week): Path<u32>,
) -> Result<Json<Vec<Game>>, ApiError> {
    Ok(Json(state.engine.db().list_games(week)?))
}

/// POST /api/fetch-odds: pull lines from the provider now.
pub async fn fetch_odds(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OddsRefresh>, ApiError> {
    Ok(Json(state.ingestor.refresh_odds(Utc::now()).await?))
}

/// POST /api/fetch-scores: pull recent scores and grade newly final games.
pub async fn fetch_scores(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScoresRefresh>, ApiError> {
    Ok(Json(state.ingestor.refresh_scores().await?))
}

/// POST /api/admin/scores
pub async fn manual_scores(
    State(state): State<Arc<AppState>>,
    Caller(_user_id): Caller,
    Json(req): Json<ManualScoresRequest>,
) -> Result<Json<ManualScoresResult>, ApiError> {
    if req.scores.is_empty() {
        return Err(ApiError::BadRequest("No scores supplied".into()));
    }
    let result = state.ingestor.record_manual_scores(&req.scores, Utc::now())?;
    Ok(Json(result))
}
