use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::models::{LeaguePick, Pick};
use crate::engine::picks::PickSubmission;

use super::{ApiError, AppState, Caller};

/// POST /api/picks
pub async fn submit_pick(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Json(submission): Json<PickSubmission>,
) -> Result<Json<Pick>, ApiError> {
    let pick = state.engine.submit_pick(&user_id, &submission, Utc::now())?;
    Ok(Json(pick))
}

/// GET /api/picks/:week. Anonymous callers get an empty list.
pub async fn league_picks(
    State(state): State<Arc<AppState>>,
    caller: Option<Caller>,
    Path(week): Path<u32>,
) -> Result<Json<Vec<LeaguePick>>, ApiError> {
    let Some(Caller(user_id)) = caller else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(state.engine.league_picks(&user_id, week, Utc::now())?))
}

pub async fn clear_pick(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path((week, confidence)): Path<(u32, u8)>,
) -> Result<Json<Value>, ApiError> {
    state
        .engine
        .clear_pick(&user_id, week, confidence, Utc::now())?;
    Ok(Json(json!({ "ok": true })))
}
