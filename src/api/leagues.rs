use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::models::{League, User, WeekPoints};
use crate::engine::leagues::LeaguePreview;
use crate::engine::settlement::{SeasonTotal, WeeklyPayout};

use super::{ApiError, AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLeagueRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLeagueRequest {
    #[serde(default)]
    pub invite_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeagueRequest {
    pub name: String,
    pub dollar_per_point: f64,
    pub weekly_bonus: f64,
}

fn find_league(state: &AppState, league_id: i64) -> Result<League, ApiError> {
    state
        .engine
        .db()
        .league_by_id(league_id)?
        .ok_or_else(|| ApiError::NotFound("League not found".into()))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.id.trim().is_empty() {
        return Err(ApiError::BadRequest("User id required".into()));
    }
    state.engine.login(&User {
        id: req.id,
        email: req.email,
        name: req.name,
    })?;
    Ok(Json(json!({ "ok": true })))
}

/// GET /api/my-league
pub async fn my_league(
    State(state): State<Arc<AppState>>,
    caller: Option<Caller>,
) -> Result<Json<Value>, ApiError> {
    let Some(Caller(user_id)) = caller else {
        return Ok(Json(json!({ "league": null })));
    };
    match state.engine.my_league(&user_id)? {
        Some(mine) => Ok(Json(serde_json::to_value(mine).map_err(anyhow::Error::from)?)),
        None => Ok(Json(json!({ "league": null }))),
    }
}

/// POST /api/leagues
pub async fn create_league(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Json(req): Json<CreateLeagueRequest>,
) -> Result<Json<Value>, ApiError> {
    let league = state.engine.create_league(&user_id, &req.name)?;
    Ok(Json(json!({
        "ok": true,
        "leagueId": league.id,
        "inviteCode": league.invite_code,
    })))
}

/// POST /api/leagues/join
pub async fn join_league(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Json(req): Json<JoinLeagueRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.invite_code.trim().is_empty() {
        return Err(ApiError::BadRequest("Invite code required".into()));
    }
    let league = state.engine.join_league(&user_id, &req.invite_code)?;
    Ok(Json(json!({
        "ok": true,
        "leagueId": league.id,
        "leagueName": league.name,
    })))
}

/// GET /api/leagues/preview/:code
pub async fn preview_league(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<LeaguePreview>, ApiError> {
    Ok(Json(state.engine.preview_league(&code)?))
}

/// PUT /api/leagues/:id
pub async fn update_league(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(league_id): Path<i64>,
    Json(req): Json<UpdateLeagueRequest>,
) -> Result<Json<League>, ApiError> {
    let league = state.engine.update_league(
        &user_id,
        league_id,
        &req.name,
        req.dollar_per_point,
        req.weekly_bonus,
    )?;
    Ok(Json(league))
}

/// DELETE /api/leagues/:id/members/:member_id
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path((league_id, member_id)): Path<(i64, String)>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.engine.remove_member(&user_id, league_id, &member_id)?;
    Ok(Json(json!({ "ok": true, "removed": removed })))
}

/// GET /api/leagues/:id/payouts/:week
pub async fn weekly_payouts(
    State(state): State<Arc<AppState>>,
    Path((league_id, week)): Path<(i64, u32)>,
) -> Result<Json<Vec<WeeklyPayout>>, ApiError> {
    let league = find_league(&state, league_id)?;
    Ok(Json(state.engine.weekly_payouts(&league, week)?))
}

/// GET /api/leagues/:id/season
pub async fn season_totals(
    State(state): State<Arc<AppState>>,
    Path(league_id): Path<i64>,
) -> Result<Json<Vec<SeasonTotal>>, ApiError> {
    let league = find_league(&state, league_id)?;
    Ok(Json(state.engine.season_totals(&league)?))
}

/// GET /api/leaderboard/:league_id
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Path(league_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let league = find_league(&state, league_id)?;
    let scores: Vec<WeekPoints> = state.engine.db().leaderboard(league_id)?;
    Ok(Json(json!({ "league": league, "scores": scores })))
}
