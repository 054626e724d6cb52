use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::models::{Game, ScoreRecord};
use crate::engine::PickemEngine;

use super::provider::OddsProvider;
use super::teams::SeasonCalendar;

/// Pulls lines and scores from an [`OddsProvider`] into the game store and
/// grades picks as games go final.
pub struct Ingestor {
    provider: Arc<dyn OddsProvider>,
    engine: PickemEngine,
    calendar: SeasonCalendar,
    bookmaker: String,
    /// Lines stop updating this long before kickoff
    line_lock: Duration,
    scores_days_from: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsRefresh {
    /// Games inserted or re-lined
    pub games_updated: usize,
    pub games_added: usize,
    /// Games inside the line lock window, left untouched
    pub games_locked: usize,
    /// Parsed games per week, locked ones included
    pub week_summary: BTreeMap<u32, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoresRefresh {
    pub games_updated: usize,
    pub picks_graded: usize,
}

/// An admin-entered final score, matched to a game by week and teams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualScore {
    pub week: u32,
    pub away: String,
    pub home: String,
    pub away_score: u16,
    pub home_score: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualScoresResult {
    pub games_updated: usize,
    pub games_inserted: usize,
    pub picks_graded: usize,
}

impl Ingestor {
    pub fn new(
        provider: Arc<dyn OddsProvider>,
        engine: PickemEngine,
        calendar: SeasonCalendar,
        bookmaker: &str,
        line_lock: Duration,
        scores_days_from: u32,
    ) -> Self {
        Ingestor {
            provider,
            engine,
            calendar,
            bookmaker: bookmaker.to_string(),
            line_lock,
            scores_days_from,
        }
    }

    pub fn calendar(&self) -> &SeasonCalendar {
        &self.calendar
    }

    /// Fetch current lines and upsert every game that is not yet locked.
    pub async fn refresh_odds(&self, now: DateTime<Utc>) -> Result<OddsRefresh> {
        let events = self.provider.fetch_odds().await?;
        let cutoff = now + self.line_lock;
        let mut summary = OddsRefresh::default();

        for event in &events {
            let game = match event.to_scheduled_game(&self.bookmaker, &self.calendar) {
                Ok(game) => game,
                Err(e) => {
                    debug!("Skipping event without usable lines: {}", e);
                    continue;
                }
            };
            *summary.week_summary.entry(game.week).or_insert(0) += 1;

            if game.start_time <= cutoff {
                summary.games_locked += 1;
                continue;
            }
            if self.engine.db().upsert_scheduled_game(&game)? {
                summary.games_added += 1;
            }
            summary.games_updated += 1;
        }

        info!(
            "[{}] Odds refresh: {} event(s), {} game(s) updated ({} new), {} locked",
            self.provider.name(),
            events.len(),
            summary.games_updated,
            summary.games_added,
            summary.games_locked
        );
        Ok(summary)
    }

    /// Record final scores for completed games and grade their picks.
    pub async fn refresh_scores(&self) -> Result<ScoresRefresh> {
        let events = self.provider.fetch_scores(self.scores_days_from).await?;
        let mut summary = ScoresRefresh::default();

        for event in &events {
            let score = match event.final_score() {
                Ok(Some(score)) => score,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Ignoring completed event: {}", e);
                    continue;
                }
            };
            let record = self.engine.db().record_final_score(
                &score.external_id,
                score.home_score,
                score.away_score,
            )?;
            if let Some(graded) = self.apply_score(record, score.home_score, score.away_score)? {
                summary.games_updated += 1;
                summary.picks_graded += graded;
            }
        }

        info!(
            "[{}] Scores refresh: {} event(s), {} game(s) went final, {} pick(s) graded",
            self.provider.name(),
            events.len(),
            summary.games_updated,
            summary.picks_graded
        );
        Ok(summary)
    }

    /// Apply admin-entered scores. Known games are scored and graded; unknown
    /// matchups are inserted as final games without lines.
    pub fn record_manual_scores(
        &self,
        scores: &[ManualScore],
        now: DateTime<Utc>,
    ) -> Result<ManualScoresResult> {
        let mut result = ManualScoresResult::default();
        for s in scores {
            let (home_score, away_score) = (i32::from(s.home_score), i32::from(s.away_score));
            let record = self.engine.db().record_final_score_by_matchup(
                s.week,
                &s.home,
                &s.away,
                home_score,
                away_score,
            )?;
            if matches!(record, ScoreRecord::NotFound) {
                let start_time = self.calendar.week_start(s.week).min(now);
                self.engine.db().insert_final_game(
                    s.week,
                    &s.away,
                    &s.home,
                    away_score,
                    home_score,
                    start_time,
                )?;
                result.games_inserted += 1;
                continue;
            }
            if let Some(graded) = self.apply_score(record, home_score, away_score)? {
                result.games_updated += 1;
                result.picks_graded += graded;
            }
        }
        info!(
            "Manual scores: {} updated, {} inserted, {} pick(s) graded",
            result.games_updated, result.games_inserted, result.picks_graded
        );
        Ok(result)
    }

    /// Grade on the null → final transition. Returns the picks graded, or
    /// `None` when the score was not newly recorded.
    fn apply_score(&self, record: ScoreRecord, home: i32, away: i32) -> Result<Option<usize>> {
        match record {
            ScoreRecord::Recorded(game) => {
                let counts = self.engine.grade_game(&game, home, away)?;
                Ok(Some(counts.total()))
            }
            ScoreRecord::AlreadyFinal(game) => {
                if stored_score(&game) != (Some(home), Some(away)) {
                    warn!(
                        "Ignoring changed score for final game {} ({} @ {}): stored {:?}-{:?}, got {}-{}",
                        game.id,
                        game.away_team,
                        game.home_team,
                        game.away_score,
                        game.home_score,
                        away,
                        home
                    );
                }
                Ok(None)
            }
            ScoreRecord::NotFound => Ok(None),
        }
    }
}

fn stored_score(game: &Game) -> (Option<i32>, Option<i32>) {
    (game.home_score, game.away_score)
}
