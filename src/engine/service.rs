use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::db::models::{Game, League, LeaguePick, Pick};
use crate::db::{Database, ResolveCounts};

use super::grading::{evaluate, grade_pick, GameLine, PushRule};
use super::picks::{redact_for_viewer, validate_submission, PickError, PickSubmission};
use super::settlement::{
    compute_season_totals, compute_weekly_payouts, PayoutSettings, SeasonTotal, WeeklyPayout,
};

/// The pick'em engine: grades picks as games go final, guards pick
/// submission, and settles league payouts on demand.
#[derive(Clone)]
pub struct PickemEngine {
    db: Database,
    push_rule: PushRule,
    /// Payout settings given to newly created leagues
    default_payouts: PayoutSettings,
}

impl PickemEngine {
    pub fn new(db: Database, push_rule: PushRule, default_payouts: PayoutSettings) -> Self {
        PickemEngine {
            db,
            push_rule,
            default_payouts,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn default_payouts(&self) -> PayoutSettings {
        self.default_payouts
    }

    // ── Grading ───────────────────────────────────────────────────────────────

    /// Grade every unresolved pick on a game that just went final.
    ///
    /// A game without a complete line is skipped with a warning; its picks
    /// stay unresolved. Calling this again for the same game grades nothing
    /// new.
    pub fn grade_game(&self, game: &Game, home_score: i32, away_score: i32) -> Result<ResolveCounts> {
        let line = match GameLine::from_game(game) {
            Ok(line) => line,
            Err(missing) => {
                warn!(
                    "Skipping grading for {} @ {} (week {}): {}",
                    game.away_team, game.home_team, game.week, missing
                );
                return Ok(ResolveCounts::default());
            }
        };
        let result = evaluate(&line, home_score, away_score);
        let push_rule = self.push_rule;
        let counts = self
            .db
            .resolve_picks(game.id, |pick| grade_pick(&line, &result, pick, push_rule))?;

        if counts.total() > 0 {
            info!(
                "Graded {} @ {} ({}-{}): {} correct, {} incorrect",
                line.away_team,
                line.home_team,
                away_score,
                home_score,
                counts.correct,
                counts.incorrect
            );
        } else {
            debug!("No pending picks on game {}", game.id);
        }
        Ok(counts)
    }

    /// Grade final games that still hold unresolved picks, e.g. after a crash
    /// between recording a score and grading it. A game that fails to grade is
    /// logged and left for the next sweep. Returns the picks resolved.
    pub fn grade_pending(&self) -> Result<usize> {
        let mut resolved = 0;
        for game in self.db.list_final_games_with_pending_picks()? {
            let (Some(home), Some(away)) = (game.home_score, game.away_score) else {
                continue;
            };
            match self.grade_game(&game, home, away) {
                Ok(counts) => resolved += counts.total(),
                Err(e) => error!("Failed to grade pending picks on game {}: {:#}", game.id, e),
            }
        }
        if resolved > 0 {
            info!("Recovered {} pending pick(s) on final games", resolved);
        }
        Ok(resolved)
    }

    // ── Picks ─────────────────────────────────────────────────────────────────

    /// Validate and store a pick in its confidence slot. The checks and the
    /// write share one transaction. Returns the stored pick.
    pub fn submit_pick(
        &self,
        user_id: &str,
        submission: &PickSubmission,
        now: DateTime<Utc>,
    ) -> Result<Pick, PickError> {
        let written = self.db.write_pick_checked(
            user_id,
            submission.game_id,
            submission.week,
            submission.bet_type,
            submission.bet_side,
            submission.confidence,
            |ctx| {
                let game = ctx
                    .game
                    .as_ref()
                    .ok_or(PickError::GameNotFound(submission.game_id))?;
                validate_submission(game, &ctx.week_picks, ctx.slot_game.as_ref(), submission, now)
            },
        )?;
        let pick = written.ok_or(PickError::AlreadyGraded {
            week: submission.week,
            confidence: submission.confidence,
        })?;
        debug!(
            "User {} picked {} {} on game {} at confidence {}",
            user_id,
            pick.bet_type.as_str(),
            pick.bet_side.as_str(),
            pick.game_id,
            pick.confidence
        );
        Ok(pick)
    }

    /// Remove an unresolved pick whose game has not started.
    pub fn clear_pick(
        &self,
        user_id: &str,
        week: u32,
        confidence: u8,
        now: DateTime<Utc>,
    ) -> Result<(), PickError> {
        let pick = self
            .db
            .get_pick_slot(user_id, week, confidence)?
            .ok_or(PickError::NotFound { week, confidence })?;
        if pick.outcome.is_resolved() {
            return Err(PickError::AlreadyGraded { week, confidence });
        }
        if let Some(game) = self.db.get_game(pick.game_id)? {
            if game.has_started(now) {
                return Err(PickError::GameStarted(game.id));
            }
        }
        if !self.db.delete_pick(user_id, week, confidence)? {
            return Err(PickError::AlreadyGraded { week, confidence });
        }
        Ok(())
    }

    /// The week's picks across the viewer's league, with other members'
    /// choices hidden until kickoff. Empty when the viewer has no league.
    pub fn league_picks(
        &self,
        viewer_id: &str,
        week: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaguePick>> {
        let Some(league) = self.db.league_for_user(viewer_id)? else {
            return Ok(Vec::new());
        };
        let picks = self.db.list_league_week_picks(league.id, week)?;
        Ok(redact_for_viewer(picks, viewer_id, now))
    }

    // ── Settlement ────────────────────────────────────────────────────────────

    pub fn weekly_payouts(&self, league: &League, week: u32) -> Result<Vec<WeeklyPayout>> {
        let members = self.db.list_members(league.id)?;
        let picks: Vec<Pick> = self
            .db
            .list_league_picks(league.id)?
            .into_iter()
            .filter(|p| p.week == week)
            .collect();
        Ok(compute_weekly_payouts(
            week,
            &members,
            &picks,
            payout_settings(league),
        ))
    }

    /// Season-to-date totals over every week that has games.
    pub fn season_totals(&self, league: &League) -> Result<Vec<SeasonTotal>> {
        let weeks = self.db.list_weeks()?;
        let members = self.db.list_members(league.id)?;
        let picks = self.db.list_league_picks(league.id)?;
        Ok(compute_season_totals(
            &weeks,
            &members,
            &picks,
            payout_settings(league),
        ))
    }
}

pub fn payout_settings(league: &League) -> PayoutSettings {
    PayoutSettings {
        dollar_per_point: league.dollar_per_point,
        weekly_bonus: league.weekly_bonus,
    }
}
