use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::{BetSide, BetType, Game, LeaguePick, Pick};

pub const MIN_CONFIDENCE: u8 = 1;
pub const MAX_CONFIDENCE: u8 = 10;

/// Rejections at the pick store boundary.
#[derive(Debug, Error)]
pub enum PickError {
    #[error("Game not found: {0}")]
    GameNotFound(i64),

    #[error("Game {0} already started")]
    GameStarted(i64),

    #[error("Confidence must be between {MIN_CONFIDENCE} and {MAX_CONFIDENCE}, got {0}")]
    InvalidConfidence(u8),

    #[error("Pick is for week {pick_week} but the game is in week {game_week}")]
    WeekMismatch { pick_week: u32, game_week: u32 },

    #[error("'{side}' is not a side of a {bet_type} bet")]
    InvalidSide {
        bet_type: &'static str,
        side: &'static str,
    },

    #[error("Already holding a {bet_type} pick on game {game_id} at confidence {confidence}")]
    DuplicateBet {
        game_id: i64,
        bet_type: &'static str,
        confidence: u8,
    },

    #[error("Pick at confidence {confidence} in week {week} is already graded")]
    AlreadyGraded { week: u32, confidence: u8 },

    #[error("No pick at confidence {confidence} in week {week}")]
    NotFound { week: u32, confidence: u8 },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A pick as submitted by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickSubmission {
    pub game_id: i64,
    pub week: u32,
    #[serde(rename = "pickType")]
    pub bet_type: BetType,
    #[serde(rename = "pickValue")]
    pub bet_side: BetSide,
    pub confidence: u8,
}

/// Check a submission against the game it targets and the user's current
/// picks for that week.
///
/// Replacing a slot is allowed while it is unresolved and the game it
/// currently holds has not kicked off. `slot_game` is that held game; the
/// slot being replaced does not count as a duplicate of itself.
pub fn validate_submission(
    game: &Game,
    week_picks: &[Pick],
    slot_game: Option<&Game>,
    submission: &PickSubmission,
    now: DateTime<Utc>,
) -> Result<(), PickError> {
    if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&submission.confidence) {
        return Err(PickError::InvalidConfidence(submission.confidence));
    }
    if !submission.bet_type.accepts(submission.bet_side) {
        return Err(PickError::InvalidSide {
            bet_type: submission.bet_type.as_str(),
            side: submission.bet_side.as_str(),
        });
    }
    if game.has_started(now) {
        return Err(PickError::GameStarted(game.id));
    }
    if submission.week != game.week {
        return Err(PickError::WeekMismatch {
            pick_week: submission.week,
            game_week: game.week,
        });
    }

    for pick in week_picks.iter().filter(|p| p.week == submission.week) {
        if pick.confidence == submission.confidence {
            if pick.outcome.is_resolved() {
                return Err(PickError::AlreadyGraded {
                    week: pick.week,
                    confidence: pick.confidence,
                });
            }
            if let Some(held) = slot_game.filter(|g| g.id == pick.game_id) {
                if held.has_started(now) {
                    return Err(PickError::GameStarted(held.id));
                }
            }
            continue;
        }
        if pick.game_id == submission.game_id && pick.bet_type == submission.bet_type {
            return Err(PickError::DuplicateBet {
                game_id: pick.game_id,
                bet_type: pick.bet_type.as_str(),
                confidence: pick.confidence,
            });
        }
    }
    Ok(())
}

/// Hide the game and bet of other users' picks until their game kicks off.
/// Confidence, outcome and owner stay visible.
pub fn redact_for_viewer(
    picks: Vec<LeaguePick>,
    viewer_id: &str,
    now: DateTime<Utc>,
) -> Vec<LeaguePick> {
    picks
        .into_iter()
        .map(|mut pick| {
            if pick.user_id != viewer_id && pick.start_time > now {
                pick.game_id = None;
                pick.bet_type = None;
                pick.bet_side = None;
            }
            pick
        })
        .collect()
}
