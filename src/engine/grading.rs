//! Pick grading against a game's recorded line.
//!
//! Given the final score, a game is reduced to three numbers:
//!   total_points = home + away
//!   home_margin  = home − away
//!   home_covered = home_margin > home_line
//! where `home_line` is `+spread` when the home team is the favorite and
//! `−spread` otherwise. All comparisons are strict, so a result exactly on
//! the line is a push; see [`PushRule`] for how pushes are graded.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::{BetSide, BetType, Game, Pick, PickOutcome};

/// How a spread result exactly equal to the line is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PushRule {
    /// Strict inequality only: on a push the home team has not covered, so
    /// the away side's pick is graded correct.
    #[default]
    Legacy,
    /// Both spread sides are graded incorrect on a push.
    BothLose,
}

/// A game reached grading without a complete line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("game {game_id} has no recorded {missing}")]
pub struct MissingLine {
    pub game_id: i64,
    pub missing: &'static str,
}

/// The line a game is graded against, borrowed from the game record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameLine<'a> {
    pub home_team: &'a str,
    pub away_team: &'a str,
    pub favorite: &'a str,
    pub spread: f64,
    pub over_under: f64,
}

impl<'a> GameLine<'a> {
    pub fn from_game(game: &'a Game) -> Result<Self, MissingLine> {
        let missing = |what| MissingLine {
            game_id: game.id,
            missing: what,
        };
        Ok(GameLine {
            home_team: &game.home_team,
            away_team: &game.away_team,
            favorite: game.favorite.as_deref().ok_or_else(|| missing("favorite"))?,
            spread: game.spread.ok_or_else(|| missing("spread"))?,
            over_under: game.over_under.ok_or_else(|| missing("over/under"))?,
        })
    }

    pub fn favorite_is_home(&self) -> bool {
        self.favorite == self.home_team
    }

    /// Margin the home team must exceed to cover.
    fn home_line(&self) -> f64 {
        if self.favorite_is_home() {
            self.spread
        } else {
            -self.spread
        }
    }
}

/// A final score reduced to what grading needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameResult {
    pub total_points: i64,
    pub home_margin: i64,
    pub home_covered: bool,
    /// The home margin landed exactly on the spread
    pub spread_push: bool,
}

pub fn evaluate(line: &GameLine<'_>, home_score: i32, away_score: i32) -> GameResult {
    let (home, away) = (i64::from(home_score), i64::from(away_score));
    let total_points = home + away;
    let home_margin = home - away;
    let home_line = line.home_line();
    GameResult {
        total_points,
        home_margin,
        home_covered: home_margin as f64 > home_line,
        spread_push: home_margin as f64 == home_line,
    }
}

/// Grade one wager against an evaluated result.
pub fn grade_bet(
    line: &GameLine<'_>,
    result: &GameResult,
    bet_type: BetType,
    side: BetSide,
    push_rule: PushRule,
) -> PickOutcome {
    let total = result.total_points as f64;
    let correct = match (bet_type, side) {
        (BetType::Total, BetSide::Over) => total > line.over_under,
        (BetType::Total, BetSide::Under) => total < line.over_under,
        (BetType::Spread, BetSide::Favorite | BetSide::Underdog) => {
            if result.spread_push && push_rule == PushRule::BothLose {
                false
            } else {
                let favorite_covered = if line.favorite_is_home() {
                    result.home_covered
                } else {
                    !result.home_covered
                };
                (side == BetSide::Favorite) == favorite_covered
            }
        }
        // Rejected at submission; nothing to grade.
        _ => return PickOutcome::Pending,
    };
    PickOutcome::from_correct(correct)
}

/// Grade a stored pick. Already-resolved picks keep their outcome.
pub fn grade_pick(
    line: &GameLine<'_>,
    result: &GameResult,
    pick: &Pick,
    push_rule: PushRule,
) -> PickOutcome {
    if pick.outcome.is_resolved() {
        return pick.outcome;
    }
    grade_bet(line, result, pick.bet_type, pick.bet_side, push_rule)
}
