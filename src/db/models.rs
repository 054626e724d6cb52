use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A registered user, as supplied by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// A pick'em league and its payout parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    pub id: i64,
    pub name: String,
    pub invite_code: String,
    pub admin_id: String,
    /// Dollars won/lost per point above/below the weekly average
    pub dollar_per_point: f64,
    /// Amount each non-winner pays into the weekly bonus pool
    pub weekly_bonus: f64,
}

/// A league member as listed in the league view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// A scheduled NFL game with its betting lines and (once final) its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub week: u32,
    pub away_team: String,
    pub home_team: String,
    /// Short name of the favored team; always the home or the away team
    pub favorite: Option<String>,
    /// Points the favorite must cover (non-negative magnitude)
    pub spread: Option<f64>,
    pub over_under: Option<f64>,
    pub start_time: DateTime<Utc>,
    pub away_score: Option<i32>,
    pub home_score: Option<i32>,
    /// Odds provider event id, used to dedupe re-ingested games
    pub external_id: Option<String>,
}

impl Game {
    /// A game is final once both scores are recorded.
    pub fn is_final(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }
}

/// Line snapshot for a not-yet-started game, as produced by odds ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledGame {
    pub external_id: String,
    pub week: u32,
    pub away_team: String,
    pub home_team: String,
    pub favorite: String,
    pub spread: f64,
    pub over_under: f64,
    pub start_time: DateTime<Utc>,
}

/// Result of persisting a final score onto a game.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreRecord {
    /// Scores moved from unset to the given values; the game is now final
    Recorded(Game),
    /// The game was already final; stored scores are left untouched
    AlreadyFinal(Game),
    NotFound,
}

/// Kind of wager a pick makes on a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Spread,
    Total,
}

/// Which side of the wager was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BetSide {
    #[serde(rename = "fav")]
    Favorite,
    #[serde(rename = "dog")]
    Underdog,
    #[serde(rename = "over")]
    Over,
    #[serde(rename = "under")]
    Under,
}

impl BetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Spread => "spread",
            BetType::Total => "total",
        }
    }

    /// Whether `side` is one of the two sides of this bet type.
    pub fn accepts(&self, side: BetSide) -> bool {
        matches!(
            (self, side),
            (BetType::Spread, BetSide::Favorite | BetSide::Underdog)
                | (BetType::Total, BetSide::Over | BetSide::Under)
        )
    }
}

impl BetSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetSide::Favorite => "fav",
            BetSide::Underdog => "dog",
            BetSide::Over => "over",
            BetSide::Under => "under",
        }
    }
}

/// Grading state of a pick. Moves from `Pending` to a terminal value once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickOutcome {
    #[default]
    Pending,
    Correct,
    Incorrect,
}

impl PickOutcome {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, PickOutcome::Pending)
    }

    pub fn from_correct(correct: bool) -> Self {
        if correct {
            PickOutcome::Correct
        } else {
            PickOutcome::Incorrect
        }
    }
}

/// One user's wager in one confidence slot of one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub id: i64,
    pub user_id: String,
    pub game_id: i64,
    pub week: u32,
    pub bet_type: BetType,
    pub bet_side: BetSide,
    /// 1–10, unique per (user, week); awarded as points when correct
    pub confidence: u8,
    pub outcome: PickOutcome,
}

/// A league pick joined with its owner and game start, as shown to a viewer.
/// Game and bet details are `None` when hidden from the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaguePick {
    pub id: i64,
    pub user_id: String,
    pub user_name: Option<String>,
    pub game_id: Option<i64>,
    pub week: u32,
    pub bet_type: Option<BetType>,
    pub bet_side: Option<BetSide>,
    pub confidence: u8,
    pub outcome: PickOutcome,
    pub start_time: DateTime<Utc>,
}

/// Points scored by one member in one week (leaderboard row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekPoints {
    pub id: String,
    pub name: Option<String>,
    /// `None` for members without any picks yet
    pub week: Option<u32>,
    pub points: u32,
}

// ── SQL conversions ───────────────────────────────────────────────────────────

impl ToSql for PickOutcome {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            PickOutcome::Pending => ToSqlOutput::from(rusqlite::types::Null),
            PickOutcome::Correct => ToSqlOutput::from(1i64),
            PickOutcome::Incorrect => ToSqlOutput::from(0i64),
        })
    }
}

impl FromSql for PickOutcome {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(PickOutcome::Pending),
            ValueRef::Integer(0) => Ok(PickOutcome::Incorrect),
            ValueRef::Integer(1) => Ok(PickOutcome::Correct),
            ValueRef::Integer(other) => Err(FromSqlError::OutOfRange(other)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for BetType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BetType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "spread" => Ok(BetType::Spread),
            "total" => Ok(BetType::Total),
            other => Err(FromSqlError::Other(
                format!("unknown pick_type '{other}'").into(),
            )),
        }
    }
}

impl ToSql for BetSide {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BetSide {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "fav" => Ok(BetSide::Favorite),
            "dog" => Ok(BetSide::Underdog),
            "over" => Ok(BetSide::Over),
            "under" => Ok(BetSide::Under),
            other => Err(FromSqlError::Other(
                format!("unknown pick_value '{other}'").into(),
            )),
        }
    }
}
