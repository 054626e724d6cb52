//! Typed view of The Odds API v4 payloads and their conversion into game
//! records. Provider JSON is decoded event by event so one malformed event
//! never hides the rest of the slate.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::db::models::ScheduledGame;

use super::teams::{short_name, SeasonCalendar};

#[derive(Debug, Clone, Deserialize)]
pub struct OddsEvent {
    pub id: String,
    pub commence_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bookmaker {
    pub key: String,
    #[serde(default)]
    pub markets: Vec<Market>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Market {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Outcome {
    pub name: String,
    #[serde(default)]
    pub point: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreEvent {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub scores: Option<Vec<TeamScore>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamScore {
    pub name: String,
    pub score: RawScore,
}

/// Scores arrive as strings, occasionally as numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawScore {
    Number(i64),
    Text(String),
}

impl RawScore {
    /// Points scored; negative or absurdly large values are rejected.
    fn value(&self) -> Option<u16> {
        match self {
            RawScore::Number(n) => u16::try_from(*n).ok(),
            RawScore::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// A completed game's score keyed by provider id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalScore {
    pub external_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("event {0} has no bookmakers")]
    NoBookmaker(String),

    #[error("event {0} has no spread for the home team")]
    NoSpread(String),

    #[error("event {0} has no over/under total")]
    NoTotal(String),

    #[error("event {event_id} has no valid score for {team}")]
    NoScore { event_id: String, team: String },
}

/// Decode a JSON array element by element, skipping (and logging) entries
/// that do not match `T`.
pub fn decode_events<T: DeserializeOwned>(raw: serde_json::Value, what: &str) -> Result<Vec<T>> {
    let serde_json::Value::Array(items) = raw else {
        bail!("Invalid {what} response from odds provider: expected an array");
    };
    let mut events = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value(item) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Skipping malformed {} event: {}", what, e),
        }
    }
    Ok(events)
}

impl OddsEvent {
    fn bookmaker(&self, preferred: &str) -> Option<&Bookmaker> {
        self.bookmakers
            .iter()
            .find(|b| b.key == preferred)
            .or_else(|| self.bookmakers.first())
    }

    /// Reduce the event to a game line using the preferred bookmaker (or the
    /// first one listed). A negative home spread makes the home team the
    /// favorite; the stored spread is always the magnitude.
    pub fn to_scheduled_game(
        &self,
        preferred_bookmaker: &str,
        calendar: &SeasonCalendar,
    ) -> Result<ScheduledGame, PayloadError> {
        let bookmaker = self
            .bookmaker(preferred_bookmaker)
            .ok_or_else(|| PayloadError::NoBookmaker(self.id.clone()))?;
        let home_team = short_name(&self.home_team);
        let away_team = short_name(&self.away_team);

        let home_spread = bookmaker
            .market("spreads")
            .and_then(|m| m.outcomes.iter().find(|o| short_name(&o.name) == home_team))
            .and_then(|o| o.point)
            .ok_or_else(|| PayloadError::NoSpread(self.id.clone()))?;
        let total = bookmaker
            .market("totals")
            .and_then(|m| m.outcomes.iter().find(|o| o.name == "Over"))
            .and_then(|o| o.point)
            .ok_or_else(|| PayloadError::NoTotal(self.id.clone()))?;

        let favorite = if home_spread < 0.0 { home_team } else { away_team };
        Ok(ScheduledGame {
            external_id: self.id.clone(),
            week: calendar.week_for(self.commence_time),
            away_team: away_team.to_string(),
            home_team: home_team.to_string(),
            favorite: favorite.to_string(),
            spread: home_spread.abs(),
            over_under: total,
            start_time: self.commence_time,
        })
    }
}

impl Bookmaker {
    fn market(&self, key: &str) -> Option<&Market> {
        self.markets.iter().find(|m| m.key == key)
    }
}

impl ScoreEvent {
    /// The final score, or `None` while the game is not completed.
    pub fn final_score(&self) -> Result<Option<FinalScore>, PayloadError> {
        if !self.completed {
            return Ok(None);
        }
        let home_team = short_name(&self.home_team);
        let away_team = short_name(&self.away_team);
        let score_for = |team: &str| {
            self.scores
                .as_deref()
                .unwrap_or_default()
                .iter()
                .find(|s| short_name(&s.name) == team)
                .and_then(|s| s.score.value())
                .map(i32::from)
                .ok_or_else(|| PayloadError::NoScore {
                    event_id: self.id.clone(),
                    team: team.to_string(),
                })
        };
        Ok(Some(FinalScore {
            external_id: self.id.clone(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_score: score_for(home_team)?,
            away_score: score_for(away_team)?,
        }))
    }
}
