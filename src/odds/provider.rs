use anyhow::Result;
use async_trait::async_trait;

use super::payload::{OddsEvent, ScoreEvent};

/// Source of betting lines and final scores.
#[async_trait]
pub trait OddsProvider: Send + Sync {
    /// Upcoming events with their bookmaker lines.
    async fn fetch_odds(&self) -> Result<Vec<OddsEvent>>;

    /// Recent and in-progress events, looking back `days_from` days.
    async fn fetch_scores(&self, days_from: u32) -> Result<Vec<ScoreEvent>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
