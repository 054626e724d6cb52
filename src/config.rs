use chrono::NaiveDate;
use clap::Parser;

use crate::engine::grading::PushRule;

/// Confidence pick'em league server
#[derive(Parser, Debug, Clone)]
#[command(name = "pickem-server", version, about)]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "pickem.db")]
    pub database_path: String,

    /// The Odds API key (odds and score refreshes fail without it)
    #[arg(long, env = "ODDS_API_KEY")]
    pub odds_api_key: Option<String>,

    /// The Odds API base URL
    #[arg(
        long,
        env = "ODDS_API_URL",
        default_value = "https://api.the-odds-api.com/v4"
    )]
    pub odds_api_url: String,

    /// Sport key requested from the odds provider
    #[arg(long, env = "SPORT_KEY", default_value = "americanfootball_nfl")]
    pub sport_key: String,

    /// Bookmaker whose lines are used when present
    #[arg(long, env = "BOOKMAKER", default_value = "draftkings")]
    pub bookmaker: String,

    /// How many days back the scores endpoint looks
    #[arg(long, env = "SCORES_DAYS_FROM", default_value = "3")]
    pub scores_days_from: u32,

    /// Lines stop updating this many minutes before kickoff
    #[arg(long, env = "LINE_LOCK_MINUTES", default_value = "15")]
    pub line_lock_minutes: i64,

    /// First day of week 1 (YYYY-MM-DD, UTC)
    #[arg(long, env = "SEASON_START", default_value = "2025-09-03")]
    pub season_start: NaiveDate,

    /// Number of regular-season weeks
    #[arg(long, env = "SEASON_WEEKS", default_value = "18")]
    pub season_weeks: u32,

    /// Disable the background odds/scores scheduler
    #[arg(long, env = "DISABLE_SCHEDULER", default_value = "false")]
    pub disable_scheduler: bool,

    /// Scheduler tick interval in seconds
    #[arg(long, env = "SCHEDULER_TICK_SECS", default_value = "60")]
    pub scheduler_tick_secs: u64,

    /// How a spread result exactly on the line is graded
    #[arg(long, env = "PUSH_RULE", value_enum, default_value = "legacy")]
    pub push_rule: PushRule,

    /// Dollars per point for newly created leagues
    #[arg(long, env = "DEFAULT_DOLLAR_PER_POINT", default_value = "2.0")]
    pub default_dollar_per_point: f64,

    /// Weekly bonus for newly created leagues
    #[arg(long, env = "DEFAULT_WEEKLY_BONUS", default_value = "5.0")]
    pub default_weekly_bonus: f64,

    /// Directory with the built frontend, served for non-API routes
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.season_weeks == 0 || self.season_weeks > 18 {
            anyhow::bail!("season_weeks must be between 1 and 18");
        }
        if self.line_lock_minutes < 0 {
            anyhow::bail!("line_lock_minutes must not be negative");
        }
        if self.scheduler_tick_secs == 0 {
            anyhow::bail!("scheduler_tick_secs must be positive");
        }
        if !self.default_dollar_per_point.is_finite() || self.default_dollar_per_point < 0.0 {
            anyhow::bail!("default_dollar_per_point must be a non-negative number");
        }
        if !self.default_weekly_bonus.is_finite() || self.default_weekly_bonus < 0.0 {
            anyhow::bail!("default_weekly_bonus must be a non-negative number");
        }
        if self.bookmaker.trim().is_empty() {
            anyhow::bail!("bookmaker must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::parse_from(["pickem-server"]);
        config.validate().unwrap();
        assert_eq!(config.push_rule, PushRule::Legacy);
        assert_eq!(config.season_start, NaiveDate::from_ymd_opt(2025, 9, 3).unwrap());
        assert_eq!(config.line_lock_minutes, 15);
    }

    #[test]
    fn test_push_rule_flag() {
        let config = Config::parse_from(["pickem-server", "--push-rule", "both-lose"]);
        assert_eq!(config.push_rule, PushRule::BothLose);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = Config::parse_from(["pickem-server", "--season-weeks", "19"]);
        assert!(config.validate().is_err());
        let config = Config::parse_from(["pickem-server", "--default-weekly-bonus=-1"]);
        assert!(config.validate().is_err());
        let config = Config::parse_from(["pickem-server", "--scheduler-tick-secs", "0"]);
        assert!(config.validate().is_err());
    }
}
