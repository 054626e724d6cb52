use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use futures_util::future::{join, OptionFuture};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::ingest::Ingestor;

/// Which refresh jobs are due on this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshPlan {
    pub odds: bool,
    pub scores: bool,
}

fn elapsed_at_least(now: DateTime<Utc>, last: Option<DateTime<Utc>>, gap: Duration) -> bool {
    last.map_or(true, |t| now - t >= gap)
}

/// Decide which refreshes are due, in New York local time.
///
/// Odds: Sundays every 15 minutes from 08:00 until 16:00, then hourly from
/// 17:00 through 20:59; other days hourly from 08:00 through 20:59. Hourly
/// runs only start in the first five minutes of the hour.
///
/// Scores: Sundays every 5 minutes from 13:00 to midnight; other days once in
/// the 08:00–08:04 window.
pub fn plan_refresh(
    now: DateTime<Utc>,
    last_odds: Option<DateTime<Utc>>,
    last_scores: Option<DateTime<Utc>>,
) -> RefreshPlan {
    let local = now.with_timezone(&New_York);
    let hour = local.hour();
    let top_of_hour = local.minute() < 5;
    let sunday = local.weekday() == Weekday::Sun;
    let hourly_odds = elapsed_at_least(now, last_odds, Duration::hours(1)) && top_of_hour;

    let odds = if sunday {
        match hour {
            8..=15 => elapsed_at_least(now, last_odds, Duration::minutes(15)),
            17..=20 => hourly_odds,
            _ => false,
        }
    } else {
        (8..=20).contains(&hour) && hourly_odds
    };

    let scores = if sunday {
        hour >= 13 && elapsed_at_least(now, last_scores, Duration::minutes(5))
    } else {
        hour == 8 && top_of_hour && elapsed_at_least(now, last_scores, Duration::hours(1))
    };

    RefreshPlan { odds, scores }
}

/// Spawn the background refresh loop. Last-run times live in the task and
/// only advance when a job succeeds, so failures retry on the next due tick.
pub fn spawn_scheduler(ingestor: Arc<Ingestor>, tick: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Scheduler started (tick={:?})", tick);
        let mut last_odds: Option<DateTime<Utc>> = None;
        let mut last_scores: Option<DateTime<Utc>> = None;
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let now = Utc::now();
            let plan = plan_refresh(now, last_odds, last_scores);
            if plan == RefreshPlan::default() {
                continue;
            }

            let odds_job: OptionFuture<_> = plan.odds.then(|| ingestor.refresh_odds(now)).into();
            let scores_job: OptionFuture<_> = plan.scores.then(|| ingestor.refresh_scores()).into();
            let (odds, scores) = join(odds_job, scores_job).await;

            match odds {
                Some(Ok(_)) => last_odds = Some(now),
                Some(Err(e)) => error!("Scheduled odds refresh failed: {:#}", e),
                None => {}
            }
            match scores {
                Some(Ok(_)) => last_scores = Some(now),
                Some(Err(e)) => error!("Scheduled scores refresh failed: {:#}", e),
                None => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// New York wall-clock time as UTC.
    fn ny(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        New_York
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_sunday_morning_odds_every_15_minutes() {
        // 2025-09-14 is a Sunday
        let now = ny(2025, 9, 14, 9, 37);
        assert!(plan_refresh(now, None, None).odds);
        assert!(plan_refresh(now, Some(now - Duration::minutes(15)), None).odds);
        assert!(!plan_refresh(now, Some(now - Duration::minutes(14)), None).odds);
    }

    #[test]
    fn test_sunday_evening_odds_hourly_at_top_of_hour() {
        let at_top = ny(2025, 9, 14, 18, 2);
        assert!(plan_refresh(at_top, Some(at_top - Duration::minutes(61)), None).odds);
        assert!(!plan_refresh(at_top, Some(at_top - Duration::minutes(30)), None).odds);
        assert!(!plan_refresh(ny(2025, 9, 14, 18, 7), None, None).odds);
        // 16:xx is a gap
        assert!(!plan_refresh(ny(2025, 9, 14, 16, 1), None, None).odds);
        assert!(!plan_refresh(ny(2025, 9, 14, 21, 1), None, None).odds);
    }

    #[test]
    fn test_weekday_odds_hourly_between_8_and_21() {
        // Wednesday
        assert!(plan_refresh(ny(2025, 9, 17, 8, 0), None, None).odds);
        assert!(plan_refresh(ny(2025, 9, 17, 20, 4), None, None).odds);
        assert!(!plan_refresh(ny(2025, 9, 17, 20, 5), None, None).odds);
        assert!(!plan_refresh(ny(2025, 9, 17, 21, 0), None, None).odds);
        assert!(!plan_refresh(ny(2025, 9, 17, 7, 0), None, None).odds);
    }

    #[test]
    fn test_sunday_scores_every_5_minutes_from_13() {
        let now = ny(2025, 9, 14, 16, 33);
        assert!(plan_refresh(now, None, Some(now - Duration::minutes(5))).scores);
        assert!(!plan_refresh(now, None, Some(now - Duration::minutes(4))).scores);
        assert!(plan_refresh(ny(2025, 9, 14, 23, 58), None, None).scores);
        assert!(!plan_refresh(ny(2025, 9, 14, 12, 59), None, None).scores);
    }

    #[test]
    fn test_weekday_scores_once_at_8() {
        // Monday
        let now = ny(2025, 9, 15, 8, 3);
        assert!(plan_refresh(now, None, None).scores);
        assert!(!plan_refresh(now, None, Some(now - Duration::minutes(2))).scores);
        assert!(!plan_refresh(ny(2025, 9, 15, 8, 5), None, None).scores);
        assert!(!plan_refresh(ny(2025, 9, 15, 9, 0), None, None).scores);
    }

    #[test]
    fn test_uses_daylight_saving_time() {
        // 12:30 UTC is 08:30 EDT in September but 07:30 EST in December
        let sept = Utc.with_ymd_and_hms(2025, 9, 17, 12, 30, 0).unwrap();
        assert!(plan_refresh(sept - Duration::minutes(28), None, None).odds);
        let dec = Utc.with_ymd_and_hms(2025, 12, 17, 12, 2, 0).unwrap();
        assert!(!plan_refresh(dec, None, None).odds);
        assert!(plan_refresh(dec + Duration::hours(1), None, None).odds);
    }

    #[test]
    fn test_sunday_in_new_york_not_utc() {
        // Monday 02:00 UTC is still Sunday 22:00 in New York
        let now = Utc.with_ymd_and_hms(2025, 9, 15, 2, 0, 0).unwrap();
        assert!(plan_refresh(now, None, None).scores);
    }
}
