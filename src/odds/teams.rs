use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Short canonical team name ("Kansas City Chiefs" → "Chiefs").
/// Names outside the league pass through unchanged.
pub fn short_name(full_name: &str) -> &str {
    match full_name {
        "Arizona Cardinals" => "Cardinals",
        "Atlanta Falcons" => "Falcons",
        "Baltimore Ravens" => "Ravens",
        "Buffalo Bills" => "Bills",
        "Carolina Panthers" => "Panthers",
        "Chicago Bears" => "Bears",
        "Cincinnati Bengals" => "Bengals",
        "Cleveland Browns" => "Browns",
        "Dallas Cowboys" => "Cowboys",
        "Denver Broncos" => "Broncos",
        "Detroit Lions" => "Lions",
        "Green Bay Packers" => "Packers",
        "Houston Texans" => "Texans",
        "Indianapolis Colts" => "Colts",
        "Jacksonville Jaguars" => "Jaguars",
        "Kansas City Chiefs" => "Chiefs",
        "Las Vegas Raiders" => "Raiders",
        "Los Angeles Chargers" => "Chargers",
        "Los Angeles Rams" => "Rams",
        "Miami Dolphins" => "Dolphins",
        "Minnesota Vikings" => "Vikings",
        "New England Patriots" => "Patriots",
        "New Orleans Saints" => "Saints",
        "New York Giants" => "Giants",
        "New York Jets" => "Jets",
        "Philadelphia Eagles" => "Eagles",
        "Pittsburgh Steelers" => "Steelers",
        "San Francisco 49ers" => "49ers",
        "Seattle Seahawks" => "Seahawks",
        "Tampa Bay Buccaneers" => "Buccaneers",
        "Tennessee Titans" => "Titans",
        "Washington Commanders" => "Commanders",
        other => other,
    }
}

/// Maps kickoff times to season weeks. Week N opens at 00:00 UTC on
/// `start + 7·(N−1)` days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonCalendar {
    pub start: NaiveDate,
    pub weeks: u32,
}

impl SeasonCalendar {
    pub fn new(start: NaiveDate, weeks: u32) -> Self {
        SeasonCalendar { start, weeks }
    }

    /// Week containing `at`. Anything before the season is week 1; anything
    /// after the last week opens stays in the last week.
    pub fn week_for(&self, at: DateTime<Utc>) -> u32 {
        let opens = self.start.and_time(chrono::NaiveTime::MIN).and_utc();
        if at < opens {
            return 1;
        }
        let elapsed_weeks = (at - opens).num_weeks();
        let week = u32::try_from(elapsed_weeks + 1).unwrap_or(u32::MAX);
        week.min(self.weeks.max(1))
    }

    /// Opening instant of `week`.
    pub fn week_start(&self, week: u32) -> DateTime<Utc> {
        let offset = Duration::weeks(i64::from(week.saturating_sub(1)));
        self.start.and_time(chrono::NaiveTime::MIN).and_utc() + offset
    }
}
