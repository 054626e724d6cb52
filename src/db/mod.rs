use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

/// Thread-safe SQLite store (single connection with mutex).
///
/// Every multi-statement write runs inside a transaction while the mutex is
/// held, so concurrent callers see each operation as atomic.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Counts produced by resolving the pending picks of one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveCounts {
    pub correct: usize,
    pub incorrect: usize,
}

impl ResolveCounts {
    pub fn total(&self) -> usize {
        self.correct + self.incorrect
    }
}

impl Database {
    /// Open (or create) the SQLite database at the given path.
    /// `":memory:"` gives an ephemeral database for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA foreign_keys=ON;",
        )?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)
            .context("failed to create database schema")?;
        // Columns added after the first release; fail harmlessly when present.
        for sql in LEGACY_COLUMN_MIGRATIONS {
            conn.execute_batch(sql).ok();
        }
        conn.execute_batch(INDEX_SQL)
            .context("failed to create database indexes")?;
        Ok(())
    }

    // ── Users ─────────────────────────────────────────────────────────────────

    /// Insert or refresh a user record on login.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET email=excluded.email, name=excluded.name",
            params![user.id, user.email, user.name, Utc::now()],
        )?;
        Ok(())
    }

    // ── Leagues ───────────────────────────────────────────────────────────────

    /// The league the user belongs to, if any.
    pub fn league_for_user(&self, user_id: &str) -> Result<Option<League>> {
        let conn = self.conn()?;
        let league = conn
            .query_row(
                "SELECT l.id, l.name, l.invite_code, l.admin_id, l.dollar_per_point, l.weekly_bonus
                 FROM leagues l JOIN league_members lm ON l.id = lm.league_id
                 WHERE lm.user_id = ?1 LIMIT 1",
                params![user_id],
                map_league,
            )
            .optional()?;
        Ok(league)
    }

    pub fn league_by_id(&self, league_id: i64) -> Result<Option<League>> {
        let conn = self.conn()?;
        let league = conn
            .query_row(
                "SELECT id, name, invite_code, admin_id, dollar_per_point, weekly_bonus
                 FROM leagues WHERE id = ?1",
                params![league_id],
                map_league,
            )
            .optional()?;
        Ok(league)
    }

    pub fn league_by_invite_code(&self, code: &str) -> Result<Option<League>> {
        let conn = self.conn()?;
        let league = conn
            .query_row(
                "SELECT id, name, invite_code, admin_id, dollar_per_point, weekly_bonus
                 FROM leagues WHERE invite_code = ?1",
                params![code],
                map_league,
            )
            .optional()?;
        Ok(league)
    }

    pub fn is_in_any_league(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM league_members WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Create a league and enroll its admin as the first member.
    pub fn create_league(
        &self,
        name: &str,
        invite_code: &str,
        admin_id: &str,
        dollar_per_point: f64,
        weekly_bonus: f64,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO leagues (name, invite_code, admin_id, dollar_per_point, weekly_bonus)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, invite_code, admin_id, dollar_per_point, weekly_bonus],
        )?;
        let league_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO league_members (league_id, user_id) VALUES (?1, ?2)",
            params![league_id, admin_id],
        )?;
        tx.commit()?;
        Ok(league_id)
    }

    pub fn add_member(&self, league_id: i64, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO league_members (league_id, user_id) VALUES (?1, ?2)",
            params![league_id, user_id],
        )?;
        Ok(())
    }

    /// Returns whether a membership row was removed.
    pub fn remove_member(&self, league_id: i64, user_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM league_members WHERE league_id = ?1 AND user_id = ?2",
            params![league_id, user_id],
        )?;
        Ok(removed > 0)
    }

    /// League members ordered by join order. Members without a display name
    /// fall back to their user id.
    pub fn list_members(&self, league_id: i64) -> Result<Vec<Member>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT lm.user_id, COALESCE(u.name, lm.user_id), u.email
             FROM league_members lm LEFT JOIN users u ON u.id = lm.user_id
             WHERE lm.league_id = ?1 ORDER BY lm.rowid",
        )?;
        let members = stmt
            .query_map(params![league_id], |row| {
                Ok(Member {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    pub fn member_count(&self, league_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM league_members WHERE league_id = ?1",
            params![league_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    pub fn update_league(
        &self,
        league_id: i64,
        name: &str,
        dollar_per_point: f64,
        weekly_bonus: f64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE leagues SET name=?1, dollar_per_point=?2, weekly_bonus=?3 WHERE id=?4",
            params![name, dollar_per_point, weekly_bonus, league_id],
        )?;
        Ok(())
    }

    /// Points per member per week. Members without picks appear once with
    /// `week = None` and zero points.
    pub fn leaderboard(&self, league_id: i64) -> Result<Vec<WeekPoints>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT lm.user_id, u.name, p.week,
                    COALESCE(SUM(CASE WHEN p.correct = 1 THEN p.confidence ELSE 0 END), 0)
             FROM league_members lm
             LEFT JOIN users u ON u.id = lm.user_id
             LEFT JOIN picks p ON p.user_id = lm.user_id
             WHERE lm.league_id = ?1
             GROUP BY lm.user_id, u.name, p.week
             ORDER BY p.week, lm.user_id",
        )?;
        let rows = stmt
            .query_map(params![league_id], |row| {
                Ok(WeekPoints {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    week: row.get(2)?,
                    points: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Games ─────────────────────────────────────────────────────────────────

    /// Distinct weeks that have at least one game, ascending.
    pub fn list_weeks(&self) -> Result<Vec<u32>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT week FROM games ORDER BY week")?;
        let weeks = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<u32>>>()?;
        Ok(weeks)
    }

    pub fn list_games(&self, week: u32) -> Result<Vec<Game>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE week = ?1 ORDER BY start_time, id"
        ))?;
        let games = stmt
            .query_map(params![week], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    pub fn get_game(&self, game_id: i64) -> Result<Option<Game>> {
        let conn = self.conn()?;
        query_game(&conn, game_id)
    }

    /// Insert a newly seen game or refresh the lines of a known one
    /// (matched by external id). Scores are never touched here.
    /// Returns `true` when a new row was inserted.
    pub fn upsert_scheduled_game(&self, game: &ScheduledGame) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE games SET favorite=?1, spread=?2, over_under=?3, start_time=?4
             WHERE external_id=?5",
            params![
                game.favorite,
                game.spread,
                game.over_under,
                game.start_time,
                game.external_id,
            ],
        )?;
        let inserted = if updated == 0 {
            tx.execute(
                "INSERT INTO games (week, away_team, home_team, favorite, spread,
                                    over_under, start_time, external_id)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                params![
                    game.week,
                    game.away_team,
                    game.home_team,
                    game.favorite,
                    game.spread,
                    game.over_under,
                    game.start_time,
                    game.external_id,
                ],
            )?;
            true
        } else {
            false
        };
        tx.commit()?;
        Ok(inserted)
    }

    /// Record the final score of the game with this provider id.
    pub fn record_final_score(
        &self,
        external_id: &str,
        home_score: i32,
        away_score: i32,
    ) -> Result<ScoreRecord> {
        self.record_score_where(
            "external_id = ?1",
            params![external_id],
            home_score,
            away_score,
        )
    }

    /// Record the final score of the game identified by week and matchup.
    pub fn record_final_score_by_matchup(
        &self,
        week: u32,
        home_team: &str,
        away_team: &str,
        home_score: i32,
        away_score: i32,
    ) -> Result<ScoreRecord> {
        self.record_score_where(
            "week = ?1 AND home_team = ?2 AND away_team = ?3",
            params![week, home_team, away_team],
            home_score,
            away_score,
        )
    }

    /// Scores move from unset to set exactly once: the lookup and the update
    /// share a transaction, and the update only matches unscored rows.
    fn record_score_where(
        &self,
        predicate: &str,
        key: &[&dyn rusqlite::ToSql],
        home_score: i32,
        away_score: i32,
    ) -> Result<ScoreRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let game = tx
            .query_row(
                &format!("SELECT {GAME_COLUMNS} FROM games WHERE {predicate} LIMIT 1"),
                key,
                map_game,
            )
            .optional()?;
        let Some(mut game) = game else {
            return Ok(ScoreRecord::NotFound);
        };
        if game.is_final() {
            return Ok(ScoreRecord::AlreadyFinal(game));
        }
        tx.execute(
            "UPDATE games SET home_score=?1, away_score=?2
             WHERE id=?3 AND home_score IS NULL AND away_score IS NULL",
            params![home_score, away_score, game.id],
        )?;
        tx.commit()?;
        game.home_score = Some(home_score);
        game.away_score = Some(away_score);
        Ok(ScoreRecord::Recorded(game))
    }

    /// Insert an already-final game that was never ingested with lines.
    pub fn insert_final_game(
        &self,
        week: u32,
        away_team: &str,
        home_team: &str,
        away_score: i32,
        home_score: i32,
        start_time: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO games (week, away_team, home_team, start_time, away_score, home_score)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![week, away_team, home_team, start_time, away_score, home_score],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Final games with a full line that still hold unresolved picks.
    pub fn list_final_games_with_pending_picks(&self) -> Result<Vec<Game>> {
        let conn = self.conn()?;
        let columns = GAME_COLUMNS
            .split(", ")
            .map(|c| format!("g.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT {columns} FROM games g JOIN picks p ON p.game_id = g.id
             WHERE p.correct IS NULL
               AND g.home_score IS NOT NULL AND g.away_score IS NOT NULL
               AND g.favorite IS NOT NULL AND g.spread IS NOT NULL
               AND g.over_under IS NOT NULL
             ORDER BY g.id"
        ))?;
        let games = stmt
            .query_map([], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    // ── Picks ─────────────────────────────────────────────────────────────────

    pub fn get_pick_slot(&self, user_id: &str, week: u32, confidence: u8) -> Result<Option<Pick>> {
        let conn = self.conn()?;
        query_pick_slot(&conn, user_id, week, confidence)
    }

    /// Read what a submission is checked against, run `check`, then write the
    /// (user, week, confidence) slot, all inside one IMMEDIATE transaction so
    /// concurrent submissions from the same user are checked one at a time.
    ///
    /// A replaced slot keeps its row identity and returns to unresolved.
    /// Returns `Ok(None)` when the slot is graded and nothing was written.
    #[allow(clippy::too_many_arguments)]
    pub fn write_pick_checked<E, F>(
        &self,
        user_id: &str,
        game_id: i64,
        week: u32,
        bet_type: BetType,
        bet_side: BetSide,
        confidence: u8,
        check: F,
    ) -> std::result::Result<Option<Pick>, E>
    where
        E: From<anyhow::Error>,
        F: FnOnce(&PickSlotContext) -> std::result::Result<(), E>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(store_err::<E>)?;

        let game = query_game(&tx, game_id)?;
        let week_picks = query_user_picks(&tx, user_id, week)?;
        let slot_game = match week_picks.iter().find(|p| p.confidence == confidence) {
            Some(slot) => query_game(&tx, slot.game_id)?,
            None => None,
        };
        check(&PickSlotContext {
            game,
            week_picks,
            slot_game,
        })?;

        let changed = tx
            .execute(
                "INSERT INTO picks (user_id, game_id, week, pick_type, pick_value, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, week, confidence) DO UPDATE SET
                    game_id=excluded.game_id,
                    pick_type=excluded.pick_type,
                    pick_value=excluded.pick_value,
                    correct=NULL
                 WHERE picks.correct IS NULL",
                params![user_id, game_id, week, bet_type, bet_side, confidence],
            )
            .map_err(store_err::<E>)?;
        if changed == 0 {
            return Ok(None);
        }
        let pick = query_pick_slot(&tx, user_id, week, confidence)?;
        tx.commit().map_err(store_err::<E>)?;
        Ok(pick)
    }

    /// Delete an unresolved pick slot; returns whether a row was removed.
    pub fn delete_pick(&self, user_id: &str, week: u32, confidence: u8) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM picks
             WHERE user_id = ?1 AND week = ?2 AND confidence = ?3 AND correct IS NULL",
            params![user_id, week, confidence],
        )?;
        Ok(removed > 0)
    }

    /// Every pick of the league's members for one week, with owner name and
    /// game start time.
    pub fn list_league_week_picks(&self, league_id: i64, week: u32) -> Result<Vec<LeaguePick>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.user_id, u.name, p.game_id, p.week, p.pick_type, p.pick_value,
                    p.confidence, p.correct, g.start_time
             FROM picks p
             JOIN league_members lm ON lm.user_id = p.user_id
             JOIN games g ON g.id = p.game_id
             LEFT JOIN users u ON u.id = p.user_id
             WHERE lm.league_id = ?1 AND p.week = ?2
             ORDER BY p.user_id, p.confidence DESC",
        )?;
        let picks = stmt
            .query_map(params![league_id, week], |row| {
                Ok(LeaguePick {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    user_name: row.get(2)?,
                    game_id: row.get(3)?,
                    week: row.get(4)?,
                    bet_type: row.get(5)?,
                    bet_side: row.get(6)?,
                    confidence: row.get(7)?,
                    outcome: row.get(8)?,
                    start_time: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(picks)
    }

    /// All picks of the league's current members, every week.
    pub fn list_league_picks(&self, league_id: i64) -> Result<Vec<Pick>> {
        let conn = self.conn()?;
        let columns = PICK_COLUMNS
            .split(", ")
            .map(|c| format!("p.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {columns} FROM picks p
             JOIN league_members lm ON lm.user_id = p.user_id
             WHERE lm.league_id = ?1 ORDER BY p.week, p.user_id"
        ))?;
        let picks = stmt
            .query_map(params![league_id], map_pick)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(picks)
    }

    /// Grade every unresolved pick on a game inside one transaction.
    ///
    /// `grade` decides each pick's outcome; `Pending` leaves a pick untouched.
    /// The write is guarded by `correct IS NULL`, so a pick is resolved once
    /// no matter how many callers grade the same game.
    pub fn resolve_picks<F>(&self, game_id: i64, mut grade: F) -> Result<ResolveCounts>
    where
        F: FnMut(&Pick) -> PickOutcome,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let pending = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {PICK_COLUMNS} FROM picks WHERE game_id = ?1 AND correct IS NULL"
            ))?;
            let rows = stmt
                .query_map(params![game_id], map_pick)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut counts = ResolveCounts::default();
        for pick in &pending {
            let outcome = grade(pick);
            if !outcome.is_resolved() {
                continue;
            }
            let written = tx.execute(
                "UPDATE picks SET correct = ?1 WHERE id = ?2 AND correct IS NULL",
                params![outcome, pick.id],
            )?;
            if written == 0 {
                continue;
            }
            match outcome {
                PickOutcome::Correct => counts.correct += 1,
                PickOutcome::Incorrect => counts.incorrect += 1,
                PickOutcome::Pending => {}
            }
        }
        tx.commit()?;
        Ok(counts)
    }
}

/// What a pick submission is checked against, read inside the write
/// transaction.
#[derive(Debug, Clone)]
pub struct PickSlotContext {
    /// The game being picked
    pub game: Option<Game>,
    /// The user's picks for the week, before this write
    pub week_picks: Vec<Pick>,
    /// Game of the pick currently holding the slot
    pub slot_game: Option<Game>,
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn store_err<E: From<anyhow::Error>>(err: rusqlite::Error) -> E {
    E::from(anyhow::Error::from(err))
}

fn query_game(conn: &Connection, game_id: i64) -> Result<Option<Game>> {
    let game = conn
        .query_row(
            &format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?1"),
            params![game_id],
            map_game,
        )
        .optional()?;
    Ok(game)
}

fn query_user_picks(conn: &Connection, user_id: &str, week: u32) -> Result<Vec<Pick>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PICK_COLUMNS} FROM picks WHERE user_id = ?1 AND week = ?2
         ORDER BY confidence DESC"
    ))?;
    let picks = stmt
        .query_map(params![user_id, week], map_pick)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(picks)
}

fn query_pick_slot(
    conn: &Connection,
    user_id: &str,
    week: u32,
    confidence: u8,
) -> Result<Option<Pick>> {
    let pick = conn
        .query_row(
            &format!(
                "SELECT {PICK_COLUMNS} FROM picks
                 WHERE user_id = ?1 AND week = ?2 AND confidence = ?3"
            ),
            params![user_id, week, confidence],
            map_pick,
        )
        .optional()?;
    Ok(pick)
}

const GAME_COLUMNS: &str = "id, week, away_team, home_team, favorite, spread, over_under, \
                            start_time, away_score, home_score, external_id";

const PICK_COLUMNS: &str = "id, user_id, game_id, week, pick_type, pick_value, confidence, correct";

fn map_league(row: &rusqlite::Row) -> rusqlite::Result<League> {
    Ok(League {
        id: row.get(0)?,
        name: row.get(1)?,
        invite_code: row.get(2)?,
        admin_id: row.get(3)?,
        dollar_per_point: row.get(4)?,
        weekly_bonus: row.get(5)?,
    })
}

fn map_game(row: &rusqlite::Row) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        week: row.get(1)?,
        away_team: row.get(2)?,
        home_team: row.get(3)?,
        favorite: row.get(4)?,
        spread: row.get(5)?,
        over_under: row.get(6)?,
        start_time: row.get(7)?,
        away_score: row.get(8)?,
        home_score: row.get(9)?,
        external_id: row.get(10)?,
    })
}

fn map_pick(row: &rusqlite::Row) -> rusqlite::Result<Pick> {
    Ok(Pick {
        id: row.get(0)?,
        user_id: row.get(1)?,
        game_id: row.get(2)?,
        week: row.get(3)?,
        bet_type: row.get(4)?,
        bet_side: row.get(5)?,
        confidence: row.get(6)?,
        outcome: row.get(7)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          TEXT    PRIMARY KEY,
    email       TEXT,
    name        TEXT,
    created_at  TEXT
);

CREATE TABLE IF NOT EXISTS leagues (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT    NOT NULL,
    invite_code      TEXT    UNIQUE,
    admin_id         TEXT,
    dollar_per_point REAL    NOT NULL DEFAULT 2,
    weekly_bonus     REAL    NOT NULL DEFAULT 5
);

CREATE TABLE IF NOT EXISTS league_members (
    league_id   INTEGER NOT NULL,
    user_id     TEXT    NOT NULL,
    PRIMARY KEY (league_id, user_id),
    FOREIGN KEY (league_id) REFERENCES leagues(id)
);

CREATE TABLE IF NOT EXISTS games (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    week        INTEGER NOT NULL,
    away_team   TEXT    NOT NULL,
    home_team   TEXT    NOT NULL,
    favorite    TEXT,
    spread      REAL,
    over_under  REAL,
    start_time  TEXT    NOT NULL,
    away_score  INTEGER,
    home_score  INTEGER,
    external_id TEXT
);

CREATE TABLE IF NOT EXISTS picks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT    NOT NULL,
    game_id     INTEGER NOT NULL,
    week        INTEGER NOT NULL,
    pick_type   TEXT    NOT NULL,
    pick_value  TEXT    NOT NULL,
    confidence  INTEGER NOT NULL,
    correct     INTEGER,
    UNIQUE (user_id, week, confidence),
    FOREIGN KEY (game_id) REFERENCES games(id)
);
"#;

const LEGACY_COLUMN_MIGRATIONS: &[&str] = &[
    "ALTER TABLE games ADD COLUMN external_id TEXT;",
    "ALTER TABLE leagues ADD COLUMN invite_code TEXT;",
    "ALTER TABLE leagues ADD COLUMN admin_id TEXT;",
];

const INDEX_SQL: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_games_external ON games(external_id);
CREATE INDEX IF NOT EXISTS idx_games_week ON games(week);
CREATE INDEX IF NOT EXISTS idx_picks_game ON picks(game_id);
CREATE INDEX IF NOT EXISTS idx_picks_week ON picks(week);
CREATE INDEX IF NOT EXISTS idx_league_members_user ON league_members(user_id);
"#;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    impl Database {
        pub(crate) fn list_user_picks(&self, user_id: &str, week: u32) -> Result<Vec<Pick>> {
            let conn = self.conn()?;
            query_user_picks(&conn, user_id, week)
        }

        pub(crate) fn execute_sql(&self, sql: &str) -> Result<()> {
            self.conn()?.execute_batch(sql)?;
            Ok(())
        }

        /// Write a slot with no submission checks.
        pub(crate) fn upsert_pick(
            &self,
            user_id: &str,
            game_id: i64,
            week: u32,
            bet_type: BetType,
            bet_side: BetSide,
            confidence: u8,
        ) -> Result<bool> {
            let written = self.write_pick_checked(
                user_id,
                game_id,
                week,
                bet_type,
                bet_side,
                confidence,
                |_| Ok::<(), anyhow::Error>(()),
            )?;
            Ok(written.is_some())
        }
    }

    pub(crate) fn kickoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 7, 17, 0, 0).unwrap()
    }

    pub(crate) fn scheduled(external_id: &str, home: &str, away: &str) -> ScheduledGame {
        ScheduledGame {
            external_id: external_id.into(),
            week: 1,
            away_team: away.into(),
            home_team: home.into(),
            favorite: home.into(),
            spread: 3.5,
            over_under: 45.5,
            start_time: kickoff(),
        }
    }

    pub(crate) fn game_id(db: &Database, external_id: &str) -> i64 {
        db.list_games(1)
            .unwrap()
            .into_iter()
            .find(|g| g.external_id.as_deref() == Some(external_id))
            .map(|g| g.id)
            .unwrap()
    }

    #[test]
    fn upsert_scheduled_game_inserts_then_updates_lines() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.upsert_scheduled_game(&scheduled("ev1", "Chiefs", "Bills")).unwrap());

        let mut moved = scheduled("ev1", "Chiefs", "Bills");
        moved.spread = 4.5;
        moved.start_time = kickoff() + Duration::hours(1);
        assert!(!db.upsert_scheduled_game(&moved).unwrap());

        let games = db.list_games(1).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].spread, Some(4.5));
        assert_eq!(games[0].start_time, kickoff() + Duration::hours(1));
        assert!(!games[0].is_final());
    }

    #[test]
    fn final_score_is_recorded_once() {
        let db = Database::open(":memory:").unwrap();
        db.upsert_scheduled_game(&scheduled("ev1", "Chiefs", "Bills")).unwrap();

        match db.record_final_score("ev1", 24, 17).unwrap() {
            ScoreRecord::Recorded(g) => {
                assert_eq!(g.home_score, Some(24));
                assert_eq!(g.away_score, Some(17));
            }
            other => panic!("expected Recorded, got {other:?}"),
        }
        match db.record_final_score("ev1", 31, 17).unwrap() {
            ScoreRecord::AlreadyFinal(g) => assert_eq!(g.home_score, Some(24)),
            other => panic!("expected AlreadyFinal, got {other:?}"),
        }
        assert_eq!(db.record_final_score("missing", 1, 0).unwrap(), ScoreRecord::NotFound);
    }

    #[test]
    fn pick_slot_replacement_keeps_identity() {
        let db = Database::open(":memory:").unwrap();
        db.upsert_scheduled_game(&scheduled("ev1", "Chiefs", "Bills")).unwrap();
        db.upsert_scheduled_game(&scheduled("ev2", "Eagles", "Cowboys")).unwrap();
        let g1 = game_id(&db, "ev1");
        let g2 = game_id(&db, "ev2");

        db.upsert_pick("u1", g1, 1, BetType::Spread, BetSide::Favorite, 10).unwrap();
        let first = db.get_pick_slot("u1", 1, 10).unwrap().unwrap();
        db.upsert_pick("u1", g2, 1, BetType::Total, BetSide::Over, 10).unwrap();
        let second = db.get_pick_slot("u1", 1, 10).unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.game_id, g2);
        assert_eq!(second.bet_side, BetSide::Over);
        assert_eq!(db.list_user_picks("u1", 1).unwrap().len(), 1);
    }

    #[test]
    fn checked_write_sees_slot_game_and_rolls_back_on_rejection() {
        let db = Database::open(":memory:").unwrap();
        db.upsert_scheduled_game(&scheduled("ev1", "Chiefs", "Bills")).unwrap();
        db.upsert_scheduled_game(&scheduled("ev2", "Eagles", "Cowboys")).unwrap();
        let g1 = game_id(&db, "ev1");
        let g2 = game_id(&db, "ev2");
        db.upsert_pick("u1", g1, 1, BetType::Spread, BetSide::Favorite, 10).unwrap();

        let mut seen = None;
        let rejected: std::result::Result<Option<Pick>, anyhow::Error> = db.write_pick_checked(
            "u1",
            g2,
            1,
            BetType::Total,
            BetSide::Over,
            10,
            |ctx| {
                seen = Some((
                    ctx.game.as_ref().map(|g| g.id),
                    ctx.slot_game.as_ref().map(|g| g.id),
                    ctx.week_picks.len(),
                ));
                anyhow::bail!("rejected")
            },
        );

        assert!(rejected.is_err());
        assert_eq!(seen, Some((Some(g2), Some(g1), 1)));
        let slot = db.get_pick_slot("u1", 1, 10).unwrap().unwrap();
        assert_eq!(slot.game_id, g1);
        assert_eq!(slot.bet_type, BetType::Spread);
    }

    #[test]
    fn resolve_picks_only_touches_pending_rows() {
        let db = Database::open(":memory:").unwrap();
        db.upsert_scheduled_game(&scheduled("ev1", "Chiefs", "Bills")).unwrap();
        let g1 = game_id(&db, "ev1");
        db.upsert_pick("u1", g1, 1, BetType::Spread, BetSide::Favorite, 10).unwrap();
        db.upsert_pick("u2", g1, 1, BetType::Spread, BetSide::Underdog, 9).unwrap();

        let counts = db
            .resolve_picks(g1, |p| PickOutcome::from_correct(p.bet_side == BetSide::Favorite))
            .unwrap();
        assert_eq!(counts, ResolveCounts { correct: 1, incorrect: 1 });

        // A second pass sees nothing pending and cannot flip outcomes.
        let again = db.resolve_picks(g1, |_| PickOutcome::Correct).unwrap();
        assert_eq!(again.total(), 0);
        let u2 = db.get_pick_slot("u2", 1, 9).unwrap().unwrap();
        assert_eq!(u2.outcome, PickOutcome::Incorrect);

        // Graded slots can be neither replaced nor deleted.
        assert!(!db.upsert_pick("u2", g1, 1, BetType::Total, BetSide::Over, 9).unwrap());
        assert!(!db.delete_pick("u2", 1, 9).unwrap());
    }

    #[test]
    fn leaderboard_sums_correct_confidence_per_week() {
        let db = Database::open(":memory:").unwrap();
        db.upsert_user(&User { id: "u1".into(), email: None, name: Some("Ann".into()) })
            .unwrap();
        db.upsert_user(&User { id: "u2".into(), email: None, name: Some("Bo".into()) })
            .unwrap();
        let league = db.create_league("L", "ABCDEFGH", "u1", 2.0, 5.0).unwrap();
        db.add_member(league, "u2").unwrap();
        db.upsert_scheduled_game(&scheduled("ev1", "Chiefs", "Bills")).unwrap();
        let g1 = game_id(&db, "ev1");
        db.upsert_pick("u1", g1, 1, BetType::Spread, BetSide::Favorite, 10).unwrap();
        db.upsert_pick("u1", g1, 1, BetType::Total, BetSide::Under, 4).unwrap();
        db.resolve_picks(g1, |p| PickOutcome::from_correct(p.confidence == 10))
            .unwrap();

        let rows = db.leaderboard(league).unwrap();
        let ann = rows.iter().find(|r| r.id == "u1").unwrap();
        assert_eq!((ann.week, ann.points), (Some(1), 10));
        let bo = rows.iter().find(|r| r.id == "u2").unwrap();
        assert_eq!((bo.week, bo.points), (None, 0));
    }
}
