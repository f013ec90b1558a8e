// SQLite persistence for pool picks, fetched weekly probabilities, and
// key-value pool state.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use lms_core::{PickHistory, ProbabilityTable, Team, Week, WeekProbabilities};

/// Summary row for one stored week of probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWeek {
    pub week: Week,
    pub teams: usize,
    pub fetched_at: String,
}

/// SQLite-backed persistence for picks (scoped by pool id), weekly
/// probabilities, and arbitrary JSON state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS picks (
                pool_id     TEXT NOT NULL,
                week        INTEGER NOT NULL CHECK (week >= 1),
                team        TEXT NOT NULL,
                recorded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (pool_id, week)
            );

            CREATE TABLE IF NOT EXISTS week_probabilities (
                week        INTEGER NOT NULL CHECK (week >= 1),
                position    INTEGER NOT NULL,
                team        TEXT NOT NULL,
                probability REAL,
                fetched_at  TEXT NOT NULL,
                PRIMARY KEY (week, position)
            );

            CREATE TABLE IF NOT EXISTS pool_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Picks
    // ------------------------------------------------------------------

    /// Fill (or overwrite) the slot for `week` in `pool_id`.
    pub fn record_pick(&self, pool_id: &str, week: Week, team: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO picks (pool_id, week, team) VALUES (?1, ?2, ?3)",
            params![pool_id, week, team],
        )
        .context("failed to record pick")?;
        Ok(())
    }

    /// Empty the slot for `week`. Returns `true` if a pick was removed.
    pub fn clear_pick(&self, pool_id: &str, week: Week) -> Result<bool> {
        let conn = self.conn();
        let removed = conn
            .execute(
                "DELETE FROM picks WHERE pool_id = ?1 AND week = ?2",
                params![pool_id, week],
            )
            .context("failed to clear pick")?;
        Ok(removed > 0)
    }

    /// Delete every pick of `pool_id`. Returns the number removed.
    pub fn clear_pool(&self, pool_id: &str) -> Result<usize> {
        let conn = self.conn();
        let removed = conn
            .execute("DELETE FROM picks WHERE pool_id = ?1", params![pool_id])
            .context("failed to clear pool picks")?;
        Ok(removed)
    }

    /// Load the pick history of `pool_id` as `total_weeks` dense slots.
    /// Rows for weeks beyond the season are ignored.
    pub fn load_history(&self, pool_id: &str, total_weeks: Week) -> Result<PickHistory> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT week, team FROM picks
                 WHERE pool_id = ?1 AND week <= ?2
                 ORDER BY week",
            )
            .context("failed to prepare load_history query")?;

        let rows = stmt
            .query_map(params![pool_id, total_weeks], |row| {
                Ok((row.get::<_, Week>(0)?, row.get::<_, String>(1)?))
            })
            .context("failed to query picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pick rows")?;

        let mut history = PickHistory::new(vec![None; total_weeks as usize]);
        for (week, team) in rows {
            history.set(week, Some(team));
        }
        Ok(history)
    }

    /// Replace all picks of `pool_id` with the filled slots of `history`,
    /// in a single transaction. Returns the number of picks written.
    pub fn import_history(&self, pool_id: &str, history: &PickHistory) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;

        tx.execute("DELETE FROM picks WHERE pool_id = ?1", params![pool_id])
            .context("failed to delete existing picks")?;

        let mut written = 0;
        for (week, team) in history.picks() {
            tx.execute(
                "INSERT INTO picks (pool_id, week, team) VALUES (?1, ?2, ?3)",
                params![pool_id, week, team],
            )
            .context("failed to insert imported pick")?;
            written += 1;
        }

        tx.commit().context("failed to commit pick import")?;
        Ok(written)
    }

    // ------------------------------------------------------------------
    // Weekly probabilities
    // ------------------------------------------------------------------

    /// Store one week of probabilities, replacing anything previously stored
    /// for that week. Entry order is preserved through `position`.
    pub fn store_week(
        &self,
        week: Week,
        probabilities: &WeekProbabilities,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let fetched_at = fetched_at.to_rfc3339();

        tx.execute(
            "DELETE FROM week_probabilities WHERE week = ?1",
            params![week],
        )
        .context("failed to delete stored week")?;

        for (position, entry) in probabilities.entries().iter().enumerate() {
            tx.execute(
                "INSERT INTO week_probabilities (week, position, team, probability, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    week,
                    position as i64,
                    entry.team.name(),
                    entry.probability,
                    fetched_at
                ],
            )
            .context("failed to insert week probability")?;
        }

        tx.commit().context("failed to commit stored week")?;
        Ok(())
    }

    /// All stored weeks assembled into a table, each in stored order.
    pub fn load_weeks(&self) -> Result<ProbabilityTable> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT week, team, probability FROM week_probabilities
                 ORDER BY week, position",
            )
            .context("failed to prepare load_weeks query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Week>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            })
            .context("failed to query week probabilities")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map week probability rows")?;

        let mut table = ProbabilityTable::new();
        let mut current: Option<(Week, WeekProbabilities)> = None;
        for (week, team, probability) in rows {
            match current.as_mut() {
                Some((w, probabilities)) if *w == week => {
                    probabilities.push(Team::new(team), probability);
                }
                _ => {
                    if let Some((w, probabilities)) = current.take() {
                        table.insert_week(w, probabilities);
                    }
                    let mut probabilities = WeekProbabilities::new();
                    probabilities.push(Team::new(team), probability);
                    current = Some((week, probabilities));
                }
            }
        }
        if let Some((w, probabilities)) = current {
            table.insert_week(w, probabilities);
        }
        Ok(table)
    }

    /// One summary row per stored week, in week order.
    pub fn stored_weeks(&self) -> Result<Vec<StoredWeek>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT week, COUNT(*), MAX(fetched_at) FROM week_probabilities
                 GROUP BY week ORDER BY week",
            )
            .context("failed to prepare stored_weeks query")?;

        let weeks = stmt
            .query_map([], |row| {
                Ok(StoredWeek {
                    week: row.get(0)?,
                    teams: row.get::<_, i64>(1)? as usize,
                    fetched_at: row.get(2)?,
                })
            })
            .context("failed to query stored weeks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map stored week rows")?;
        Ok(weeks)
    }

    // ------------------------------------------------------------------
    // Key-value state
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`. Repeated saves overwrite
    /// the previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO pool_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM pool_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query pool state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value: serde_json::Value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Remove `key` from the state store.
    pub fn delete_state(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM pool_state WHERE key = ?1", params![key])
            .context("failed to delete state")?;
        Ok(())
    }
}
