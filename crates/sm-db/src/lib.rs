//! Storage layer for the self-monitor.
//!
//! Provides persistence for raw focus events, classification rules, daily
//! logs, sync cursors, and small operational flags using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. A `Database` instance can be moved between threads but cannot
//! be shared across threads without external synchronization. Components that
//! need concurrent access (the observation path, the pipeline, the sync
//! manager) each open their own connection to the same file and rely on
//! SQLite's per-statement atomicity.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 format with a fixed `Z` suffix
//! (e.g. `2025-06-01T10:30:00.000Z`) so lexicographic ordering matches
//! chronological ordering. Dates are stored as `YYYY-MM-DD` TEXT.

use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use sm_core::{AppRule, Category, DailyLog, ManualInputs, RawEvent, Verdict};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored event timestamp.
    #[error("invalid timestamp for event {event_id}: {timestamp}")]
    TimestampParse {
        event_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value failed validation on read.
    #[error("invalid {field} value: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Per-entity sync cursor row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStateRecord {
    pub entity_name: String,
    pub last_pushed_at: Option<DateTime<Utc>>,
    pub last_pulled_at: Option<DateTime<Utc>>,
    pub pending_push_count: i64,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection
    /// closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// Idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS raw_event (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                device_id TEXT NOT NULL,
                app_pkg_name TEXT NOT NULL,
                window_title TEXT,
                is_idle INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_raw_event_timestamp ON raw_event(timestamp);

            CREATE TABLE IF NOT EXISTS app_rule (
                pkg_name_pattern TEXT PRIMARY KEY,
                category TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_log (
                date TEXT PRIMARY KEY,
                total_work_sec INTEGER NOT NULL,
                total_distraction_sec INTEGER NOT NULL,
                verdict TEXT NOT NULL,
                manual_study INTEGER NOT NULL DEFAULT 0,
                manual_diet INTEGER NOT NULL DEFAULT 0,
                manual_sugar INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS manual_input (
                date TEXT PRIMARY KEY,
                study_done INTEGER NOT NULL DEFAULT 0,
                diet_followed INTEGER NOT NULL DEFAULT 0,
                sugar_avoided INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sync_state (
                entity_name TEXT PRIMARY KEY,
                last_pushed_at TEXT,
                last_pulled_at TEXT,
                pending_push_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS system_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of events, ignoring duplicates by ID.
    ///
    /// Returns the number of newly inserted rows.
    pub fn insert_events(&mut self, events: &[RawEvent]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO raw_event
                (id, timestamp, device_id, app_pkg_name, window_title, is_idle)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    event.id,
                    format_timestamp(event.timestamp),
                    event.device_id,
                    event.app_pkg_name,
                    event.window_title,
                    event.is_idle,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(batch = events.len(), inserted, "inserted events");
        Ok(inserted)
    }

    /// Lists events within a time range, ordered by timestamp then ID.
    ///
    /// The range is inclusive of `start` and exclusive of `end`.
    pub fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawEvent>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT id, timestamp, device_id, app_pkg_name, window_title, is_idle
            FROM raw_event
            WHERE timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(
            [format_timestamp(start), format_timestamp(end)],
            event_from_row,
        )?;
        collect_events(rows)
    }

    /// Lists events with a timestamp strictly after `mark`, ordered by
    /// timestamp then ID. Used for push selection against the high-water mark.
    pub fn events_after(&self, mark: DateTime<Utc>) -> Result<Vec<RawEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, timestamp, device_id, app_pkg_name, window_title, is_idle
            FROM raw_event
            WHERE timestamp > ?
            ORDER BY timestamp ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([format_timestamp(mark)], event_from_row)?;
        collect_events(rows)
    }

    /// Inserts or overwrites a classification rule (last writer wins).
    pub fn upsert_rule(&self, rule: &AppRule) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO app_rule (pkg_name_pattern, category)
            VALUES (?, ?)
            ON CONFLICT(pkg_name_pattern) DO UPDATE SET category = excluded.category
            ",
            params![rule.pkg_name_pattern, rule.category.as_str()],
        )?;
        Ok(())
    }

    /// Lists all rules ordered by pattern.
    ///
    /// Corrupted category values are read as neutral rather than failing the
    /// whole rule table.
    pub fn list_rules(&self) -> Result<Vec<AppRule>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT pkg_name_pattern, category FROM app_rule ORDER BY pkg_name_pattern ASC")?;
        let rows = stmt.query_map([], |row| {
            let pattern: String = row.get(0)?;
            let category: String = row.get(1)?;
            Ok((pattern, category))
        })?;
        let mut rules = Vec::new();
        for row in rows {
            let (pkg_name_pattern, category) = row?;
            rules.push(AppRule {
                pkg_name_pattern,
                category: Category::parse_lossy(&category),
            });
        }
        Ok(rules)
    }

    /// Inserts or overwrites the daily log for its date.
    pub fn upsert_daily_log(&self, log: &DailyLog) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO daily_log
            (date, total_work_sec, total_distraction_sec, verdict, manual_study, manual_diet, manual_sugar)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                total_work_sec = excluded.total_work_sec,
                total_distraction_sec = excluded.total_distraction_sec,
                verdict = excluded.verdict,
                manual_study = excluded.manual_study,
                manual_diet = excluded.manual_diet,
                manual_sugar = excluded.manual_sugar
            ",
            params![
                log.date.to_string(),
                log.total_work_sec,
                log.total_distraction_sec,
                log.verdict.as_str(),
                log.manual.study_done,
                log.manual.diet_followed,
                log.manual.sugar_avoided,
            ],
        )?;
        Ok(())
    }

    /// Fetches the daily log for a date, if one was persisted.
    pub fn daily_log(&self, date: NaiveDate) -> Result<Option<DailyLog>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT total_work_sec, total_distraction_sec, verdict,
                       manual_study, manual_diet, manual_sugar
                FROM daily_log
                WHERE date = ?
                ",
                [date.to_string()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, bool>(4)?,
                        row.get::<_, bool>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((total_work_sec, total_distraction_sec, verdict, study, diet, sugar)) = row else {
            return Ok(None);
        };
        let verdict: Verdict = verdict.parse().map_err(|_| DbError::InvalidField {
            field: "verdict",
            value: verdict.clone(),
        })?;
        Ok(Some(DailyLog {
            date,
            total_work_sec,
            total_distraction_sec,
            verdict,
            manual: ManualInputs {
                study_done: study,
                diet_followed: diet,
                sugar_avoided: sugar,
            },
        }))
    }

    /// Records the day's self-report, overwriting a previous submission.
    pub fn upsert_manual_inputs(
        &self,
        date: NaiveDate,
        inputs: &ManualInputs,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO manual_input (date, study_done, diet_followed, sugar_avoided)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                study_done = excluded.study_done,
                diet_followed = excluded.diet_followed,
                sugar_avoided = excluded.sugar_avoided
            ",
            params![
                date.to_string(),
                inputs.study_done,
                inputs.diet_followed,
                inputs.sugar_avoided,
            ],
        )?;
        Ok(())
    }

    /// Fetches the day's self-report, if submitted.
    pub fn manual_inputs(&self, date: NaiveDate) -> Result<Option<ManualInputs>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT study_done, diet_followed, sugar_avoided FROM manual_input WHERE date = ?",
                [date.to_string()],
                |row| {
                    Ok(ManualInputs {
                        study_done: row.get(0)?,
                        diet_followed: row.get(1)?,
                        sugar_avoided: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Fetches the sync cursor row for an entity.
    pub fn sync_state(&self, entity: &str) -> Result<Option<SyncStateRecord>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT entity_name, last_pushed_at, last_pulled_at, pending_push_count
                FROM sync_state
                WHERE entity_name = ?
                ",
                [entity],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((entity_name, pushed, pulled, pending_push_count)) = row else {
            return Ok(None);
        };
        Ok(Some(SyncStateRecord {
            last_pushed_at: parse_cursor(pushed.as_deref())?,
            last_pulled_at: parse_cursor(pulled.as_deref())?,
            entity_name,
            pending_push_count,
        }))
    }

    /// Advances the push high-water mark for an entity.
    ///
    /// Cursors are monotonically non-decreasing: an older timestamp never
    /// regresses the stored mark. A successful push clears the pending count.
    pub fn advance_push_cursor(&self, entity: &str, at: DateTime<Utc>) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO sync_state (entity_name, last_pushed_at, pending_push_count)
            VALUES (?, ?, 0)
            ON CONFLICT(entity_name) DO UPDATE SET
                last_pushed_at = MAX(COALESCE(last_pushed_at, ''), excluded.last_pushed_at),
                pending_push_count = 0
            ",
            params![entity, format_timestamp(at)],
        )?;
        Ok(())
    }

    /// Advances the pull high-water mark for an entity.
    pub fn advance_pull_cursor(&self, entity: &str, at: DateTime<Utc>) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO sync_state (entity_name, last_pulled_at, pending_push_count)
            VALUES (?, ?, 0)
            ON CONFLICT(entity_name) DO UPDATE SET
                last_pulled_at = MAX(COALESCE(last_pulled_at, ''), excluded.last_pulled_at)
            ",
            params![entity, format_timestamp(at)],
        )?;
        Ok(())
    }

    /// Counts events newer than the entity's push cursor.
    pub fn pending_push_count(&self, entity: &str) -> Result<i64, DbError> {
        let cursor = self
            .sync_state(entity)?
            .and_then(|state| state.last_pushed_at)
            .map_or_else(String::new, format_timestamp);
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_event WHERE timestamp > ?",
            [cursor],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Sets a small operational flag (e.g. the last sync status text).
    pub fn set_config(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO system_config (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
            params![key, value],
        )?;
        Ok(())
    }

    /// Reads an operational flag.
    pub fn get_config(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row("SELECT value FROM system_config WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, Option<String>, bool)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn collect_events(
    rows: impl Iterator<Item = rusqlite::Result<(String, String, String, String, Option<String>, bool)>>,
) -> Result<Vec<RawEvent>, DbError> {
    let mut events = Vec::new();
    for row in rows {
        let (id, timestamp, device_id, app_pkg_name, window_title, is_idle) = row?;
        let parsed = DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|source| DbError::TimestampParse {
                event_id: id.clone(),
                timestamp: timestamp.clone(),
                source,
            })?;
        events.push(RawEvent {
            id,
            timestamp: parsed,
            device_id,
            app_pkg_name,
            window_title,
            is_idle,
        });
    }
    Ok(events)
}

fn parse_cursor(value: Option<&str>) -> Result<Option<DateTime<Utc>>, DbError> {
    let Some(value) = value else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(value)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| DbError::InvalidField {
            field: "sync cursor",
            value: value.to_string(),
        })
}
