//! SQLite-backed reading store
//!
//! Holds two tables:
//! - `readings`: one row per computed level (height, percentage, UTC time)
//! - `calibration`: key/value pairs for `Max_Distance`, `Min_Distance` and
//!   `Min_Max_Uncertainty`
//!
//! Timestamps are stored as UTC text in a fixed-width format so that string
//! order matches time order. The `time` column is unique and inserts use
//! `INSERT OR IGNORE`, so writing the same reading twice keeps one row.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use hydrosonde_core::types::{KEY_MAX_DISTANCE, KEY_MIN_DISTANCE, KEY_MIN_MAX_UNCERTAINTY};
use hydrosonde_core::{CalibrationInfo, CalibrationSource, LevelResult, ReadingSink};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Storage format for the `time` column.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a timestamp the way it is stored.
pub fn format_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIME_FORMAT).to_string()
}

/// Parse a stored timestamp.
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, TIME_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| StoreError::InvalidTimestamp(text.to_string()))
}

/// A stored height with the percentage recorded alongside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredLevel {
    pub height: f64,
    pub percentage: i32,
}

/// Reading sink and calibration source on a single SQLite connection.
pub struct ReadingStore {
    conn: Connection,
}

impl ReadingStore {
    /// Create or open the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init_schema(&conn)?;

        info!(path = %path.display(), "Reading store opened");
        Ok(Self { conn })
    }

    /// Store that lives only as long as the connection.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                height REAL NOT NULL,
                percentage INTEGER NOT NULL,
                time TEXT NOT NULL UNIQUE
            );
            CREATE INDEX IF NOT EXISTS idx_readings_time ON readings(time);
            CREATE TABLE IF NOT EXISTS calibration (
                key TEXT PRIMARY KEY,
                value REAL NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Append a reading. Returns `false` if a reading with the same
    /// timestamp was already stored.
    pub fn insert(&self, reading: &LevelResult) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO readings (height, percentage, time) VALUES (?1, ?2, ?3)",
            params![
                reading.height,
                reading.percentage,
                format_time(&reading.timestamp)
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn reading_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Most recent reading, if any.
    pub fn latest_reading(&self) -> Result<Option<LevelResult>> {
        let row = self
            .conn
            .query_row(
                "SELECT height, percentage, time FROM readings ORDER BY time DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, i32>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((height, percentage, time)) => Ok(Some(LevelResult {
                height,
                percentage,
                timestamp: parse_time(&time)?,
            })),
            None => Ok(None),
        }
    }

    /// Up to `limit` newest levels, newest first, heights rounded to 2 places.
    pub fn latest_levels(&self, limit: usize) -> Result<Vec<StoredLevel>> {
        let mut stmt = self.conn.prepare(
            "SELECT height, percentage FROM readings ORDER BY time DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], level_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Up to `limit` newest levels recorded at or before `at`, newest first.
    pub fn levels_at_or_before(&self, at: &DateTime<Utc>, limit: usize) -> Result<Vec<StoredLevel>> {
        let mut stmt = self.conn.prepare(
            "SELECT height, percentage FROM readings WHERE time <= ?1 ORDER BY time DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![format_time(at), limit as i64], level_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Newest heights, rounded to 2 places.
    pub fn latest_heights(&self, limit: usize) -> Result<Vec<f64>> {
        Ok(self
            .latest_levels(limit)?
            .into_iter()
            .map(|level| level.height)
            .collect())
    }

    /// Write all three calibration values.
    pub fn set_calibration(&self, calib: &CalibrationInfo) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO calibration (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )?;
        stmt.execute(params![KEY_MAX_DISTANCE, calib.max_distance])?;
        stmt.execute(params![KEY_MIN_DISTANCE, calib.min_distance])?;
        stmt.execute(params![KEY_MIN_MAX_UNCERTAINTY, calib.min_max_uncertainty])?;
        debug!(?calib, "Calibration stored");
        Ok(())
    }

    /// Read the calibration values. Fails if any key is absent.
    pub fn calibration(&self) -> Result<CalibrationInfo> {
        Ok(CalibrationInfo {
            max_distance: self.calibration_value(KEY_MAX_DISTANCE)?,
            min_distance: self.calibration_value(KEY_MIN_DISTANCE)?,
            min_max_uncertainty: self.calibration_value(KEY_MIN_MAX_UNCERTAINTY)?,
        })
    }

    fn calibration_value(&self, key: &'static str) -> Result<f64> {
        self.conn
            .query_row(
                "SELECT value FROM calibration WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::MissingCalibration { key })
    }
}

fn level_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredLevel> {
    let height: f64 = row.get(0)?;
    Ok(StoredLevel {
        height: (height * 100.0).round() / 100.0,
        percentage: row.get(1)?,
    })
}

impl ReadingSink for ReadingStore {
    fn insert_reading(&mut self, reading: &LevelResult) -> hydrosonde_core::Result<()> {
        match self.insert(reading) {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(timestamp = %reading.timestamp, "Reading already stored");
                Ok(())
            }
            Err(err) => Err(hydrosonde_core::Error::SinkFailure(err.to_string())),
        }
    }
}

impl CalibrationSource for ReadingStore {
    fn load_calibration(&mut self) -> hydrosonde_core::Result<CalibrationInfo> {
        match self.calibration() {
            Ok(calib) => Ok(calib),
            Err(err @ StoreError::MissingCalibration { .. }) => {
                Err(hydrosonde_core::Error::InvalidConfiguration(err.to_string()))
            }
            Err(err) => Err(hydrosonde_core::Error::CalibrationUnavailable(err.to_string())),
        }
    }
}
