//! # Sample Store
//! Durable history of `(timestamp, value)` samples for a single metric.
//!
//! Backed by one SQLite table keyed by timestamp, so a restart picks up
//! where the previous process stopped. All access goes through one
//! connection behind a mutex: writes are serialized, and every read is a
//! single statement, so a reader sees a sample either fully or not at all.
//!
//! The methods are blocking. Async callers run them on the blocking pool
//! (see [`crate::growth`]) so timers on the runtime are never starved.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::StorageError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pledged_history (
        timestamp REAL PRIMARY KEY,
        pledged_space REAL NOT NULL
    )
";

/// One observation of the tracked metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Unix seconds.
    pub timestamp: f64,
    pub value: f64,
}

/// Maximum age of retained samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionPolicy {
    pub max_age_secs: f64,
}

impl RetentionPolicy {
    pub fn days(days: u32) -> Self {
        Self {
            max_age_secs: f64::from(days) * 86_400.0,
        }
    }
}

impl Default for RetentionPolicy {
    /// One year.
    fn default() -> Self {
        Self::days(365)
    }
}

/// Earliest and latest sample inside a lookback range, plus how many
/// samples the range holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowBounds {
    pub earliest: Sample,
    pub latest: Sample,
    pub count: usize,
}

#[derive(Debug)]
pub struct SampleStore {
    conn: Mutex<Connection>,
}

impl SampleStore {
    /// Open (or create) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// Transient store, used by tests and dry runs.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-applied row
        // behind (each statement is atomic), so the connection stays usable.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert keyed by timestamp; a repeated timestamp replaces the value.
    pub fn insert(&self, timestamp: f64, value: f64) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO pledged_history (timestamp, pledged_space) VALUES (?1, ?2)",
            params![timestamp, value],
        )?;
        Ok(())
    }

    /// `(min, max)` of the values with `timestamp >= from`, or `None` when
    /// no sample is that recent.
    pub fn range_min_max(&self, from: f64) -> Result<Option<(f64, f64)>, StorageError> {
        let row: (Option<f64>, Option<f64>) = self.conn().query_row(
            "SELECT MIN(pledged_space), MAX(pledged_space) FROM pledged_history WHERE timestamp >= ?1",
            params![from],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(match row {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    /// Earliest and latest sample with `timestamp >= from`, read in one
    /// statement.
    pub fn window_bounds(&self, from: f64) -> Result<Option<WindowBounds>, StorageError> {
        let row = self
            .conn()
            .query_row(
                "SELECT
                    (SELECT timestamp FROM pledged_history WHERE timestamp >= ?1 ORDER BY timestamp ASC LIMIT 1),
                    (SELECT pledged_space FROM pledged_history WHERE timestamp >= ?1 ORDER BY timestamp ASC LIMIT 1),
                    (SELECT timestamp FROM pledged_history ORDER BY timestamp DESC LIMIT 1),
                    (SELECT pledged_space FROM pledged_history ORDER BY timestamp DESC LIMIT 1),
                    (SELECT COUNT(*) FROM pledged_history WHERE timestamp >= ?1)",
                params![from],
                |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )?;

        Ok(match row {
            (Some(t0), Some(v0), Some(t1), Some(v1), count) if count > 0 => Some(WindowBounds {
                earliest: Sample {
                    timestamp: t0,
                    value: v0,
                },
                latest: Sample {
                    timestamp: t1,
                    value: v1,
                },
                count: usize::try_from(count).unwrap_or(usize::MAX),
            }),
            _ => None,
        })
    }

    /// Delete samples older than `now - policy.max_age_secs`, always keeping
    /// the newest sample. Returns the number of rows removed.
    pub fn prune(&self, policy: RetentionPolicy, now: f64) -> Result<usize, StorageError> {
        let cutoff = now - policy.max_age_secs;
        let removed = self.conn().execute(
            "DELETE FROM pledged_history
             WHERE timestamp < ?1
               AND timestamp < (SELECT MAX(timestamp) FROM pledged_history)",
            params![cutoff],
        )?;
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM pledged_history", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Oldest sample in the store.
    pub fn earliest(&self) -> Result<Option<Sample>, StorageError> {
        self.single_sample(
            "SELECT timestamp, pledged_space FROM pledged_history ORDER BY timestamp ASC LIMIT 1",
        )
    }

    /// Newest sample in the store.
    pub fn latest(&self) -> Result<Option<Sample>, StorageError> {
        self.single_sample(
            "SELECT timestamp, pledged_space FROM pledged_history ORDER BY timestamp DESC LIMIT 1",
        )
    }

    fn single_sample(&self, sql: &str) -> Result<Option<Sample>, StorageError> {
        let sample = self
            .conn()
            .query_row(sql, [], |row| {
                Ok(Sample {
                    timestamp: row.get(0)?,
                    value: row.get(1)?,
                })
            })
            .optional()?;
        Ok(sample)
    }

    /// All samples, ascending by timestamp.
    pub fn samples(&self) -> Result<Vec<Sample>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT timestamp, pledged_space FROM pledged_history ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Sample {
                timestamp: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_timestamp_keeps_last_value() {
        let store = SampleStore::in_memory().unwrap();
        store.insert(100.0, 1.0).unwrap();
        store.insert(100.0, 2.5).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(
            store.latest().unwrap(),
            Some(Sample {
                timestamp: 100.0,
                value: 2.5
            })
        );
    }

    #[test]
    fn range_min_max_only_sees_recent_subset() {
        let store = SampleStore::in_memory().unwrap();
        store.insert(10.0, 5.0).unwrap();
        store.insert(20.0, 1.0).unwrap();
        store.insert(30.0, 3.0).unwrap();
        assert_eq!(store.range_min_max(15.0).unwrap(), Some((1.0, 3.0)));
        assert_eq!(store.range_min_max(0.0).unwrap(), Some((1.0, 5.0)));
        assert_eq!(store.range_min_max(31.0).unwrap(), None);
    }

    #[test]
    fn window_bounds_pick_first_and_last() {
        let store = SampleStore::in_memory().unwrap();
        store.insert(10.0, 5.0).unwrap();
        store.insert(20.0, 1.0).unwrap();
        store.insert(30.0, 3.0).unwrap();
        let b = store.window_bounds(15.0).unwrap().unwrap();
        assert_eq!(b.earliest.value, 1.0);
        assert_eq!(b.latest.value, 3.0);
        assert_eq!(b.count, 2);
        assert!(store.window_bounds(40.0).unwrap().is_none());
    }

    #[test]
    fn prune_keeps_newest_even_when_stale() {
        let store = SampleStore::in_memory().unwrap();
        store.insert(1.0, 1.0).unwrap();
        store.insert(2.0, 2.0).unwrap();
        let removed = store.prune(RetentionPolicy { max_age_secs: 10.0 }, 1_000.0).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.latest().unwrap().map(|s| s.value), Some(2.0));
    }

    #[test]
    fn prune_on_empty_store_is_noop() {
        let store = SampleStore::in_memory().unwrap();
        assert_eq!(store.prune(RetentionPolicy::default(), 1e9).unwrap(), 0);
        assert!(store.is_empty().unwrap());
    }
}
