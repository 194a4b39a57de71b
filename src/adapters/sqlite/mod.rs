//! SQLite adapter: Implementation of HistoryStore.
//!
//! Provides local persistence for per-user scoring history.
//!
//! # Concurrency
//!
//! Each operation opens its own connection (WAL journal, busy timeout), so
//! readers and writers for different users are not funnelled through a
//! shared handle. Appends for one user are serialized by [`IdentityLocks`]
//! and run inside an `IMMEDIATE` transaction: the insert and any evictions
//! commit together or not at all.
//!
//! SQLite itself allows one writer per database file, so `IMMEDIATE`
//! transactions from different users still queue at the engine. Each one is
//! a single insert plus delete, and the wait is bounded by the caller's
//! deadline through `busy_timeout`. A user stuck waiting on their own
//! identity lock holds no database lock.
//!
//! # Ordering
//!
//! Rows are ordered by `timestamp_us`, ties broken by the autoincrement
//! `seq`. Each append is stamped strictly after the user's newest row, so
//! that order is commit order. Eviction deletes everything past the newest
//! `capacity` rows.
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rusqlite::{params, Connection, TransactionBehavior};

use crate::domain::{HistoryEntry, PatientRecord, PredictionResult, RiskLabel, UserId};
use crate::ports::{AppendOutcome, HistoryStore};

mod locks;

pub use locks::IdentityLocks;
pub(crate) use locks::lock_until;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History lock poisoned")]
    LockPoisoned,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage deadline exceeded")]
    DeadlineExceeded,
}

/// SQLite history store.
pub struct SqliteHistoryStore {
    path: PathBuf,
    capacity: usize,
    busy_timeout: Duration,
    locks: IdentityLocks,
}

impl SqliteHistoryStore {
    /// Open (and if needed create) the history database at `path`.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(
        path: P,
        capacity: usize,
        busy_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            path,
            capacity: capacity.max(1),
            busy_timeout,
            locks: IdentityLocks::new(),
        };
        store.init_schema()?;

        tracing::info!(
            "Opened history store at {:?} (capacity={})",
            store.path,
            store.capacity
        );
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn locks(&self) -> &IdentityLocks {
        &self.locks
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        self.connect_before(None)
    }

    /// Open a connection whose busy wait ends no later than `deadline`.
    fn connect_before(&self, deadline: Option<Instant>) -> Result<Connection, StorageError> {
        let wait = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(StorageError::DeadlineExceeded);
                }
                self.busy_timeout.min(remaining)
            }
            None => self.busy_timeout,
        };
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(wait)?;
        Ok(conn)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.connect()?;

        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        tracing::debug!("SQLite journal mode: {mode}");

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                identity TEXT NOT NULL,
                timestamp_us INTEGER NOT NULL,
                input_snapshot TEXT NOT NULL,
                probability REAL NOT NULL,
                risk_label TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_identity_time
                ON history(identity, timestamp_us, seq);
            ",
        )?;

        Ok(())
    }

    fn row_to_entry(row: RawRow) -> Result<HistoryEntry, StorageError> {
        let identity = UserId::new(row.identity).map_err(StorageError::Serialization)?;
        let timestamp = chrono::DateTime::from_timestamp_micros(row.timestamp_us).ok_or_else(|| {
            StorageError::Serialization(format!("invalid timestamp {}", row.timestamp_us))
        })?;
        let input_snapshot: PatientRecord = serde_json::from_str(&row.input_snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let risk_label = RiskLabel::parse(&row.risk_label).ok_or_else(|| {
            StorageError::Serialization(format!("unknown risk label {:?}", row.risk_label))
        })?;

        Ok(HistoryEntry {
            id: row.id,
            identity,
            timestamp,
            input_snapshot,
            result: PredictionResult {
                probability: row.probability,
                risk_label,
            },
        })
    }
}

struct RawRow {
    id: String,
    identity: String,
    timestamp_us: i64,
    input_snapshot: String,
    probability: f64,
    risk_label: String,
}

impl HistoryStore for SqliteHistoryStore {
    type Error = StorageError;

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn append_before(
        &self,
        entry: &HistoryEntry,
        deadline: Option<Instant>,
    ) -> Result<AppendOutcome, Self::Error> {
        let snapshot = serde_json::to_string(&entry.input_snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let user_lock = self.locks.lock_for(&entry.identity)?;
        let _guard = lock_until(&*user_lock, deadline)?;

        let mut conn = self.connect_before(deadline)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let newest_us: Option<i64> = tx.query_row(
            "SELECT MAX(timestamp_us) FROM history WHERE identity = ?1",
            params![entry.identity.as_str()],
            |row| row.get(0),
        )?;
        let requested_us = entry.timestamp.timestamp_micros();
        let timestamp_us = newest_us.map_or(requested_us, |newest| requested_us.max(newest + 1));
        let timestamp = chrono::DateTime::from_timestamp_micros(timestamp_us).ok_or_else(|| {
            StorageError::Serialization(format!("invalid timestamp {timestamp_us}"))
        })?;

        tx.execute(
            r"
            INSERT INTO history (
                id, identity, timestamp_us, input_snapshot, probability, risk_label
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                entry.id,
                entry.identity.as_str(),
                timestamp_us,
                snapshot,
                entry.result.probability,
                entry.result.risk_label.to_string(),
            ],
        )?;

        let evicted = tx.execute(
            r"
            DELETE FROM history
            WHERE seq IN (
                SELECT seq FROM history
                WHERE identity = ?1
                ORDER BY timestamp_us DESC, seq DESC
                LIMIT -1 OFFSET ?2
            )
            ",
            params![entry.identity.as_str(), self.capacity as i64],
        )?;

        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM history WHERE identity = ?1",
            params![entry.identity.as_str()],
            |row| row.get(0),
        )?;

        if deadline.is_some_and(|d| Instant::now() >= d) {
            // Dropping the transaction rolls it back.
            return Err(StorageError::DeadlineExceeded);
        }
        tx.commit()?;

        tracing::debug!(
            "Appended history entry {} for {} (stored={stored}, evicted={evicted})",
            entry.id,
            entry.identity
        );
        Ok(AppendOutcome {
            stored: stored as usize,
            evicted,
            timestamp,
        })
    }

    fn list(&self, user: &UserId) -> Result<Vec<HistoryEntry>, Self::Error> {
        let conn = self.connect()?;

        let mut stmt = conn.prepare(
            r"
            SELECT id, identity, timestamp_us, input_snapshot, probability, risk_label
            FROM history
            WHERE identity = ?1
            ORDER BY timestamp_us ASC, seq ASC
            ",
        )?;

        let rows = stmt
            .query_map(params![user.as_str()], |row| {
                Ok(RawRow {
                    id: row.get(0)?,
                    identity: row.get(1)?,
                    timestamp_us: row.get(2)?,
                    input_snapshot: row.get(3)?,
                    probability: row.get(4)?,
                    risk_label: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    fn count(&self, user: &UserId) -> Result<usize, Self::Error> {
        let conn = self.connect()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM history WHERE identity = ?1",
            params![user.as_str()],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    fn clear(&self, user: &UserId) -> Result<usize, Self::Error> {
        let user_lock = self.locks.lock_for(user)?;
        let _guard = user_lock.lock().map_err(|_| StorageError::LockPoisoned)?;

        let conn = self.connect()?;
        let removed = conn.execute("DELETE FROM history WHERE identity = ?1", params![user.as_str()])?;
        tracing::debug!("Deleted {removed} rows for {user}");
        Ok(removed)
    }
}
