//! History store port: Trait for the bounded per-user result log.
//!
//! This trait abstracts the storage backend (SQLite, in-memory) from the
//! scoring service.

use std::time::Instant;

use crate::domain::{HistoryEntry, UserId};

/// Default number of entries retained per user.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// What an append did to the user's collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Entries stored for the user after the append
    pub stored: usize,
    /// Entries evicted to stay within capacity
    pub evicted: usize,
    /// Timestamp the entry was stored under
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Capacity-bounded, per-user history log.
///
/// # Ordering
///
/// Entries are ordered by `timestamp`. An append is stamped at its commit
/// point with `max(entry.timestamp, newest stored + 1µs)`, so timestamp order
/// is commit order and a fresh append is never the one evicted. `list`
/// returns entries oldest first; eviction removes from the same end.
///
/// # Concurrency
///
/// Implementations serialize appends for the same user so the capacity bound
/// and ordering hold under concurrent requests. Appends for different users
/// must not wait on each other.
pub trait HistoryStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Maximum entries retained per user.
    fn capacity(&self) -> usize;

    /// Insert an entry for `entry.identity`, evicting the oldest entries
    /// past capacity.
    ///
    /// Either the insert and its evictions all commit, or nothing does.
    /// Waits for locks and the database at most until `deadline`; past it,
    /// nothing is committed.
    ///
    /// # Errors
    /// Returns error if the underlying storage fails or the deadline passes.
    fn append_before(
        &self,
        entry: &HistoryEntry,
        deadline: Option<Instant>,
    ) -> Result<AppendOutcome, Self::Error>;

    /// [`HistoryStore::append_before`] with no deadline.
    ///
    /// # Errors
    /// Returns error if the underlying storage fails.
    fn append(&self, entry: &HistoryEntry) -> Result<AppendOutcome, Self::Error> {
        self.append_before(entry, None)
    }

    /// All entries for a user, oldest first.
    ///
    /// # Errors
    /// Returns error if the underlying storage fails.
    fn list(&self, user: &UserId) -> Result<Vec<HistoryEntry>, Self::Error>;

    /// Number of entries stored for a user.
    ///
    /// # Errors
    /// Returns error if the underlying storage fails.
    fn count(&self, user: &UserId) -> Result<usize, Self::Error>;

    /// Delete every entry for a user, returning how many were removed.
    ///
    /// # Errors
    /// Returns error if the underlying storage fails.
    fn clear(&self, user: &UserId) -> Result<usize, Self::Error>;
}
