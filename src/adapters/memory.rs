//! In-memory adapter: Implementation of HistoryStore without persistence.
//!
//! Each user owns a `Mutex<VecDeque>`; the outer map is only write-locked to
//! create or drop a user's slot. Useful for ephemeral deployments and tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use crate::adapters::sqlite::lock_until;
use crate::adapters::StorageError;
use crate::domain::{HistoryEntry, UserId};
use crate::ports::{AppendOutcome, HistoryStore};

type UserLog = Arc<Mutex<VecDeque<HistoryEntry>>>;

pub struct MemoryHistoryStore {
    capacity: usize,
    users: RwLock<HashMap<UserId, UserLog>>,
}

impl MemoryHistoryStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            users: RwLock::new(HashMap::new()),
        }
    }

    fn existing(&self, user: &UserId) -> Result<Option<UserLog>, StorageError> {
        let users = self.users.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(users.get(user).cloned())
    }

    fn log_for(&self, user: &UserId) -> Result<UserLog, StorageError> {
        if let Some(log) = self.existing(user)? {
            return Ok(log);
        }
        let mut users = self.users.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(Arc::clone(users.entry(user.clone()).or_default()))
    }

    #[cfg(test)]
    fn slots(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }
}

impl HistoryStore for MemoryHistoryStore {
    type Error = StorageError;

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn append_before(
        &self,
        entry: &HistoryEntry,
        deadline: Option<Instant>,
    ) -> Result<AppendOutcome, Self::Error> {
        let slot = self.log_for(&entry.identity)?;
        let mut log = lock_until(&*slot, deadline)?;
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(StorageError::DeadlineExceeded);
        }

        // Stamp strictly after the newest entry so the deque stays in
        // commit order.
        let mut stored = entry.clone();
        if let Some(newest) = log.back() {
            if newest.timestamp >= stored.timestamp {
                stored.timestamp = newest.timestamp + chrono::Duration::microseconds(1);
            }
        }
        let timestamp = stored.timestamp;
        log.push_back(stored);

        let mut evicted = 0;
        while log.len() > self.capacity {
            log.pop_front();
            evicted += 1;
        }

        Ok(AppendOutcome {
            stored: log.len(),
            evicted,
            timestamp,
        })
    }

    fn list(&self, user: &UserId) -> Result<Vec<HistoryEntry>, Self::Error> {
        match self.existing(user)? {
            Some(log) => {
                let log = log.lock().map_err(|_| StorageError::LockPoisoned)?;
                Ok(log.iter().cloned().collect())
            }
            None => Ok(Vec::new()),
        }
    }

    fn count(&self, user: &UserId) -> Result<usize, Self::Error> {
        match self.existing(user)? {
            Some(log) => {
                let log = log.lock().map_err(|_| StorageError::LockPoisoned)?;
                Ok(log.len())
            }
            None => Ok(0),
        }
    }

    fn clear(&self, user: &UserId) -> Result<usize, Self::Error> {
        let mut users = self.users.write().map_err(|_| StorageError::LockPoisoned)?;
        let Some(slot) = users.get(user) else {
            return Ok(0);
        };

        let removed = {
            let mut log = slot.lock().map_err(|_| StorageError::LockPoisoned)?;
            let removed = log.len();
            log.clear();
            removed
        };

        // Only drop the slot when no appender holds a handle to it.
        if Arc::strong_count(slot) == 1 {
            users.remove(user);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DecisionThreshold, PatientRecord, PredictionResult};

    fn entry(user: &UserId, second: i64) -> HistoryEntry {
        let ts = chrono::DateTime::from_timestamp(1_700_000_000 + second, 0).expect("valid ts");
        let record = PatientRecord {
            gender: "Male".into(),
            age: 52.0,
            hypertension: 1,
            heart_disease: 0,
            smoking_history: "former".into(),
            bmi: 30.1,
            hba1c_level: 6.6,
            blood_glucose_level: 160.0,
        };
        let result = PredictionResult::from_probability(0.4, DecisionThreshold::default());
        HistoryEntry::at(user.clone(), ts, record, result)
    }

    #[test]
    fn test_fifo_eviction() {
        let store = MemoryHistoryStore::new(50);
        let alice = UserId::new("alice").expect("valid id");

        for i in 0..120 {
            let outcome = store.append(&entry(&alice, i)).expect("append");
            assert!(outcome.stored <= 50);
        }

        let listed = store.list(&alice).expect("list");
        assert_eq!(listed.len(), 50);
        assert!(listed.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(listed[0].timestamp.timestamp(), 1_700_000_000 + 70);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let store = MemoryHistoryStore::new(2);
        let alice = UserId::new("alice").expect("valid id");
        let first = entry(&alice, 5);
        let second = entry(&alice, 5);
        let third = entry(&alice, 5);
        for e in [&first, &second, &third] {
            store.append(e).expect("append");
        }
        let listed = store.list(&alice).expect("list");
        assert!(listed[0].timestamp < listed[1].timestamp);
        let ids: Vec<_> = listed.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second.id, third.id]);
    }

    #[test]
    fn test_future_stamped_history_does_not_evict_new_entry() {
        let store = MemoryHistoryStore::new(3);
        let alice = UserId::new("alice").expect("valid id");
        for i in 0..3 {
            store.append(&entry(&alice, 300 + i)).expect("append");
        }

        let late = entry(&alice, 0);
        let outcome = store.append(&late).expect("append");
        assert_eq!(outcome.evicted, 1);
        assert!(outcome.timestamp > entry(&alice, 302).timestamp);

        let listed = store.list(&alice).expect("list");
        assert_eq!(listed.len(), 3);
        assert_eq!(listed.last().map(|e| e.id.as_str()), Some(late.id.as_str()));
    }

    #[test]
    fn test_append_gives_up_at_deadline() {
        let store = MemoryHistoryStore::new(50);
        let alice = UserId::new("alice").expect("valid id");
        let slot = store.log_for(&alice).expect("slot");
        let held = slot.lock().expect("lock");

        let deadline = Instant::now() + std::time::Duration::from_millis(20);
        assert!(matches!(
            store.append_before(&entry(&alice, 0), Some(deadline)),
            Err(StorageError::DeadlineExceeded)
        ));
        drop(held);
        assert_eq!(store.count(&alice).expect("count"), 0);
    }

    #[test]
    fn test_clear_drops_user_slot() {
        let store = MemoryHistoryStore::new(50);
        let alice = UserId::new("alice").expect("valid id");
        let bob = UserId::new("bob").expect("valid id");
        store.append(&entry(&alice, 0)).expect("append");
        store.append(&entry(&alice, 1)).expect("append");
        store.append(&entry(&bob, 0)).expect("append");
        assert_eq!(store.slots(), 2);

        assert_eq!(store.clear(&alice).expect("clear"), 2);
        assert_eq!(store.slots(), 1);
        assert!(store.list(&alice).expect("list").is_empty());

        store.append(&entry(&alice, 2)).expect("append");
        assert_eq!(store.count(&alice).expect("count"), 1);
    }

    #[test]
    fn test_unknown_user_is_empty() {
        let store = MemoryHistoryStore::new(50);
        let ghost = UserId::new("nobody").expect("valid id");
        assert!(store.list(&ghost).expect("list").is_empty());
        assert_eq!(store.count(&ghost).expect("count"), 0);
        assert_eq!(store.clear(&ghost).expect("clear"), 0);
    }

    #[test]
    fn test_concurrent_appends_same_user() {
        let store = Arc::new(MemoryHistoryStore::new(50));
        let alice = UserId::new("alice").expect("valid id");

        let handles: Vec<_> = (0..10)
            .map(|t| {
                let store = Arc::clone(&store);
                let alice = alice.clone();
                std::thread::spawn(move || {
                    let mut committed = Vec::new();
                    for i in 0..30 {
                        let e = entry(&alice, t * 30 + i);
                        let outcome = store.append(&e).expect("append");
                        assert!(store.count(&alice).expect("count") <= 50);
                        committed.push((outcome.timestamp, e.id));
                    }
                    committed
                })
            })
            .collect();
        let mut committed: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();
        committed.sort();
        assert!(committed.windows(2).all(|w| w[0].0 < w[1].0));

        let listed: Vec<_> = store.list(&alice).expect("list").into_iter().map(|e| e.id).collect();
        let newest: Vec<_> = committed[committed.len() - 50..].iter().map(|(_, id)| id.clone()).collect();
        assert_eq!(listed, newest);
    }
}
