//! Per-user write locks.
//!
//! The registry mutex is held only while looking up or creating a user's
//! lock; the append itself runs under the user's own mutex, so writers for
//! different users never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use crate::domain::UserId;

use super::StorageError;

/// Registry size above which idle locks are pruned.
const PRUNE_THRESHOLD: usize = 1024;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Lock `mutex`, giving up once `deadline` has passed.
///
/// # Errors
/// `DeadlineExceeded` on timeout, `LockPoisoned` if a holder panicked.
pub(crate) fn lock_until<T>(
    mutex: &Mutex<T>,
    deadline: Option<Instant>,
) -> Result<MutexGuard<'_, T>, StorageError> {
    let Some(deadline) = deadline else {
        return mutex.lock().map_err(|_| StorageError::LockPoisoned);
    };
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(_)) => return Err(StorageError::LockPoisoned),
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return Err(StorageError::DeadlineExceeded);
                }
                std::thread::sleep(LOCK_POLL_INTERVAL);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The write lock for `user`, created on first use.
    ///
    /// # Errors
    /// Returns `StorageError::LockPoisoned` if the registry mutex is poisoned.
    pub fn lock_for(&self, user: &UserId) -> Result<Arc<Mutex<()>>, StorageError> {
        let mut locks = self.locks.lock().map_err(|_| StorageError::LockPoisoned)?;

        if locks.len() > PRUNE_THRESHOLD {
            // Only the registry holds idle locks.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        Ok(Arc::clone(locks.entry(user.clone()).or_default()))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}
