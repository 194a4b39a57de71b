//! Per-request time budget.

use std::time::{Duration, Instant};

use crate::MedipulseError;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    /// The instant the budget runs out, for handing to blocking calls.
    /// `None` if it lies beyond what `Instant` can represent.
    #[must_use]
    pub fn expires_at(&self) -> Option<Instant> {
        self.started.checked_add(self.budget)
    }

    #[must_use]
    pub fn exceeded(&self, stage: &'static str) -> MedipulseError {
        MedipulseError::Timeout {
            stage,
            budget_ms: self.budget.as_millis() as u64,
        }
    }

    /// # Errors
    /// Returns `MedipulseError::Timeout` naming `stage` if the budget is spent.
    pub fn check(&self, stage: &'static str) -> Result<(), MedipulseError> {
        if self.expired() {
            return Err(self.exceeded(stage));
        }
        Ok(())
    }
}
