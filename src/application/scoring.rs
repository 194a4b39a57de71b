//! Scoring service: Orchestrates one risk-scoring request.
//!
//! This service coordinates:
//! - Validation and encoding of the submitted record
//! - Inference with the frozen model
//! - Persistence to the caller's bounded history (signed-in users only)
//!
//! Each request walks `Received → Validated → Encoded → Scored →
//! {Persisted | Skipped} → Responded`. A storage failure after scoring does
//! not fail the request; the response reports `persisted: false` instead.
//! The request deadline is handed to the store, so a slow or contended
//! store ends the request with `Timeout` rather than overrunning it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::adapters::StorageError;
use crate::application::{Deadline, FeatureEncoder, RiskPredictor};
use crate::domain::{HistoryEntry, Identity, PatientRecord, PredictionResult, RiskLabel};
use crate::ports::{AppendOutcome, AuthGateway, Classifier, HistoryStore};
use crate::MedipulseError;

/// Message shown for failures whose detail stays in the logs.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Timing knobs for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    pub request_timeout: Duration,
    pub storage_retry_backoff: Duration,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(5000),
            storage_retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Validated,
    Encoded,
    Scored,
    Persisted,
    Skipped,
    Responded,
    ValidationFailed,
    ModelFailed,
    StorageDegraded,
    TimedOut,
}

impl RequestStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Encoded => "encoded",
            Self::Scored => "scored",
            Self::Persisted => "persisted",
            Self::Skipped => "skipped",
            Self::Responded => "responded",
            Self::ValidationFailed => "validation_failed",
            Self::ModelFailed => "model_failed",
            Self::StorageDegraded => "storage_degraded",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for RequestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned for a successful score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreResponse {
    pub probability: f64,
    pub risk_label: RiskLabel,
    pub persisted: bool,
}

impl ScoreResponse {
    fn new(result: PredictionResult, persisted: bool) -> Self {
        Self {
            probability: result.probability,
            risk_label: result.risk_label,
            persisted,
        }
    }
}

/// User-facing error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    pub message: String,
}

impl From<&MedipulseError> for ErrorBody {
    fn from(err: &MedipulseError) -> Self {
        match err {
            MedipulseError::Validation(e) => Self {
                kind: "validation",
                field: Some(e.field()),
                message: e.to_string(),
            },
            MedipulseError::Timeout { .. } => Self {
                kind: "timeout",
                field: None,
                message: "The request took too long and was cancelled.".into(),
            },
            MedipulseError::Storage(_) => Self {
                kind: "storage",
                field: None,
                message: "History is temporarily unavailable.".into(),
            },
            MedipulseError::Model(_) => Self {
                kind: "model",
                field: None,
                message: GENERIC_ERROR_MESSAGE.into(),
            },
            _ => Self {
                kind: "internal",
                field: None,
                message: GENERIC_ERROR_MESSAGE.into(),
            },
        }
    }
}

/// Service for scoring patient records and managing per-user history.
///
/// The encoder and predictor are immutable and shared; the store handles its
/// own per-user locking, so one service serves every request thread.
pub struct ScoringService<C, S>
where
    C: Classifier,
    S: HistoryStore,
{
    encoder: Arc<FeatureEncoder>,
    predictor: Arc<RiskPredictor<C>>,
    store: Arc<S>,
    policy: ScoringPolicy,
}

impl<C, S> ScoringService<C, S>
where
    C: Classifier,
    S: HistoryStore,
    S::Error: Into<StorageError>,
{
    /// Create a new scoring service.
    pub fn new(
        encoder: Arc<FeatureEncoder>,
        predictor: Arc<RiskPredictor<C>>,
        store: Arc<S>,
        policy: ScoringPolicy,
    ) -> Self {
        Self {
            encoder,
            predictor,
            store,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    /// Score a record for the identity reported by `auth`.
    ///
    /// # Errors
    /// See [`ScoringService::score`].
    pub fn score_for<A: AuthGateway>(
        &self,
        auth: &A,
        record: PatientRecord,
    ) -> Result<ScoreResponse, MedipulseError> {
        self.score(&auth.current_identity(), record)
    }

    /// Parse raw form fields, then score them.
    ///
    /// # Errors
    /// Returns `Validation` for missing or unparseable fields, otherwise as
    /// [`ScoringService::score`].
    pub fn score_form(
        &self,
        identity: &Identity,
        form: &HashMap<String, String>,
    ) -> Result<ScoreResponse, MedipulseError> {
        let record = PatientRecord::from_form(form).map_err(|e| {
            tracing::info!(stage = %RequestStage::ValidationFailed, "Rejected form: {e}");
            e
        })?;
        self.score(identity, record)
    }

    /// Score one record.
    ///
    /// Signed-in users get the result appended to their history; guests do
    /// not. `persisted: true` means the entry is in the user's history once
    /// the call returns. Storage failures are reported through `persisted`.
    ///
    /// # Errors
    /// - `Validation` if the record is rejected (nothing is scored or stored)
    /// - `Model` if inference fails
    /// - `Timeout` if the request deadline passes before the append commits
    pub fn score(
        &self,
        identity: &Identity,
        record: PatientRecord,
    ) -> Result<ScoreResponse, MedipulseError> {
        let deadline = Deadline::after(self.policy.request_timeout);
        tracing::debug!(stage = %RequestStage::Received, "Scoring request for {identity}");

        deadline.check("validate").map_err(timed_out)?;
        self.encoder.validate(&record).map_err(|e| {
            tracing::info!(stage = %RequestStage::ValidationFailed, "Rejected record: {e}");
            e
        })?;
        tracing::debug!(stage = %RequestStage::Validated, "Record accepted");

        let vector = self.encoder.encode(&record)?;
        tracing::debug!(stage = %RequestStage::Encoded, "Encoded {} features", vector.len());

        let result = self.predictor.predict(&vector).map_err(|e| {
            tracing::error!(stage = %RequestStage::ModelFailed, "Inference failed: {e}");
            e
        })?;
        tracing::debug!(
            stage = %RequestStage::Scored,
            "probability={:.4} label={}",
            result.probability,
            result.risk_label
        );

        deadline.check("persist").map_err(timed_out)?;

        let persisted = match identity.user_id() {
            Some(user) => {
                let entry = HistoryEntry::new(user.clone(), record, result);
                self.persist(&entry, &deadline)?
            }
            None => {
                tracing::debug!(stage = %RequestStage::Skipped, "Guest result not stored");
                false
            }
        };

        tracing::info!(
            stage = %RequestStage::Responded,
            "Scored request for {identity}: label={} persisted={persisted}",
            result.risk_label
        );
        Ok(ScoreResponse::new(result, persisted))
    }

    /// Append with one bounded retry. Returns whether the entry was stored.
    ///
    /// Both attempts and the backoff between them share the request deadline.
    fn persist(&self, entry: &HistoryEntry, deadline: &Deadline) -> Result<bool, MedipulseError> {
        let first = match self.append_within(entry, deadline)? {
            Ok(()) => return Ok(true),
            Err(e) => e,
        };

        if deadline.expired() {
            return Err(timed_out(deadline.exceeded("persist")));
        }
        let backoff = self.policy.storage_retry_backoff.min(deadline.remaining());
        tracing::warn!("History append failed, retrying in {backoff:?}: {first}");
        std::thread::sleep(backoff);
        deadline.check("persist").map_err(timed_out)?;

        match self.append_within(entry, deadline)? {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!(
                    stage = %RequestStage::StorageDegraded,
                    "History append failed after retry: {e}"
                );
                Ok(false)
            }
        }
    }

    /// One append bounded by the deadline. The inner error is a storage
    /// failure worth retrying; a deadline miss is the outer `Timeout`.
    fn append_within(
        &self,
        entry: &HistoryEntry,
        deadline: &Deadline,
    ) -> Result<Result<(), StorageError>, MedipulseError> {
        match self.store.append_before(entry, deadline.expires_at()) {
            Ok(outcome) => {
                if deadline.expired() {
                    // The store ignored the deadline; the entry may exist.
                    tracing::warn!("History append for {} returned after the deadline", entry.identity);
                    return Err(timed_out(deadline.exceeded("persist")));
                }
                log_persisted(entry, &outcome);
                Ok(Ok(()))
            }
            Err(e) => {
                let e: StorageError = e.into();
                if matches!(e, StorageError::DeadlineExceeded) || deadline.expired() {
                    tracing::debug!("History append gave up: {e}");
                    return Err(timed_out(deadline.exceeded("persist")));
                }
                Ok(Err(e))
            }
        }
    }

    /// History for an identity, oldest first. Guests have none.
    ///
    /// # Errors
    /// Returns `Storage` if the store cannot be read.
    pub fn history(&self, identity: &Identity) -> Result<Vec<HistoryEntry>, MedipulseError> {
        match identity.user_id() {
            Some(user) => self.store.list(user).map_err(storage_error),
            None => Ok(Vec::new()),
        }
    }

    /// Number of stored entries for an identity.
    ///
    /// # Errors
    /// Returns `Storage` if the store cannot be read.
    pub fn history_len(&self, identity: &Identity) -> Result<usize, MedipulseError> {
        match identity.user_id() {
            Some(user) => self.store.count(user).map_err(storage_error),
            None => Ok(0),
        }
    }

    /// Delete an identity's history, returning how many entries were removed.
    ///
    /// # Errors
    /// Returns `Storage` if the store cannot be written.
    pub fn clear_history(&self, identity: &Identity) -> Result<usize, MedipulseError> {
        let Some(user) = identity.user_id() else {
            return Ok(0);
        };
        let removed = self.store.clear(user).map_err(storage_error)?;
        tracing::info!("Cleared {removed} history entries for {user}");
        Ok(removed)
    }
}

fn log_persisted(entry: &HistoryEntry, outcome: &AppendOutcome) {
    tracing::debug!(
        stage = %RequestStage::Persisted,
        "Stored entry for {} at {} ({} kept, {} evicted)",
        entry.identity,
        outcome.timestamp.to_rfc3339(),
        outcome.stored,
        outcome.evicted
    );
}

fn timed_out(e: MedipulseError) -> MedipulseError {
    tracing::warn!(stage = %RequestStage::TimedOut, "{e}");
    e
}

fn storage_error<E: Into<StorageError>>(e: E) -> MedipulseError {
    MedipulseError::Storage(e.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryHistoryStore;
    use crate::application::encoder::tests::alice_record;
    use crate::domain::{sample_schema, DecisionThreshold, UserId, ValidationError};
    use crate::ports::ModelError;
    use std::time::Instant;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed probability and counts calls.
    struct Fixed {
        probability: f64,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(probability: f64) -> Self {
            Self {
                probability,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Classifier for Fixed {
        fn input_dim(&self) -> usize {
            8
        }

        fn forward(&self, _features: &[f64]) -> Result<f64, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.probability)
        }
    }

    /// Fails the first `failures` appends, then delegates.
    struct FlakyStore {
        inner: MemoryHistoryStore,
        failures: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemoryHistoryStore::new(50),
                failures: AtomicUsize::new(failures),
                attempts: AtomicUsize::new(0),
            }
        }
    }

    impl HistoryStore for FlakyStore {
        type Error = StorageError;

        fn capacity(&self) -> usize {
            self.inner.capacity()
        }

        fn append_before(
            &self,
            entry: &HistoryEntry,
            deadline: Option<Instant>,
        ) -> Result<AppendOutcome, StorageError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StorageError::Unavailable("disk offline".into()));
            }
            self.inner.append_before(entry, deadline)
        }

        fn list(&self, user: &UserId) -> Result<Vec<HistoryEntry>, StorageError> {
            self.inner.list(user)
        }

        fn count(&self, user: &UserId) -> Result<usize, StorageError> {
            self.inner.count(user)
        }

        fn clear(&self, user: &UserId) -> Result<usize, StorageError> {
            self.inner.clear(user)
        }
    }

    /// Sleeps before every append and ignores the deadline it is given.
    struct SlowStore {
        inner: MemoryHistoryStore,
        delay: Duration,
    }

    impl HistoryStore for SlowStore {
        type Error = StorageError;

        fn capacity(&self) -> usize {
            self.inner.capacity()
        }

        fn append_before(
            &self,
            entry: &HistoryEntry,
            _deadline: Option<Instant>,
        ) -> Result<AppendOutcome, StorageError> {
            std::thread::sleep(self.delay);
            self.inner.append(entry)
        }

        fn list(&self, user: &UserId) -> Result<Vec<HistoryEntry>, StorageError> {
            self.inner.list(user)
        }

        fn count(&self, user: &UserId) -> Result<usize, StorageError> {
            self.inner.count(user)
        }

        fn clear(&self, user: &UserId) -> Result<usize, StorageError> {
            self.inner.clear(user)
        }
    }

    fn fast_policy() -> ScoringPolicy {
        ScoringPolicy {
            request_timeout: Duration::from_secs(5),
            storage_retry_backoff: Duration::from_millis(1),
        }
    }

    fn service<S: HistoryStore>(
        classifier: Arc<Fixed>,
        store: Arc<S>,
        policy: ScoringPolicy,
    ) -> ScoringService<Fixed, S>
    where
        S::Error: Into<StorageError>,
    {
        let encoder = FeatureEncoder::new(sample_schema()).expect("valid schema");
        let predictor = RiskPredictor::new(classifier, DecisionThreshold::default());
        ScoringService::new(Arc::new(encoder), Arc::new(predictor), store, policy)
    }

    fn alice() -> Identity {
        Identity::parse("alice")
    }

    #[test]
    fn test_alice_scored_and_persisted() {
        let store = Arc::new(MemoryHistoryStore::new(50));
        let svc = service(Arc::new(Fixed::new(0.72)), Arc::clone(&store), fast_policy());

        let response = svc.score(&alice(), alice_record()).expect("Should score");
        assert_eq!(
            response,
            ScoreResponse {
                probability: 0.72,
                risk_label: RiskLabel::High,
                persisted: true
            }
        );

        let history = svc.history(&alice()).expect("Should list");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].input_snapshot, alice_record());
        assert_eq!(history[0].result.risk_label, RiskLabel::High);
        assert_eq!(history[0].identity.as_str(), "alice");
    }

    #[test]
    fn test_response_serializes_to_wire_shape() {
        let store = Arc::new(MemoryHistoryStore::new(50));
        let svc = service(Arc::new(Fixed::new(0.72)), store, fast_policy());
        let response = svc.score(&alice(), alice_record()).expect("Should score");

        let json = serde_json::to_value(response).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"probability": 0.72, "risk_label": "High", "persisted": true})
        );
    }

    #[test]
    fn test_guest_never_stored() {
        let store = Arc::new(FlakyStore::new(0));
        let svc = service(Arc::new(Fixed::new(0.9)), Arc::clone(&store), fast_policy());

        let response = svc.score(&Identity::Guest, alice_record()).expect("Should score");
        assert!(!response.persisted);
        assert_eq!(response.risk_label, RiskLabel::High);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
        assert!(svc.history(&Identity::Guest).expect("list").is_empty());
        assert_eq!(svc.clear_history(&Identity::Guest).expect("clear"), 0);
    }

    #[test]
    fn test_invalid_category_has_no_side_effects() {
        let classifier = Arc::new(Fixed::new(0.9));
        let store = Arc::new(FlakyStore::new(0));
        let svc = service(Arc::clone(&classifier), Arc::clone(&store), fast_policy());

        let record = PatientRecord {
            smoking_history: "bogus".into(),
            ..alice_record()
        };
        let err = svc.score(&alice(), record).expect_err("Should reject");

        assert!(matches!(
            err,
            MedipulseError::Validation(ValidationError::UnknownCategory {
                field: "smoking_history",
                ..
            })
        ));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 0);

        let body = ErrorBody::from(&err);
        assert_eq!(body.kind, "validation");
        assert_eq!(body.field, Some("smoking_history"));
    }

    #[test]
    fn test_storage_outage_still_responds() {
        let store = Arc::new(FlakyStore::new(usize::MAX));
        let svc = service(Arc::new(Fixed::new(0.72)), Arc::clone(&store), fast_policy());

        let response = svc.score(&alice(), alice_record()).expect("Should score");
        assert_eq!(
            response,
            ScoreResponse {
                probability: 0.72,
                risk_label: RiskLabel::High,
                persisted: false
            }
        );
        // One attempt plus one retry.
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_transient_storage_failure_retried_once() {
        let store = Arc::new(FlakyStore::new(1));
        let svc = service(Arc::new(Fixed::new(0.3)), Arc::clone(&store), fast_policy());

        let response = svc.score(&alice(), alice_record()).expect("Should score");
        assert!(response.persisted);
        assert_eq!(response.risk_label, RiskLabel::Low);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(svc.history_len(&alice()).expect("count"), 1);
    }

    #[test]
    fn test_model_failure_is_generic_to_user() {
        let store = Arc::new(FlakyStore::new(0));
        let svc = service(Arc::new(Fixed::new(f64::NAN)), Arc::clone(&store), fast_policy());

        let err = svc.score(&alice(), alice_record()).expect_err("Should fail");
        assert!(matches!(err, MedipulseError::Model(ModelError::NonFiniteOutput)));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 0);

        let body = ErrorBody::from(&err);
        assert_eq!(body.kind, "model");
        assert_eq!(body.message, GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_expired_deadline_commits_nothing() {
        let store = Arc::new(FlakyStore::new(0));
        let policy = ScoringPolicy {
            request_timeout: Duration::ZERO,
            storage_retry_backoff: Duration::from_millis(1),
        };
        let svc = service(Arc::new(Fixed::new(0.72)), Arc::clone(&store), policy);

        let err = svc.score(&alice(), alice_record()).expect_err("Should time out");
        assert!(matches!(err, MedipulseError::Timeout { .. }));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(ErrorBody::from(&err).kind, "timeout");
    }

    #[test]
    fn test_slow_store_times_out_request() {
        let store = Arc::new(SlowStore {
            inner: MemoryHistoryStore::new(50),
            delay: Duration::from_millis(300),
        });
        let policy = ScoringPolicy {
            request_timeout: Duration::from_millis(50),
            storage_retry_backoff: Duration::from_millis(1),
        };
        let svc = service(Arc::new(Fixed::new(0.72)), store, policy);

        let started = Instant::now();
        let err = svc.score(&alice(), alice_record()).expect_err("Should time out");
        assert!(matches!(
            err,
            MedipulseError::Timeout {
                stage: "persist",
                budget_ms: 50
            }
        ));
        // No retry after the deadline.
        assert!(started.elapsed() < Duration::from_millis(600));
    }

    #[test]
    fn test_sqlite_lock_wait_bounded_by_request_timeout() {
        use crate::adapters::sqlite::SqliteHistoryStore;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(
            SqliteHistoryStore::open(dir.path().join("history.db"), 50, Duration::from_secs(5))
                .expect("open"),
        );
        let policy = ScoringPolicy {
            request_timeout: Duration::from_millis(50),
            storage_retry_backoff: Duration::from_millis(1),
        };
        let svc = service(Arc::new(Fixed::new(0.72)), Arc::clone(&store), policy);

        let user = UserId::new("alice").expect("valid id");
        let lock = store.locks().lock_for(&user).expect("lock");
        let held = lock.lock().expect("lock");

        let started = Instant::now();
        let err = svc.score(&alice(), alice_record()).expect_err("Should time out");
        assert!(matches!(err, MedipulseError::Timeout { stage: "persist", .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(held);

        assert_eq!(svc.history_len(&alice()).expect("count"), 0);
    }

    #[test]
    fn test_new_entry_survives_future_stamped_history() {
        let store = Arc::new(MemoryHistoryStore::new(50));
        let user = UserId::new("alice").expect("valid id");
        let later = chrono::Utc::now() + chrono::Duration::minutes(5);
        let older = PatientRecord {
            age: 70.0,
            ..alice_record()
        };
        let result = PredictionResult::from_probability(0.1, DecisionThreshold::default());
        for _ in 0..50 {
            store
                .append(&HistoryEntry::at(user.clone(), later, older.clone(), result))
                .expect("append");
        }
        let svc = service(Arc::new(Fixed::new(0.72)), Arc::clone(&store), fast_policy());

        let response = svc.score(&alice(), alice_record()).expect("Should score");
        assert!(response.persisted);

        let history = svc.history(&alice()).expect("list");
        assert_eq!(history.len(), 50);
        let newest = history.last().expect("non-empty");
        assert_eq!(newest.input_snapshot, alice_record());
        assert!(newest.timestamp > later);
    }

    #[test]
    fn test_score_form_reports_missing_field() {
        let store = Arc::new(MemoryHistoryStore::new(50));
        let svc = service(Arc::new(Fixed::new(0.5)), store, fast_policy());

        let mut form: HashMap<String, String> = [
            ("gender", "Male"),
            ("age", "61"),
            ("hypertension", "1"),
            ("heart_disease", "0"),
            ("smoking_history", "former"),
            ("bmi", "31.2"),
            ("HbA1c_level", "7.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let err = svc.score_form(&alice(), &form).expect_err("Should reject");
        assert_eq!(ErrorBody::from(&err).field, Some("blood_glucose_level"));

        form.insert("blood_glucose_level".into(), "200".into());
        let response = svc.score_form(&alice(), &form).expect("Should score");
        // Inclusive threshold.
        assert_eq!(response.risk_label, RiskLabel::High);
    }

    #[test]
    fn test_score_for_uses_gateway_identity() {
        use crate::adapters::auth::StaticAuthGateway;

        let store = Arc::new(MemoryHistoryStore::new(50));
        let svc = service(Arc::new(Fixed::new(0.2)), store, fast_policy());
        let gateway = StaticAuthGateway::new(alice());

        assert!(svc.score_for(&gateway, alice_record()).expect("score").persisted);
        assert_eq!(svc.clear_history(&alice()).expect("clear"), 1);
        assert!(svc.history(&alice()).expect("list").is_empty());
    }

    #[test]
    fn test_concurrent_requests_respect_capacity() {
        let store = Arc::new(MemoryHistoryStore::new(50));
        let svc = Arc::new(service(Arc::new(Fixed::new(0.6)), store, fast_policy()));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let svc = Arc::clone(&svc);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        assert!(svc.score(&alice(), alice_record()).expect("score").persisted);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }

        let history = svc.history(&alice()).expect("list");
        assert_eq!(history.len(), 50);
        assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
