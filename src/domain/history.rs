//! Identities and history entries.

use serde::{Deserialize, Serialize};

use crate::domain::{PatientRecord, PredictionResult};

/// Reserved identity value for anonymous users.
pub const GUEST: &str = "guest";

/// A stable identifier for a signed-in user.
///
/// Never empty and never equal to [`GUEST`], so a `UserId` always names a
/// history collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a user id.
    ///
    /// # Errors
    /// Returns error if the id is blank or is the guest sentinel.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("user id must not be empty".to_string());
        }
        if trimmed == GUEST {
            return Err(format!("{GUEST:?} is reserved for anonymous users"));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is asking for a score.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Guest,
    User(UserId),
}

impl Identity {
    /// Interpret a raw identity string. Blank input and `"guest"` are guests.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match UserId::new(raw) {
            Ok(id) => Self::User(id),
            Err(_) => Self::Guest,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id),
        }
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guest => f.write_str(GUEST),
            Self::User(id) => id.fmt(f),
        }
    }
}

/// One persisted scoring result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique identifier
    pub id: String,

    pub identity: UserId,

    /// When the prediction was made
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// The attributes that were scored
    pub input_snapshot: PatientRecord,

    pub result: PredictionResult,
}

impl HistoryEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(identity: UserId, input_snapshot: PatientRecord, result: PredictionResult) -> Self {
        Self::at(identity, chrono::Utc::now(), input_snapshot, result)
    }

    /// Create an entry with an explicit timestamp.
    #[must_use]
    pub fn at(
        identity: UserId,
        timestamp: chrono::DateTime<chrono::Utc>,
        input_snapshot: PatientRecord,
        result: PredictionResult,
    ) -> Self {
        Self {
            id: uuid_v4(),
            identity,
            timestamp,
            input_snapshot,
            result,
        }
    }
}

/// Generate a random UUID v4 string.
///
/// Seeded from OS entropy so ids are unpredictable across processes.
fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let mut bytes: [u8; 16] = rng.gen();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
