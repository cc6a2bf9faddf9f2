//! Domain errors for the proctor engine.

use thiserror::Error;

/// Why an admission request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The agent is still inside its cooldown window.
    Cooldown { remaining_secs: u64 },
    /// The global concurrency cap is saturated.
    Concurrency,
    /// The target provider's hourly spend cap is reached.
    HourlyCap,
    /// The target provider's daily spend cap is reached.
    DailyCap,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cooldown { remaining_secs } => {
                write!(f, "cooldown ({remaining_secs}s remaining)")
            }
            Self::Concurrency => write!(f, "concurrency cap"),
            Self::HourlyCap => write!(f, "hourly budget cap"),
            Self::DailyCap => write!(f, "daily budget cap"),
        }
    }
}

/// Domain-level errors.
///
/// `AdmissionDenied` is not a test failure: callers defer and retry later
/// without touching agent counters. `AllProvidersExhausted` is fatal for the
/// current attempt and is recorded as a provider failure, distinct from a
/// quality failure.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Admission denied: {reason}")]
    AdmissionDenied { reason: DenyReason },

    #[error("All providers exhausted or failing")]
    AllProvidersExhausted,

    #[error("Provider evaluation timed out after {0}s")]
    EvaluationTimeout(u64),

    #[error("Provider invocation failed: {0}")]
    ProviderInvocationFailed(String),

    #[error("Agent record not found: {0}")]
    AgentNotFound(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::PersistenceError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
