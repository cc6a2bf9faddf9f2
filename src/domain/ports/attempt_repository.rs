//! Persistence port for the append-only attempt log.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::TestAttempt;

/// Durable, append-only storage for [`TestAttempt`] rows.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append one attempt. Attempts are immutable; there is no update.
    async fn insert(&self, attempt: &TestAttempt) -> DomainResult<()>;

    /// Fetch one attempt by id.
    async fn get(&self, id: Uuid) -> DomainResult<Option<TestAttempt>>;

    /// An agent's full log, oldest first. This ordering is what counter
    /// replay relies on.
    async fn list_for_agent(&self, agent_id: &str) -> DomainResult<Vec<TestAttempt>>;

    /// An agent's most recent attempts, newest first, capped at `limit`.
    async fn recent_for_agent(&self, agent_id: &str, limit: u32)
        -> DomainResult<Vec<TestAttempt>>;
}
