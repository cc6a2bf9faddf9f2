//! Persistence port for agent test records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::AgentTestRecord;

/// Durable storage for [`AgentTestRecord`].
///
/// Mutation goes through the progression tracker; the repository only
/// guarantees atomicity of the writes it is handed.
#[async_trait]
pub trait AgentRecordRepository: Send + Sync {
    /// Fetch a record, if the agent has been seen before.
    async fn get(&self, agent_id: &str) -> DomainResult<Option<AgentTestRecord>>;

    /// Insert a fresh record. Fails if the agent already exists.
    async fn create(&self, record: &AgentTestRecord) -> DomainResult<()>;

    /// Stamp the agent's last admission time.
    async fn touch_last_request(
        &self,
        agent_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<()>;

    /// Write `record` and mark `attempt_id` applied in one transaction.
    ///
    /// Returns `false` (leaving the stored record untouched) when the attempt
    /// id was already applied; this is the idempotence guarantee for
    /// duplicate delivery and retries.
    async fn store_applied(
        &self,
        record: &AgentTestRecord,
        attempt_id: Uuid,
    ) -> DomainResult<bool>;

    /// All known agent ids, for reporting.
    async fn list_agent_ids(&self) -> DomainResult<Vec<String>>;
}
