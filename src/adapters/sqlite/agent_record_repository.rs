//! SQLite implementation of the AgentRecordRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::AgentTestRecord;
use crate::domain::ports::AgentRecordRepository;

#[derive(Clone)]
pub struct SqliteAgentRecordRepository {
    pool: SqlitePool,
}

impl SqliteAgentRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRecordRepository for SqliteAgentRecordRepository {
    async fn get(&self, agent_id: &str) -> DomainResult<Option<AgentTestRecord>> {
        let row: Option<RecordRow> =
            sqlx::query_as("SELECT * FROM agent_records WHERE agent_id = ?")
                .bind(agent_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create(&self, record: &AgentTestRecord) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO agent_records (agent_id, consecutive_failures, consecutive_successes,
               level, xp, total_attempts, last_request_time, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&record.agent_id)
        .bind(record.consecutive_failures as i64)
        .bind(record.consecutive_successes as i64)
        .bind(record.level as i64)
        .bind(record.xp as i64)
        .bind(record.total_attempts as i64)
        .bind(record.last_request_time.map(|t| t.to_rfc3339()))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch_last_request(&self, agent_id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE agent_records SET last_request_time = ?, updated_at = ? WHERE agent_id = ?",
        )
        .bind(at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(agent_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AgentNotFound(agent_id.to_string()));
        }
        Ok(())
    }

    async fn store_applied(
        &self,
        record: &AgentTestRecord,
        attempt_id: Uuid,
    ) -> DomainResult<bool> {
        let mut tx = self.pool.begin().await?;

        // The idempotence gate: inserting the marker and writing the record
        // commit or roll back together.
        let marker = sqlx::query(
            "INSERT INTO applied_attempts (attempt_id, applied_at) VALUES (?, ?)
             ON CONFLICT(attempt_id) DO NOTHING",
        )
        .bind(attempt_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if marker.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"INSERT INTO agent_records (agent_id, consecutive_failures, consecutive_successes,
               level, xp, total_attempts, last_request_time, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(agent_id) DO UPDATE SET
                   consecutive_failures = excluded.consecutive_failures,
                   consecutive_successes = excluded.consecutive_successes,
                   level = excluded.level,
                   xp = excluded.xp,
                   total_attempts = excluded.total_attempts,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&record.agent_id)
        .bind(record.consecutive_failures as i64)
        .bind(record.consecutive_successes as i64)
        .bind(record.level as i64)
        .bind(record.xp as i64)
        .bind(record.total_attempts as i64)
        .bind(record.last_request_time.map(|t| t.to_rfc3339()))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_agent_ids(&self) -> DomainResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT agent_id FROM agent_records ORDER BY agent_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    agent_id: String,
    consecutive_failures: i64,
    consecutive_successes: i64,
    level: i64,
    xp: i64,
    total_attempts: i64,
    last_request_time: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RecordRow> for AgentTestRecord {
    type Error = DomainError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(AgentTestRecord {
            agent_id: row.agent_id,
            consecutive_failures: row.consecutive_failures as u32,
            consecutive_successes: row.consecutive_successes as u32,
            level: row.level as u32,
            xp: row.xp as u64,
            total_attempts: row.total_attempts as u64,
            last_request_time: super::parse_optional_datetime(row.last_request_time)?,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_test_repo() -> SqliteAgentRecordRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteAgentRecordRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup_test_repo().await;
        let record = AgentTestRecord::new("imperium");

        repo.create(&record).await.unwrap();

        let fetched = repo.get("imperium").await.unwrap().unwrap();
        assert_eq!(fetched.agent_id, "imperium");
        assert_eq!(fetched.level, 1);
        assert!(fetched.last_request_time.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = setup_test_repo().await;
        assert!(repo.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_last_request() {
        let repo = setup_test_repo().await;
        let record = AgentTestRecord::new("imperium");
        repo.create(&record).await.unwrap();

        let at = Utc::now();
        repo.touch_last_request("imperium", at).await.unwrap();

        let fetched = repo.get("imperium").await.unwrap().unwrap();
        let stored = fetched.last_request_time.unwrap();
        assert!((stored - at).num_milliseconds().abs() < 1000);
    }

    #[tokio::test]
    async fn test_touch_missing_agent_fails() {
        let repo = setup_test_repo().await;
        let err = repo.touch_last_request("ghost", Utc::now()).await.unwrap_err();
        assert!(matches!(err, DomainError::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn test_store_applied_once_only() {
        let repo = setup_test_repo().await;
        let mut record = AgentTestRecord::new("imperium");
        repo.create(&record).await.unwrap();

        record.xp = 500;
        record.total_attempts = 1;
        let attempt_id = Uuid::new_v4();

        assert!(repo.store_applied(&record, attempt_id).await.unwrap());

        // Second application with the same id is rejected and the stored
        // record is unchanged even if the caller mutated its copy further.
        record.xp = 9999;
        assert!(!repo.store_applied(&record, attempt_id).await.unwrap());

        let fetched = repo.get("imperium").await.unwrap().unwrap();
        assert_eq!(fetched.xp, 500);
    }

    #[tokio::test]
    async fn test_list_agent_ids() {
        let repo = setup_test_repo().await;
        repo.create(&AgentTestRecord::new("b-agent")).await.unwrap();
        repo.create(&AgentTestRecord::new("a-agent")).await.unwrap();

        let ids = repo.list_agent_ids().await.unwrap();
        assert_eq!(ids, vec!["a-agent".to_string(), "b-agent".to_string()]);
    }
}
