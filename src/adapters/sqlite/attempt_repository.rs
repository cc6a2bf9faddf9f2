//! SQLite implementation of the append-only attempt log.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AttemptOutcome, ComplexityShape, Difficulty, ProviderId, TestAttempt};
use crate::domain::ports::AttemptRepository;

#[derive(Clone)]
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn insert(&self, attempt: &TestAttempt) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO test_attempts (id, agent_id, difficulty, complexity, threshold,
               provider, score, outcome, fallback_scored, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(attempt.id.to_string())
        .bind(&attempt.agent_id)
        .bind(attempt.difficulty.as_str())
        .bind(attempt.complexity.as_str())
        .bind(attempt.threshold as i64)
        .bind(attempt.provider.map(|p| p.as_str()))
        .bind(attempt.score as i64)
        .bind(attempt.outcome.as_str())
        .bind(i64::from(attempt.fallback_scored))
        .bind(attempt.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<TestAttempt>> {
        let row: Option<AttemptRow> = sqlx::query_as("SELECT * FROM test_attempts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_agent(&self, agent_id: &str) -> DomainResult<Vec<TestAttempt>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            "SELECT * FROM test_attempts WHERE agent_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn recent_for_agent(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> DomainResult<Vec<TestAttempt>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            "SELECT * FROM test_attempts WHERE agent_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(agent_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: String,
    agent_id: String,
    difficulty: String,
    complexity: String,
    threshold: i64,
    provider: Option<String>,
    score: i64,
    outcome: String,
    fallback_scored: i64,
    created_at: String,
}

impl TryFrom<AttemptRow> for TestAttempt {
    type Error = DomainError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let difficulty = Difficulty::from_str(&row.difficulty)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;
        let complexity = ComplexityShape::from_str(&row.complexity)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;
        let outcome = AttemptOutcome::from_str(&row.outcome)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;
        let provider = row
            .provider
            .map(|p| ProviderId::from_str(&p))
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        Ok(TestAttempt {
            id: super::parse_uuid(&row.id)?,
            agent_id: row.agent_id,
            difficulty,
            complexity,
            threshold: row.threshold as u32,
            provider,
            score: row.score as u32,
            outcome,
            fallback_scored: row.fallback_scored != 0,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}
