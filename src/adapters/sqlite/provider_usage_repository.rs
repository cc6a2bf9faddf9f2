//! SQLite implementation of the provider usage bucket store.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ProviderId;
use crate::domain::ports::{ProviderUsageRepository, UsageBucket};

#[derive(Clone)]
pub struct SqliteProviderUsageRepository {
    pool: SqlitePool,
}

impl SqliteProviderUsageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderUsageRepository for SqliteProviderUsageRepository {
    async fn add_usage(
        &self,
        provider: ProviderId,
        day: NaiveDate,
        hour: u8,
        tokens: u64,
    ) -> DomainResult<()> {
        // Single-statement upsert: bucket creation and increment are atomic.
        sqlx::query(
            r#"INSERT INTO provider_usage (provider, day, hour, tokens)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(provider, day, hour)
               DO UPDATE SET tokens = tokens + excluded.tokens"#,
        )
        .bind(provider.as_str())
        .bind(day.to_string())
        .bind(i64::from(hour))
        .bind(tokens as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_all(&self) -> DomainResult<Vec<UsageBucket>> {
        let rows: Vec<(String, String, i64, i64)> =
            sqlx::query_as("SELECT provider, day, hour, tokens FROM provider_usage")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(provider, day, hour, tokens)| {
                Ok(UsageBucket {
                    provider: ProviderId::from_str(&provider)
                        .map_err(|e| DomainError::SerializationError(e.to_string()))?,
                    day: NaiveDate::from_str(&day)
                        .map_err(|e| DomainError::SerializationError(e.to_string()))?,
                    hour: hour as u8,
                    tokens: tokens as u64,
                })
            })
            .collect()
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM provider_usage WHERE day < ?")
            .bind(cutoff.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
