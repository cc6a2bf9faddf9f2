//! Disk-backed database lifecycle tests.

use tempfile::TempDir;

use proctor::adapters::sqlite::{
    initialize_database, Migrator, SqliteAgentRecordRepository, SqliteAttemptRepository,
};
use proctor::domain::models::AgentTestRecord;
use proctor::domain::ports::{AgentRecordRepository, AttemptRepository};

#[tokio::test]
async fn test_initialize_creates_file_and_schema() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("proctor.db");
    let url = format!("sqlite:{}", db_path.display());

    let pool = initialize_database(&url).await.unwrap();
    assert!(db_path.exists());

    // Schema is live: a record round-trips.
    let records = SqliteAgentRecordRepository::new(pool.clone());
    records.create(&AgentTestRecord::new("guardian")).await.unwrap();
    assert!(records.get("guardian").await.unwrap().is_some());

    let attempts = SqliteAttemptRepository::new(pool);
    assert!(attempts.list_for_agent("guardian").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_initialize_is_idempotent_across_restarts() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("proctor.db");
    let url = format!("sqlite:{}", db_path.display());

    let pool = initialize_database(&url).await.unwrap();
    let records = SqliteAgentRecordRepository::new(pool.clone());
    records.create(&AgentTestRecord::new("guardian")).await.unwrap();
    drop(records);
    pool.close().await;

    // Second startup over the same file: migrations re-run as a no-op and
    // existing data survives.
    let pool = initialize_database(&url).await.unwrap();
    let migrator = Migrator::new(pool.clone());
    assert_eq!(migrator.get_current_version().await.unwrap(), 1);

    let records = SqliteAgentRecordRepository::new(pool);
    assert!(records.get("guardian").await.unwrap().is_some());
}

#[tokio::test]
async fn test_nested_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("deep").join("nested").join("proctor.db");
    let url = format!("sqlite:{}", db_path.display());

    initialize_database(&url).await.unwrap();
    assert!(db_path.exists());
}
