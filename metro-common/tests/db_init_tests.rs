//! Tests for database initialization
//!
//! - Automatic database creation with default schema
//! - Idempotent re-initialization of an existing file
//! - Storage-level uniqueness guards

use metro_common::db::init::{init_database, init_memory_database, SCHEMA_VERSION};
use metro_common::Error;

async fn seed_tenant(pool: &sqlx::SqlitePool) {
    sqlx::query("INSERT INTO tenants (id, name) VALUES ('t1', 'Acme')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO instruments (id, tenant_id, code, name, frequency, repetition_ceiling)
         VALUES ('i1', 't1', 'PAQ-01', 'Caliper', 12, 3)",
    )
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("metro.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("metro.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let pool = init_memory_database().await.unwrap();

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_memory_database().await.unwrap();

    for table in ["tenants", "profiles", "users", "instruments", "calibrations", "schedule_entries"] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_duplicate_live_certificate_rejected_by_index() {
    let pool = init_memory_database().await.unwrap();
    seed_tenant(&pool).await;

    let insert = "INSERT INTO calibrations
        (id, instrument_id, tenant_id, certificate_number, measured_error, uncertainty, tolerance, outcome, performed_at, deleted)
        VALUES (?, 'i1', 't1', 'CERT-1', '0.1', '0.1', '0.5', 'approved', '2024-01-01', ?)";

    sqlx::query(insert).bind("c1").bind(0).execute(&pool).await.unwrap();
    let duplicate = sqlx::query(insert).bind("c2").bind(0).execute(&pool).await;
    assert!(Error::from(duplicate.unwrap_err()).is_unique_violation());

    // A deleted row does not block the certificate number
    sqlx::query(insert).bind("c3").bind(1).execute(&pool).await.unwrap();
}

#[tokio::test]
async fn test_duplicate_schedule_entry_rejected_by_index() {
    let pool = init_memory_database().await.unwrap();
    seed_tenant(&pool).await;

    let insert = "INSERT INTO schedule_entries (id, instrument_id, tenant_id, due_date)
                  VALUES (?, 'i1', 't1', '2024-01-31')";

    sqlx::query(insert).bind("s1").execute(&pool).await.unwrap();
    let duplicate = sqlx::query(insert).bind("s2").execute(&pool).await;
    assert!(Error::from(duplicate.unwrap_err()).is_unique_violation());
}

#[tokio::test]
async fn test_frequency_must_be_positive() {
    let pool = init_memory_database().await.unwrap();
    seed_tenant(&pool).await;

    let result = sqlx::query(
        "INSERT INTO instruments (id, tenant_id, code, name, frequency, repetition_ceiling)
         VALUES ('i2', 't1', 'PAQ-02', 'Gauge', 0, 1)",
    )
    .execute(&pool)
    .await;

    // CHECK constraint, not a uniqueness clash
    let err = Error::from(result.unwrap_err());
    assert!(matches!(err, Error::Database(_)));
    assert!(!err.is_unique_violation());
}

#[test]
fn test_non_database_errors_are_not_unique_violations() {
    assert!(!Error::NotFound("Instrument".to_string()).is_unique_violation());
    assert!(!Error::Internal("Stored id 'x' is not a UUID".to_string()).is_unique_violation());
}
