use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stowage_core::{FileRecord, ObjectId, RecordState};
use stowage_metadata::error::MetadataError;
use stowage_metadata::store::MetadataStore;

use crate::config::PostgresConfig;
use crate::migrations;

/// Row shape shared by every query that returns records.
type RecordRow = (
    String,                   // id
    String,                   // display_name
    String,                   // stored_name
    i64,                      // size_bytes
    String,                   // state
    DateTime<Utc>,            // reserved_at
    Option<DateTime<Utc>>,    // created_at
);

const RECORD_COLUMNS: &str =
    "id, display_name, stored_name, size_bytes, state, reserved_at, created_at";

/// PostgreSQL-backed implementation of [`MetadataStore`].
///
/// Uses `sqlx::PgPool` for connection pooling. The `id` primary key is the
/// uniqueness tie-breaker for reservations; duplicate inserts surface as
/// [`MetadataError::Conflict`].
pub struct PostgresMetadataStore {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresMetadataStore {
    /// Create a new `PostgresMetadataStore` from the provided configuration.
    ///
    /// Connects to `PostgreSQL`, creates the connection pool, and runs
    /// migrations to ensure the required tables exist.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Connection`] if pool creation fails, or
    /// [`MetadataError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, MetadataError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.url)
            .await
            .map_err(|e| MetadataError::Connection(e.to_string()))?;

        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| MetadataError::Backend(e.to_string()))?;

        Ok(Self { pool, config })
    }

    /// Create a `PostgresMetadataStore` from an existing pool and config.
    /// Runs migrations on creation.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Backend`] if migrations fail.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, MetadataError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| MetadataError::Backend(e.to_string()))?;

        Ok(Self { pool, config })
    }

    fn record_from_row(row: RecordRow) -> Result<FileRecord, MetadataError> {
        let (id, display_name, stored_name, size_bytes, state, reserved_at, created_at) = row;
        let state = RecordState::parse(&state)
            .ok_or_else(|| MetadataError::Backend(format!("unknown record state: {state}")))?;
        Ok(FileRecord {
            id: ObjectId::from(id),
            display_name,
            stored_name,
            size: u64::try_from(size_bytes).unwrap_or(0),
            state,
            reserved_at,
            created_at,
        })
    }
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn reserve(&self, record: &FileRecord) -> Result<(), MetadataError> {
        let table = self.config.files_table();

        let query = format!(
            "INSERT INTO {table} (id, display_name, stored_name, size_bytes, state, reserved_at) \
             VALUES ($1, $2, $3, 0, 'reserved', $4)"
        );

        let result = sqlx::query(&query)
            .bind(record.id.as_str())
            .bind(&record.display_name)
            .bind(&record.stored_name)
            .bind(record.reserved_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(MetadataError::Conflict(record.id.to_string()))
            }
            Err(e) => Err(MetadataError::Backend(e.to_string())),
        }
    }

    async fn commit(
        &self,
        id: &ObjectId,
        size: u64,
        created_at: DateTime<Utc>,
    ) -> Result<Option<FileRecord>, MetadataError> {
        let table = self.config.files_table();
        let size_bytes = i64::try_from(size).unwrap_or(i64::MAX);

        let query = format!(
            "UPDATE {table} \
             SET state = 'committed', size_bytes = $2, created_at = $3 \
             WHERE id = $1 AND state = 'reserved' \
             RETURNING {RECORD_COLUMNS}"
        );

        let row: Option<RecordRow> = sqlx::query_as(&query)
            .bind(id.as_str())
            .bind(size_bytes)
            .bind(created_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MetadataError::Backend(e.to_string()))?;

        row.map(Self::record_from_row).transpose()
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<FileRecord>, MetadataError> {
        let table = self.config.files_table();

        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM {table} \
             WHERE id = $1 AND state = 'committed'"
        );

        let row: Option<RecordRow> = sqlx::query_as(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MetadataError::Backend(e.to_string()))?;

        row.map(Self::record_from_row).transpose()
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, MetadataError> {
        let table = self.config.files_table();

        let query = format!("DELETE FROM {table} WHERE id = $1 AND state = 'committed'");

        let result = sqlx::query(&query)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::Backend(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        let table = self.config.files_table();

        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM {table} \
             WHERE state = 'committed' AND created_at BETWEEN $1 AND $2 \
             ORDER BY created_at ASC"
        );

        let rows: Vec<RecordRow> = sqlx::query_as(&query)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MetadataError::Backend(e.to_string()))?;

        rows.into_iter().map(Self::record_from_row).collect()
    }

    async fn stale_reservations(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        let table = self.config.files_table();

        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM {table} \
             WHERE state = 'reserved' AND reserved_at < $1 \
             ORDER BY reserved_at ASC"
        );

        let rows: Vec<RecordRow> = sqlx::query_as(&query)
            .bind(older_than)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MetadataError::Backend(e.to_string()))?;

        rows.into_iter().map(Self::record_from_row).collect()
    }

    async fn remove_reservation(&self, id: &ObjectId) -> Result<bool, MetadataError> {
        let table = self.config.files_table();

        let query = format!("DELETE FROM {table} WHERE id = $1 AND state = 'reserved'");

        let result = sqlx::query(&query)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::Backend(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn test_config() -> PostgresConfig {
        PostgresConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/stowage_test".to_string()),
            table_prefix: format!("test_{}_", uuid::Uuid::new_v4().simple()),
            ..PostgresConfig::default()
        }
    }

    #[tokio::test]
    async fn store_conformance() {
        let config = test_config();
        let store = PostgresMetadataStore::new(config)
            .await
            .expect("pool creation should succeed");
        stowage_metadata::testing::run_metadata_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }
}
