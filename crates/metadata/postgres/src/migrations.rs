use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating required tables if they do not exist.
///
/// This creates the files table in the configured schema with the configured
/// table prefix, plus the index backing date-range queries.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let files_table = config.files_table();
    let index_name = format!("{}files_created_at_idx", config.table_prefix);

    let create_files = format!(
        "CREATE TABLE IF NOT EXISTS {files_table} (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            stored_name TEXT NOT NULL,
            size_bytes BIGINT NOT NULL DEFAULT 0,
            state TEXT NOT NULL,
            reserved_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ
        )"
    );

    let create_index = format!(
        "CREATE INDEX IF NOT EXISTS {index_name} ON {files_table} (created_at)
         WHERE state = 'committed'"
    );

    sqlx::query(&create_files).execute(pool).await?;
    sqlx::query(&create_index).execute(pool).await?;

    Ok(())
}
