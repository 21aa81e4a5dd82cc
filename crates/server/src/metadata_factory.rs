//! Metadata backend selection from configuration.

use std::sync::Arc;

use tracing::info;

use stowage_metadata::MetadataStore;
use stowage_metadata_memory::MemoryMetadataStore;

use crate::config::MetadataConfig;
use crate::error::ServerError;

/// Build the metadata store named by the configuration.
pub async fn create_metadata_store(
    config: &MetadataConfig,
) -> Result<Arc<dyn MetadataStore>, ServerError> {
    match config.backend.as_str() {
        "memory" => {
            info!("using in-memory metadata store");
            Ok(Arc::new(MemoryMetadataStore::new()))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config.url.clone().ok_or_else(|| {
                ServerError::Config("metadata.url is required for the postgres backend".into())
            })?;
            let pg_config = stowage_metadata_postgres::PostgresConfig {
                url,
                pool_size: config.pool_size,
                schema: config.schema.clone(),
                table_prefix: config.table_prefix.clone(),
            };
            info!(
                schema = %pg_config.schema,
                table_prefix = %pg_config.table_prefix,
                "using postgres metadata store"
            );
            let store = stowage_metadata_postgres::PostgresMetadataStore::new(pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("postgres store: {e}")))?;
            Ok(Arc::new(store))
        }
        other => Err(ServerError::Config(format!(
            "unknown metadata backend '{other}' (expected 'memory' or 'postgres')"
        ))),
    }
}
