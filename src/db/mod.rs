//! Database module

pub mod memory;
pub mod queries;
pub mod store;

pub use memory::MemoryOptimizationStore;
pub use store::{AppliedSchedule, OptimizationStore, PgOptimizationStore};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, StoreBackend};

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Run database migrations.
///
/// Stored checksums that differ from the compiled ones (CRLF/LF differences
/// across platforms) are rewritten before running.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    let migrator = sqlx::migrate!("./migrations");
    fix_migration_checksums(pool, &migrator).await?;
    migrator.run(pool).await?;

    info!("Database migrations complete");
    Ok(())
}

async fn fix_migration_checksums(pool: &PgPool, migrator: &sqlx::migrate::Migrator) -> Result<()> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = '_sqlx_migrations')"
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(());
    }

    for migration in migrator.iter() {
        if migration.migration_type.is_down_migration() {
            continue;
        }

        let stored: Option<(Vec<u8>,)> = sqlx::query_as(
            "SELECT checksum FROM _sqlx_migrations WHERE version = $1"
        )
        .bind(migration.version)
        .fetch_optional(pool)
        .await?;

        if let Some((stored_checksum,)) = stored {
            let current_checksum: &[u8] = &migration.checksum;
            if stored_checksum != current_checksum {
                warn!(
                    "Migration {} ({}) checksum mismatch, updating stored checksum",
                    migration.version, migration.description
                );
                sqlx::query("UPDATE _sqlx_migrations SET checksum = $1 WHERE version = $2")
                    .bind(current_checksum)
                    .bind(migration.version)
                    .execute(pool)
                    .await?;
            }
        }
    }

    Ok(())
}

/// Open the configured store, running migrations for PostgreSQL
pub async fn create_store(config: &Config) -> Result<Arc<dyn OptimizationStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the postgres store")?;
            let pool = create_pool(database_url).await?;
            info!("Connected to PostgreSQL");
            run_migrations(&pool).await?;
            Ok(Arc::new(PgOptimizationStore::new(pool)))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store, data is lost on restart");
            let store = MemoryOptimizationStore::new();
            if let Some(path) = &config.memory_events_file {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let count = store
                    .load_events_json(&json)
                    .with_context(|| format!("Invalid events in {}", path.display()))?;
                info!("Seeded {} events from {}", count, path.display());
            }
            Ok(Arc::new(store))
        }
    }
}
