//! Schema migrations embedded from `migrations/`.

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use tracing::{debug, info};

use fcpmgr_core::error::AppError;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Bring the allocator tables up to the latest schema. Already applied
/// versions are skipped.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    for migration in MIGRATOR.iter() {
        debug!(
            version = migration.version,
            description = %migration.description,
            "Known FCP schema migration"
        );
    }

    MIGRATOR.run(pool).await?;

    info!(known = MIGRATOR.iter().count(), "FCP schema is up to date");
    Ok(())
}
