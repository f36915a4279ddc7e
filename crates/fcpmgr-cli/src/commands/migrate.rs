//! Database migration command.

use crate::output;
use fcpmgr_core::config::AppConfig;
use fcpmgr_core::error::AppError;
use fcpmgr_database::FcpDatabase;
use fcpmgr_database::migration::run_migrations;

/// Apply pending migrations to the configured store.
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    let db = FcpDatabase::connect(&config.database).await?;
    println!("Running database migrations...");
    run_migrations(db.pool()).await?;
    db.close().await;
    output::print_success("All migrations applied successfully.");
    Ok(())
}
