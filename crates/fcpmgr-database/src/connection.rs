//! SQLite store handle.
//!
//! All allocator tables form one lock group. [`FcpDatabase::begin`] takes the
//! group lock before opening a transaction, so at most one transaction is in
//! flight per process and every multi-statement sequence is atomic relative
//! to other callers.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use fcpmgr_core::config::DatabaseConfig;
use fcpmgr_core::error::{AppError, ErrorKind};

/// Shared handle to the allocator store.
#[derive(Debug, Clone)]
pub struct FcpDatabase {
    /// The underlying sqlx connection pool.
    pool: SqlitePool,
    /// Serializes transactions on the allocator tables.
    lock: Arc<Mutex<()>>,
}

impl FcpDatabase {
    /// Open the store described by the configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            url = %config.url,
            max_connections = config.max_connections,
            "Connecting to SQLite"
        );

        let in_memory = is_in_memory(&config.url);
        if !in_memory {
            ensure_parent_dir(&config.url).await?;
        }

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid database url '{}'", config.url),
                    e,
                )
            })?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_seconds));

        // An in-memory database lives and dies with its only connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Store,
                    format!("Failed to connect to database: {e}"),
                    e,
                )
            })?;

        info!("Successfully connected to SQLite");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Return a reference to the underlying sqlx pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Take the table-group lock and open a transaction.
    ///
    /// Dropping the returned handle without calling [`StoreTx::commit`]
    /// rolls the transaction back and releases the lock.
    pub async fn begin(&self) -> Result<StoreTx, AppError> {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        let tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Store, "Failed to begin transaction", e)
        })?;
        debug!("Transaction started");
        Ok(StoreTx { tx, _guard: guard })
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Health check failed", e))
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// An open transaction holding the table-group lock.
#[derive(Debug)]
pub struct StoreTx {
    // Declared before the guard so the rollback-on-drop happens while the
    // lock is still held.
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedMutexGuard<()>,
}

impl StoreTx {
    /// The connection to run statements on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commit and release the lock.
    pub async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Store, "Failed to commit transaction", e)
        })?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Roll back explicitly and release the lock.
    pub async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await.map_err(|e| {
            AppError::with_source(ErrorKind::Store, "Failed to roll back transaction", e)
        })
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Create the directory holding a file-backed database.
async fn ensure_parent_dir(url: &str) -> Result<(), AppError> {
    let Some(path) = database_path(url) else {
        return Ok(());
    };
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Extract the file path from a `sqlite:` url, dropping any query string.
fn database_path(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    (!path.is_empty()).then_some(path)
}
