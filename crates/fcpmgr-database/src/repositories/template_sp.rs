//! `template_sp_mapping` table repository.

use sqlx::SqliteConnection;

use fcpmgr_core::error::{AppError, ErrorKind};
use fcpmgr_core::result::AppResult;

/// Repository for storage provider → template bindings.
#[derive(Debug, Clone, Copy)]
pub struct TemplateSpRepository;

impl TemplateSpRepository {
    /// Providers bound to a template.
    pub async fn sp_names_of(conn: &mut SqliteConnection, tmpl_id: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT sp_name FROM template_sp_mapping WHERE tmpl_id = ? ORDER BY sp_name",
        )
        .bind(tmpl_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to list providers", e))
    }

    /// Template a provider defaults to.
    pub async fn template_of(conn: &mut SqliteConnection, sp_name: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT tmpl_id FROM template_sp_mapping WHERE sp_name = ?")
            .bind(sp_name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Store, "Failed to read provider binding", e)
            })
    }

    /// Point each provider at the template, re-pointing existing bindings.
    pub async fn bind(
        conn: &mut SqliteConnection,
        tmpl_id: &str,
        sp_names: &[String],
    ) -> AppResult<()> {
        for sp_name in sp_names {
            sqlx::query(
                "INSERT INTO template_sp_mapping (sp_name, tmpl_id) VALUES (?, ?) \
                 ON CONFLICT (sp_name) DO UPDATE SET tmpl_id = excluded.tmpl_id",
            )
            .bind(sp_name)
            .bind(tmpl_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Store,
                    format!("Failed to bind storage provider {sp_name}"),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Remove every binding to a template.
    pub async fn unbind_template(conn: &mut SqliteConnection, tmpl_id: &str) -> AppResult<u64> {
        sqlx::query("DELETE FROM template_sp_mapping WHERE tmpl_id = ?")
            .bind(tmpl_id)
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| {
                AppError::with_source(ErrorKind::Store, "Failed to unbind storage providers", e)
            })
    }
}
