//! `template` table repository.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use fcpmgr_core::error::{AppError, ErrorKind};
use fcpmgr_core::result::AppResult;
use fcpmgr_entity::template::Template;

const TEMPLATE_COLUMNS: &str = "id, name, description, is_default, min_fcp_paths_count";

/// Repository for template rows.
#[derive(Debug, Clone, Copy)]
pub struct TemplateRepository;

impl TemplateRepository {
    /// Find a template by id.
    pub async fn find(conn: &mut SqliteConnection, id: &str) -> AppResult<Option<Template>> {
        sqlx::query_as::<_, Template>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM template WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to find template", e))
    }

    /// Whether a template exists.
    pub async fn exists(conn: &mut SqliteConnection, id: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM template WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to check template", e))?;
        Ok(count > 0)
    }

    /// All templates ordered by id.
    pub async fn find_all(conn: &mut SqliteConnection) -> AppResult<Vec<Template>> {
        sqlx::query_as::<_, Template>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM template ORDER BY id"
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to list templates", e))
    }

    /// Templates with the given ids.
    pub async fn find_by_ids(conn: &mut SqliteConnection, ids: &[String]) -> AppResult<Vec<Template>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {TEMPLATE_COLUMNS} FROM template WHERE id IN ("
        ));
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(id.clone());
        }
        list.push_unseparated(") ORDER BY id");
        qb.build_query_as::<Template>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to list templates", e))
    }

    /// Templates whose default flag matches.
    pub async fn find_by_default(
        conn: &mut SqliteConnection,
        is_default: bool,
    ) -> AppResult<Vec<Template>> {
        sqlx::query_as::<_, Template>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM template WHERE is_default = ? ORDER BY id"
        ))
        .bind(is_default)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to list templates", e))
    }

    /// Templates the guest's devices were allocated from.
    pub async fn find_by_assigner(
        conn: &mut SqliteConnection,
        assigner_id: &str,
    ) -> AppResult<Vec<Template>> {
        sqlx::query_as::<_, Template>(
            "SELECT DISTINCT t.id, t.name, t.description, t.is_default, t.min_fcp_paths_count \
             FROM template AS t INNER JOIN fcp ON fcp.tmpl_id = t.id \
             WHERE fcp.assigner_id = ? ORDER BY t.id",
        )
        .bind(assigner_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Store, "Failed to list templates of assigner", e)
        })
    }

    /// Templates bound to storage providers. An empty list means every
    /// bound template.
    pub async fn find_by_sp_names(
        conn: &mut SqliteConnection,
        sp_names: &[String],
    ) -> AppResult<Vec<Template>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT DISTINCT t.id, t.name, t.description, t.is_default, t.min_fcp_paths_count \
             FROM template AS t INNER JOIN template_sp_mapping AS ts ON ts.tmpl_id = t.id",
        );
        if !sp_names.is_empty() {
            qb.push(" WHERE ts.sp_name IN (");
            let mut list = qb.separated(", ");
            for name in sp_names {
                list.push_bind(name.clone());
            }
            list.push_unseparated(")");
        }
        qb.push(" ORDER BY t.id");
        qb.build_query_as::<Template>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Store, "Failed to list templates of providers", e)
            })
    }

    /// Insert a template row.
    pub async fn insert(conn: &mut SqliteConnection, template: &Template) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO template (id, name, description, is_default, min_fcp_paths_count) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.is_default)
        .bind(template.min_fcp_paths_count)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to insert template", e))?;
        Ok(())
    }

    /// Overwrite the basic info of a template.
    pub async fn update(conn: &mut SqliteConnection, template: &Template) -> AppResult<()> {
        sqlx::query(
            "UPDATE template SET name = ?, description = ?, is_default = ?, \
             min_fcp_paths_count = ? WHERE id = ?",
        )
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.is_default)
        .bind(template.min_fcp_paths_count)
        .bind(&template.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to update template", e))?;
        Ok(())
    }

    /// Clear the default flag of every template except `keep`.
    pub async fn clear_default_except(conn: &mut SqliteConnection, keep: &str) -> AppResult<u64> {
        sqlx::query("UPDATE template SET is_default = FALSE WHERE id <> ? AND is_default")
            .bind(keep)
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| {
                AppError::with_source(ErrorKind::Store, "Failed to clear default template", e)
            })
    }

    /// Delete a template row.
    pub async fn delete(conn: &mut SqliteConnection, id: &str) -> AppResult<u64> {
        sqlx::query("DELETE FROM template WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to delete template", e))
    }
}
