//! `template_fcp_mapping` table repository.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use fcpmgr_core::error::{AppError, ErrorKind};
use fcpmgr_core::result::AppResult;
use fcpmgr_core::types::FcpId;
use fcpmgr_entity::template::{TemplateDeviceRow, TemplateFcpMapping};

use super::fcp::push_id_list;

/// Repository for template device/path mappings.
#[derive(Debug, Clone, Copy)]
pub struct TemplateFcpRepository;

impl TemplateFcpRepository {
    /// Mappings of a template ordered by path and device.
    pub async fn mappings_of(
        conn: &mut SqliteConnection,
        tmpl_id: &str,
    ) -> AppResult<Vec<TemplateFcpMapping>> {
        sqlx::query_as::<_, TemplateFcpMapping>(
            "SELECT fcp_id, tmpl_id, path FROM template_fcp_mapping \
             WHERE tmpl_id = ? ORDER BY path, fcp_id",
        )
        .bind(tmpl_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to read template devices", e))
    }

    /// Number of distinct paths configured in a template.
    pub async fn path_count(conn: &mut SqliteConnection, tmpl_id: &str) -> AppResult<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT path) FROM template_fcp_mapping WHERE tmpl_id = ?",
        )
        .bind(tmpl_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to count paths", e))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Insert `(fcp_id, path)` mappings for a template.
    pub async fn insert_many(
        conn: &mut SqliteConnection,
        tmpl_id: &str,
        devices: &[(FcpId, u32)],
    ) -> AppResult<()> {
        for (fcp_id, path) in devices {
            sqlx::query("INSERT INTO template_fcp_mapping (fcp_id, tmpl_id, path) VALUES (?, ?, ?)")
                .bind(fcp_id)
                .bind(tmpl_id)
                .bind(i64::from(*path))
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Store,
                        format!("Failed to map device {fcp_id} into template"),
                        e,
                    )
                })?;
        }
        Ok(())
    }

    /// Move devices to new paths within a template.
    pub async fn update_paths(
        conn: &mut SqliteConnection,
        tmpl_id: &str,
        devices: &[(FcpId, u32)],
    ) -> AppResult<()> {
        for (fcp_id, path) in devices {
            sqlx::query("UPDATE template_fcp_mapping SET path = ? WHERE fcp_id = ? AND tmpl_id = ?")
                .bind(i64::from(*path))
                .bind(fcp_id)
                .bind(tmpl_id)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Store, "Failed to update device path", e)
                })?;
        }
        Ok(())
    }

    /// Remove devices from a template.
    pub async fn delete_many(
        conn: &mut SqliteConnection,
        tmpl_id: &str,
        ids: &[FcpId],
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM template_fcp_mapping WHERE tmpl_id = ");
        qb.push_bind(tmpl_id.to_string()).push(" AND fcp_id IN (");
        push_id_list(&mut qb, ids);
        qb.build()
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| {
                AppError::with_source(ErrorKind::Store, "Failed to remove template devices", e)
            })
    }

    /// Remove every mapping of a template.
    pub async fn delete_by_template(conn: &mut SqliteConnection, tmpl_id: &str) -> AppResult<u64> {
        sqlx::query("DELETE FROM template_fcp_mapping WHERE tmpl_id = ?")
            .bind(tmpl_id)
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| {
                AppError::with_source(ErrorKind::Store, "Failed to remove template devices", e)
            })
    }

    /// Mapped devices joined with their `fcp` rows, for the given templates
    /// or for every template when `tmpl_ids` is empty.
    pub async fn device_rows(
        conn: &mut SqliteConnection,
        tmpl_ids: &[String],
    ) -> AppResult<Vec<TemplateDeviceRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT tf.tmpl_id, tf.path, tf.fcp_id, fcp.assigner_id, fcp.connections, \
             fcp.reserved, fcp.wwpn_npiv, fcp.wwpn_phy, fcp.chpid, fcp.pchid, fcp.state, \
             fcp.owner, fcp.tmpl_id AS allocated_tmpl_id \
             FROM template_fcp_mapping AS tf \
             LEFT OUTER JOIN fcp ON tf.fcp_id = fcp.fcp_id",
        );
        if !tmpl_ids.is_empty() {
            qb.push(" WHERE tf.tmpl_id IN (");
            let mut list = qb.separated(", ");
            for id in tmpl_ids {
                list.push_bind(id.clone());
            }
            list.push_unseparated(")");
        }
        qb.push(" ORDER BY tf.tmpl_id, tf.path, tf.fcp_id");
        qb.build_query_as::<TemplateDeviceRow>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to read template devices", e))
    }

    /// Distinct PCHIDs of the devices mapped into a template, or into any
    /// template when `tmpl_id` is `None`.
    pub async fn pchids(conn: &mut SqliteConnection, tmpl_id: Option<&str>) -> AppResult<Vec<String>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT DISTINCT UPPER(fcp.pchid) FROM template_fcp_mapping AS tf \
             INNER JOIN fcp ON tf.fcp_id = fcp.fcp_id WHERE fcp.pchid <> ''",
        );
        if let Some(tmpl_id) = tmpl_id {
            qb.push(" AND tf.tmpl_id = ").push_bind(tmpl_id.to_string());
        }
        qb.push(" ORDER BY 1");
        qb.build_query_scalar::<String>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to read PCHIDs", e))
    }

    /// Devices that are mapped into a template and currently in use,
    /// reserved or connected, under that same template.
    pub async fn inuse_allocated_from(
        conn: &mut SqliteConnection,
        tmpl_id: &str,
        ids: &[FcpId],
    ) -> AppResult<Vec<FcpId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT fcp_id FROM fcp WHERE (connections <> 0 OR reserved <> 0) AND tmpl_id = ",
        );
        qb.push_bind(tmpl_id.to_string()).push(" AND fcp_id IN (");
        push_id_list(&mut qb, ids);
        qb.push(" ORDER BY fcp_id");
        qb.build_query_scalar::<FcpId>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to read in-use devices", e))
    }

    /// Devices whose allocation provenance points at a template.
    pub async fn allocated_from(conn: &mut SqliteConnection, tmpl_id: &str) -> AppResult<Vec<FcpId>> {
        sqlx::query_scalar::<_, FcpId>("SELECT fcp_id FROM fcp WHERE tmpl_id = ? ORDER BY fcp_id")
            .bind(tmpl_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Store, "Failed to read allocated devices", e)
            })
    }

    /// Devices of the list that are in use under any template.
    pub async fn inuse_among(conn: &mut SqliteConnection, ids: &[FcpId]) -> AppResult<Vec<FcpId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT fcp_id FROM fcp WHERE (connections <> 0 OR reserved <> 0) AND fcp_id IN (",
        );
        push_id_list(&mut qb, ids);
        qb.push(" ORDER BY fcp_id");
        qb.build_query_scalar::<FcpId>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to read in-use devices", e))
    }
}
