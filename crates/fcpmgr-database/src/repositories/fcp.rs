//! `fcp` table repository.

use std::collections::BTreeSet;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use fcpmgr_core::error::{AppError, ErrorKind};
use fcpmgr_core::result::AppResult;
use fcpmgr_core::types::FcpId;
use fcpmgr_entity::fcp::{AssignedDevice, DeviceFacts, FcpDevice, FcpUsage};

const DEVICE_COLUMNS: &str = "fcp_id, assigner_id, connections, reserved, wwpn_npiv, wwpn_phy, \
                              chpid, pchid, state, owner, tmpl_id";

/// Repository for device rows and their usage columns.
#[derive(Debug, Clone, Copy)]
pub struct FcpRepository;

impl FcpRepository {
    /// All devices ordered by id.
    pub async fn find_all(conn: &mut SqliteConnection) -> AppResult<Vec<FcpDevice>> {
        sqlx::query_as::<_, FcpDevice>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM fcp ORDER BY fcp_id"
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to list FCP devices", e))
    }

    /// Devices held by a guest ordered by id.
    pub async fn find_by_assigner(
        conn: &mut SqliteConnection,
        assigner_id: &str,
    ) -> AppResult<Vec<FcpDevice>> {
        sqlx::query_as::<_, FcpDevice>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM fcp WHERE assigner_id = ? ORDER BY fcp_id"
        ))
        .bind(assigner_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Store, "Failed to list devices of assigner", e)
        })
    }

    /// Devices with the given ids that exist in the table.
    pub async fn find_existing_ids(
        conn: &mut SqliteConnection,
        ids: &[FcpId],
    ) -> AppResult<BTreeSet<FcpId>> {
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT fcp_id FROM fcp WHERE fcp_id IN (");
        push_id_list(&mut qb, ids);
        qb.build_query_scalar::<FcpId>()
            .fetch_all(&mut *conn)
            .await
            .map(|found| found.into_iter().collect())
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to look up devices", e))
    }

    /// Ids from the list that have no row in the table.
    pub async fn find_missing_ids(
        conn: &mut SqliteConnection,
        ids: &[FcpId],
    ) -> AppResult<BTreeSet<FcpId>> {
        let existing = Self::find_existing_ids(conn, ids).await?;
        Ok(ids
            .iter()
            .filter(|id| !existing.contains(*id))
            .cloned()
            .collect())
    }

    /// Reserve devices for a guest from a template.
    pub async fn reserve(
        conn: &mut SqliteConnection,
        ids: &[FcpId],
        assigner_id: &str,
        tmpl_id: &str,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE fcp SET reserved = 1, assigner_id = ");
        qb.push_bind(assigner_id.to_string())
            .push(", tmpl_id = ")
            .push_bind(tmpl_id.to_string())
            .push(" WHERE fcp_id IN (");
        push_id_list(&mut qb, ids);
        qb.build()
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to reserve devices", e))
    }

    /// Clear the reservation and allocation provenance of devices.
    pub async fn unreserve(conn: &mut SqliteConnection, ids: &[FcpId]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb =
            QueryBuilder::<Sqlite>::new("UPDATE fcp SET reserved = 0, tmpl_id = '' WHERE fcp_id IN (");
        push_id_list(&mut qb, ids);
        qb.build()
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to unreserve devices", e))
    }

    /// Current connection count, `None` if the device does not exist.
    pub async fn connections(
        conn: &mut SqliteConnection,
        fcp_id: &FcpId,
    ) -> AppResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT connections FROM fcp WHERE fcp_id = ?")
            .bind(fcp_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to read connections", e))
    }

    /// Increment connections on a device held by the guest. Returns the
    /// number of rows touched.
    pub async fn increment_connections(
        conn: &mut SqliteConnection,
        fcp_id: &FcpId,
        assigner_id: &str,
    ) -> AppResult<u64> {
        sqlx::query(
            "UPDATE fcp SET connections = connections + 1 WHERE fcp_id = ? AND assigner_id = ?",
        )
        .bind(fcp_id)
        .bind(assigner_id)
        .execute(&mut *conn)
        .await
        .map(|r| r.rows_affected())
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to increase connections", e))
    }

    /// Overwrite the connection count.
    pub async fn set_connections(
        conn: &mut SqliteConnection,
        fcp_id: &FcpId,
        connections: i64,
    ) -> AppResult<()> {
        sqlx::query("UPDATE fcp SET connections = ? WHERE fcp_id = ?")
            .bind(connections)
            .bind(fcp_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to set connections", e))?;
        Ok(())
    }

    /// Drop the allocation provenance of a device that is no longer in use.
    pub async fn clear_template_if_idle(
        conn: &mut SqliteConnection,
        fcp_id: &FcpId,
    ) -> AppResult<bool> {
        sqlx::query(
            "UPDATE fcp SET tmpl_id = '' \
             WHERE fcp_id = ? AND connections = 0 AND reserved = 0 AND tmpl_id <> ''",
        )
        .bind(fcp_id)
        .execute(&mut *conn)
        .await
        .map(|r| r.rows_affected() > 0)
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to clear template id", e))
    }

    /// Clear every usage column of the devices held by a guest.
    pub async fn reset_by_assigner(conn: &mut SqliteConnection, assigner_id: &str) -> AppResult<u64> {
        sqlx::query(
            "UPDATE fcp SET assigner_id = '', reserved = 0, connections = 0, tmpl_id = '' \
             WHERE assigner_id = ?",
        )
        .bind(assigner_id)
        .execute(&mut *conn)
        .await
        .map(|r| r.rows_affected())
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to reset devices", e))
    }

    /// Usage columns of a device.
    pub async fn usage(conn: &mut SqliteConnection, fcp_id: &FcpId) -> AppResult<Option<FcpUsage>> {
        sqlx::query_as::<_, FcpUsage>(
            "SELECT assigner_id, reserved, connections, tmpl_id FROM fcp WHERE fcp_id = ?",
        )
        .bind(fcp_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to read device usage", e))
    }

    /// Overwrite the usage columns of a device.
    pub async fn set_usage(
        conn: &mut SqliteConnection,
        fcp_id: &FcpId,
        usage: &FcpUsage,
    ) -> AppResult<u64> {
        sqlx::query(
            "UPDATE fcp SET assigner_id = ?, reserved = ?, connections = ?, tmpl_id = ? \
             WHERE fcp_id = ?",
        )
        .bind(&usage.assigner_id)
        .bind(usage.reserved)
        .bind(usage.connections)
        .bind(&usage.tmpl_id)
        .bind(fcp_id)
        .execute(&mut *conn)
        .await
        .map(|r| r.rows_affected())
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to update device usage", e))
    }

    /// Insert newly reported devices.
    pub async fn insert_facts(conn: &mut SqliteConnection, facts: &[DeviceFacts]) -> AppResult<()> {
        for fact in facts {
            sqlx::query(
                "INSERT INTO fcp (fcp_id, wwpn_npiv, wwpn_phy, chpid, pchid, state, owner) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&fact.fcp_id)
            .bind(&fact.wwpn_npiv)
            .bind(&fact.wwpn_phy)
            .bind(&fact.chpid)
            .bind(fact.pchid.to_uppercase())
            .bind(&fact.state)
            .bind(&fact.owner)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Store,
                    format!("Failed to insert FCP device {}", fact.fcp_id),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Refresh hypervisor-owned columns of existing devices.
    pub async fn update_facts(conn: &mut SqliteConnection, facts: &[DeviceFacts]) -> AppResult<()> {
        for fact in facts {
            sqlx::query(
                "UPDATE fcp SET wwpn_npiv = ?, wwpn_phy = ?, chpid = ?, pchid = ?, state = ?, \
                 owner = ? WHERE fcp_id = ?",
            )
            .bind(&fact.wwpn_npiv)
            .bind(&fact.wwpn_phy)
            .bind(&fact.chpid)
            .bind(fact.pchid.to_uppercase())
            .bind(&fact.state)
            .bind(&fact.owner)
            .bind(&fact.fcp_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Store,
                    format!("Failed to update FCP device {}", fact.fcp_id),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Delete device rows.
    pub async fn delete(conn: &mut SqliteConnection, ids: &[FcpId]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM fcp WHERE fcp_id IN (");
        push_id_list(&mut qb, ids);
        qb.build()
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to delete devices", e))
    }

    /// Set the raw state of several devices.
    pub async fn update_state(
        conn: &mut SqliteConnection,
        ids: &[FcpId],
        state: &str,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE fcp SET state = ");
        qb.push_bind(state.to_string()).push(" WHERE fcp_id IN (");
        push_id_list(&mut qb, ids);
        qb.build()
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to update device state", e))
    }

    /// Devices a guest holds from a template, either reserved or connected.
    pub async fn allocated_of_assigner(
        conn: &mut SqliteConnection,
        assigner_id: &str,
        tmpl_id: &str,
    ) -> AppResult<Vec<AssignedDevice>> {
        Self::assigned(conn, assigner_id, tmpl_id, "(fcp.connections <> 0 OR fcp.reserved <> 0)")
            .await
    }

    /// Devices a guest has reserved from a template.
    pub async fn reserved_of_assigner(
        conn: &mut SqliteConnection,
        assigner_id: &str,
        tmpl_id: &str,
    ) -> AppResult<Vec<AssignedDevice>> {
        Self::assigned(conn, assigner_id, tmpl_id, "fcp.reserved <> 0").await
    }

    async fn assigned(
        conn: &mut SqliteConnection,
        assigner_id: &str,
        tmpl_id: &str,
        usage_predicate: &str,
    ) -> AppResult<Vec<AssignedDevice>> {
        let sql = format!(
            "SELECT fcp.fcp_id, tf.path, fcp.pchid, fcp.wwpn_npiv, fcp.wwpn_phy, \
             fcp.connections, fcp.reserved \
             FROM template_fcp_mapping AS tf \
             INNER JOIN fcp ON tf.fcp_id = fcp.fcp_id \
             WHERE tf.tmpl_id = ? AND fcp.assigner_id = ? AND {usage_predicate} \
             AND fcp.tmpl_id = ? \
             ORDER BY tf.fcp_id"
        );
        sqlx::query_as::<_, AssignedDevice>(&sql)
            .bind(tmpl_id)
            .bind(assigner_id)
            .bind(tmpl_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Store, "Failed to read devices of assigner", e)
            })
    }

    /// `(pchid, fcp_id)` of every device carrying an allocation provenance.
    pub async fn inuse_by_pchid(conn: &mut SqliteConnection) -> AppResult<Vec<(String, FcpId)>> {
        sqlx::query_as::<_, (String, FcpId)>(
            "SELECT pchid, fcp_id FROM fcp WHERE tmpl_id <> '' ORDER BY pchid, fcp_id",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to read in-use PCHIDs", e))
    }

    /// Distinct `(pchid, wwpn_phy)` pairs for the given PCHIDs.
    pub async fn wwpn_phy_of_pchids(
        conn: &mut SqliteConnection,
        pchids: &[String],
    ) -> AppResult<Vec<(String, String)>> {
        if pchids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT DISTINCT pchid, wwpn_phy FROM fcp WHERE pchid IN (");
        let mut list = qb.separated(", ");
        for pchid in pchids {
            list.push_bind(pchid.clone());
        }
        list.push_unseparated(") ORDER BY pchid, wwpn_phy");
        qb.build_query_as::<(String, String)>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Store, "Failed to read physical WWPNs", e))
    }
}

/// Append `id, id, ...)` to a builder that already ends with `IN (`.
pub(crate) fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[FcpId]) {
    let mut list = qb.separated(", ");
    for id in ids {
        list.push_bind(id.clone());
    }
    list.push_unseparated(")");
}
