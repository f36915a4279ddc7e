//! Usage counters of FCP devices: reserve, connect, release.

use std::collections::BTreeMap;

use sqlx::SqliteConnection;
use tracing::{info, warn};

use fcpmgr_core::error::AppError;
use fcpmgr_core::result::AppResult;
use fcpmgr_core::types::{FcpId, shrink_fcp_list};
use fcpmgr_database::FcpDatabase;
use fcpmgr_database::repositories::FcpRepository;
use fcpmgr_entity::fcp::{AssignedDevice, FcpDevice, FcpUsage};

/// Atomic mutators and queries over the `fcp` table.
#[derive(Debug, Clone)]
pub struct DeviceService {
    /// Store handle.
    db: FcpDatabase,
}

impl DeviceService {
    /// Creates a new device service.
    pub fn new(db: FcpDatabase) -> Self {
        Self { db }
    }

    pub(crate) fn db(&self) -> &FcpDatabase {
        &self.db
    }

    /// Reserves devices for a guest from a template. Fails as a whole if any
    /// device is unknown.
    pub async fn reserve_devices(
        &self,
        ids: &[FcpId],
        assigner_id: &str,
        template_id: &str,
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        Self::reserve_in(tx.conn(), ids, assigner_id, template_id).await?;
        tx.commit().await?;

        info!(
            devices = %shrink_fcp_list(ids),
            assigner_id = %assigner_id,
            template_id = %template_id,
            "FCP devices reserved"
        );
        Ok(())
    }

    /// Clears the reservation and template provenance of devices,
    /// regardless of their connections.
    pub async fn unreserve_devices(&self, ids: &[FcpId]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        Self::unreserve_in(tx.conn(), ids).await?;
        tx.commit().await?;

        info!(devices = %shrink_fcp_list(ids), "FCP devices unreserved");
        Ok(())
    }

    /// Adds a connection to a device held by the guest. Returns the new
    /// count.
    pub async fn increase_connections(&self, fcp_id: &FcpId, assigner_id: &str) -> AppResult<i64> {
        let mut tx = self.db.begin().await?;
        let conn = tx.conn();

        let touched = FcpRepository::increment_connections(conn, fcp_id, assigner_id).await?;
        if touched == 0 {
            return Err(AppError::not_found(format!(
                "FCP device {fcp_id} does not exist or is not held by {assigner_id}"
            )));
        }
        let connections = FcpRepository::connections(conn, fcp_id)
            .await?
            .unwrap_or_default();
        tx.commit().await?;

        info!(
            fcp_id = %fcp_id,
            assigner_id = %assigner_id,
            connections,
            "FCP device connection added"
        );
        Ok(connections)
    }

    /// Removes a connection from a device. Returns the new count.
    ///
    /// A count already at zero stays at zero. Once a device is neither
    /// connected nor reserved, its template provenance is cleared.
    pub async fn decrease_connections(&self, fcp_id: &FcpId) -> AppResult<i64> {
        let mut tx = self.db.begin().await?;
        let conn = tx.conn();

        let current = FcpRepository::connections(conn, fcp_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("FCP device {fcp_id} does not exist")))?;

        let connections = if current <= 0 {
            warn!(
                fcp_id = %fcp_id,
                connections = current,
                "Connections of FCP device already at zero, keeping zero"
            );
            0
        } else {
            current - 1
        };
        if connections != current {
            FcpRepository::set_connections(conn, fcp_id, connections).await?;
        }
        if connections == 0 {
            FcpRepository::clear_template_if_idle(conn, fcp_id).await?;
        }
        tx.commit().await?;

        info!(fcp_id = %fcp_id, connections, "FCP device connection removed");
        Ok(connections)
    }

    /// Releases every device held by a guest. Returns the number of devices
    /// reset.
    pub async fn reset_devices_of_assigner(&self, assigner_id: &str) -> AppResult<u64> {
        let mut tx = self.db.begin().await?;
        let reset = FcpRepository::reset_by_assigner(tx.conn(), assigner_id).await?;
        tx.commit().await?;

        info!(assigner_id = %assigner_id, reset, "FCP devices of assigner reset");
        Ok(reset)
    }

    /// Usage columns of a device.
    pub async fn usage(&self, fcp_id: &FcpId) -> AppResult<FcpUsage> {
        let mut tx = self.db.begin().await?;
        let usage = FcpRepository::usage(tx.conn(), fcp_id).await?;
        tx.commit().await?;
        usage.ok_or_else(|| AppError::not_found(format!("FCP device {fcp_id} does not exist")))
    }

    /// Operator override of the usage columns of a device.
    pub async fn set_usage(&self, fcp_id: &FcpId, usage: &FcpUsage) -> AppResult<()> {
        if usage.connections < 0 {
            return Err(AppError::invalid_input(format!(
                "Connections of FCP device {fcp_id} must not be negative, got {}",
                usage.connections
            )));
        }

        let mut tx = self.db.begin().await?;
        let touched = FcpRepository::set_usage(tx.conn(), fcp_id, usage).await?;
        if touched == 0 {
            return Err(AppError::not_found(format!("FCP device {fcp_id} does not exist")));
        }
        tx.commit().await?;

        info!(
            fcp_id = %fcp_id,
            assigner_id = %usage.assigner_id,
            reserved = usage.reserved,
            connections = usage.connections,
            template_id = %usage.tmpl_id,
            "FCP device usage updated"
        );
        Ok(())
    }

    /// Connection count of a device.
    pub async fn connections(&self, fcp_id: &FcpId) -> AppResult<i64> {
        let mut tx = self.db.begin().await?;
        let connections = FcpRepository::connections(tx.conn(), fcp_id).await?;
        tx.commit().await?;
        connections.ok_or_else(|| AppError::not_found(format!("FCP device {fcp_id} does not exist")))
    }

    /// Devices of a guest, or every device when no guest is given.
    pub async fn list_devices(&self, assigner_id: Option<&str>) -> AppResult<Vec<FcpDevice>> {
        let Some(assigner_id) = assigner_id else {
            return self.all_devices().await;
        };

        let mut tx = self.db.begin().await?;
        let devices = FcpRepository::find_by_assigner(tx.conn(), assigner_id).await?;
        tx.commit().await?;

        if devices.is_empty() {
            return Err(AppError::not_found(format!(
                "No FCP device is held by {assigner_id}"
            )));
        }
        Ok(devices)
    }

    /// Every device.
    pub async fn all_devices(&self) -> AppResult<Vec<FcpDevice>> {
        let mut tx = self.db.begin().await?;
        let devices = FcpRepository::find_all(tx.conn()).await?;
        tx.commit().await?;
        Ok(devices)
    }

    /// Devices a guest holds from a template, reserved or connected.
    pub async fn allocated_devices_of_assigner(
        &self,
        assigner_id: &str,
        template_id: &str,
    ) -> AppResult<Vec<AssignedDevice>> {
        let mut tx = self.db.begin().await?;
        let devices = FcpRepository::allocated_of_assigner(tx.conn(), assigner_id, template_id).await?;
        tx.commit().await?;
        Ok(devices)
    }

    /// Devices a guest has reserved from a template.
    pub async fn reserved_devices_of_assigner(
        &self,
        assigner_id: &str,
        template_id: &str,
    ) -> AppResult<Vec<AssignedDevice>> {
        let mut tx = self.db.begin().await?;
        let devices = FcpRepository::reserved_of_assigner(tx.conn(), assigner_id, template_id).await?;
        tx.commit().await?;
        Ok(devices)
    }

    /// PCHID → shrunk list of devices currently allocated from a template.
    pub async fn inuse_pchids(&self) -> AppResult<BTreeMap<String, String>> {
        let mut tx = self.db.begin().await?;
        let rows = FcpRepository::inuse_by_pchid(tx.conn()).await?;
        tx.commit().await?;

        let mut grouped: BTreeMap<String, Vec<FcpId>> = BTreeMap::new();
        for (pchid, fcp_id) in rows {
            grouped.entry(pchid.to_uppercase()).or_default().push(fcp_id);
        }
        Ok(grouped
            .into_iter()
            .map(|(pchid, ids)| (pchid, shrink_fcp_list(&ids)))
            .collect())
    }

    /// PCHID → physical WWPNs of the devices on it.
    pub async fn wwpn_phy_of_pchids(
        &self,
        pchids: &[String],
    ) -> AppResult<BTreeMap<String, Vec<String>>> {
        let pchids: Vec<String> = pchids.iter().map(|p| p.to_uppercase()).collect();
        let mut tx = self.db.begin().await?;
        let rows = FcpRepository::wwpn_phy_of_pchids(tx.conn(), &pchids).await?;
        tx.commit().await?;

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (pchid, wwpn_phy) in rows {
            let wwpns = grouped.entry(pchid.to_uppercase()).or_default();
            if !wwpns.iter().any(|w| w.eq_ignore_ascii_case(&wwpn_phy)) {
                wwpns.push(wwpn_phy);
            }
        }
        Ok(grouped)
    }

    /// Reserve inside an open transaction.
    pub(crate) async fn reserve_in(
        conn: &mut SqliteConnection,
        ids: &[FcpId],
        assigner_id: &str,
        template_id: &str,
    ) -> AppResult<()> {
        Self::ensure_exist(conn, ids).await?;
        FcpRepository::reserve(conn, ids, assigner_id, template_id).await?;
        Ok(())
    }

    /// Unreserve inside an open transaction.
    pub(crate) async fn unreserve_in(conn: &mut SqliteConnection, ids: &[FcpId]) -> AppResult<()> {
        Self::ensure_exist(conn, ids).await?;
        FcpRepository::unreserve(conn, ids).await?;
        Ok(())
    }

    async fn ensure_exist(conn: &mut SqliteConnection, ids: &[FcpId]) -> AppResult<()> {
        let missing = FcpRepository::find_missing_ids(conn, ids).await?;
        if !missing.is_empty() {
            return Err(AppError::not_found(format!(
                "FCP devices {} do not exist",
                shrink_fcp_list(&missing)
            )));
        }
        Ok(())
    }
}
