//! Select-and-reserve flow of the allocation engine.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;

use fcpmgr_core::error::AppError;
use fcpmgr_core::result::AppResult;
use fcpmgr_core::types::{CapacitySnapshot, FcpId, SelectionPolicy, shrink_fcp_list};
use fcpmgr_database::FcpDatabase;
use fcpmgr_database::repositories::{
    FcpRepository, TemplateFcpRepository, TemplateRepository, TemplateSpRepository,
};
use fcpmgr_entity::allocation::{AllocationOutcome, SelectedDevice, Selection};
use fcpmgr_entity::fcp::AssignedDevice;

use super::inventory::TemplateInventory;
use super::strategy::{SelectionStrategy, SelectionStrategyDispatch};
use crate::device::DeviceService;
use crate::template::TemplateService;

/// Request to hold devices for a guest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocateRequest {
    /// Guest the devices are reserved for.
    pub assigner_id: String,
    /// Template to allocate from. Falls back to the storage provider's
    /// default, then to the host default.
    #[serde(default)]
    pub template_id: Option<String>,
    /// Storage provider the guest attaches to.
    #[serde(default)]
    pub sp_name: Option<String>,
    /// Per-PCHID capacity at call time.
    #[serde(default)]
    pub capacity: CapacitySnapshot,
    /// Selection policy. Defaults to the configured one.
    #[serde(default)]
    pub policy: Option<SelectionPolicy>,
}

/// Picks devices from templates and reserves them for guests.
#[derive(Debug, Clone)]
pub struct AllocationService {
    /// Store handle.
    db: FcpDatabase,
    /// Policy used when a caller does not name one.
    default_policy: SelectionPolicy,
}

impl AllocationService {
    /// Creates a new allocation service.
    pub fn new(db: FcpDatabase, default_policy: SelectionPolicy) -> Self {
        Self { db, default_policy }
    }

    /// Policy used when a caller does not name one.
    pub fn default_policy(&self) -> SelectionPolicy {
        self.default_policy
    }

    /// Select one available device per path of a template without
    /// reserving anything.
    pub async fn select_devices(
        &self,
        template_id: &str,
        capacity: &CapacitySnapshot,
        policy: Option<SelectionPolicy>,
    ) -> AppResult<Selection> {
        let policy = policy.unwrap_or(self.default_policy);
        let mut tx = self.db.begin().await?;
        let selection = Self::select_in(tx.conn(), template_id, capacity, policy).await?;
        tx.commit().await?;
        Ok(selection)
    }

    /// Hold devices for a guest. A guest that already reserved devices from
    /// the template gets the same devices back.
    pub async fn allocate(&self, req: &AllocateRequest) -> AppResult<AllocationOutcome> {
        let policy = req.policy.unwrap_or(self.default_policy);
        let mut tx = self.db.begin().await?;
        let conn = tx.conn();

        let template_id =
            Self::resolve_template(conn, req.template_id.as_deref(), req.sp_name.as_deref())
                .await?;
        let path_count = TemplateFcpRepository::path_count(conn, &template_id).await?;

        let reserved =
            FcpRepository::reserved_of_assigner(conn, &req.assigner_id, &template_id).await?;
        if !reserved.is_empty() {
            tx.commit().await?;
            let devices: Vec<SelectedDevice> = reserved.into_iter().map(to_selected).collect();
            info!(
                assigner_id = %req.assigner_id,
                template_id = %template_id,
                devices = %shrink_fcp_list(devices.iter().map(|d| &d.fcp_id)),
                "Reusing FCP devices already reserved by assigner"
            );
            return Ok(outcome(devices, false, template_id, path_count, None));
        }

        let selection = Self::select_in(conn, &template_id, &req.capacity, policy).await?;
        if selection.is_empty() {
            tx.commit().await?;
            return Ok(outcome(
                Vec::new(),
                false,
                template_id,
                path_count,
                selection.reason,
            ));
        }

        DeviceService::reserve_in(conn, &selection.fcp_ids(), &req.assigner_id, &template_id)
            .await?;
        tx.commit().await?;

        info!(
            assigner_id = %req.assigner_id,
            template_id = %template_id,
            policy = %policy,
            devices = %shrink_fcp_list(selection.devices.iter().map(|d| &d.fcp_id)),
            "FCP devices allocated"
        );
        Ok(outcome(selection.devices, true, template_id, path_count, None))
    }

    /// Unreserve the guest's reserved devices from a template that carry no
    /// connections. Returns the released devices.
    pub async fn release(&self, assigner_id: &str, template_id: &str) -> AppResult<Vec<FcpId>> {
        let mut tx = self.db.begin().await?;
        let conn = tx.conn();

        TemplateService::find_in(conn, template_id).await?;
        let idle: Vec<FcpId> = FcpRepository::reserved_of_assigner(conn, assigner_id, template_id)
            .await?
            .into_iter()
            .filter(|d| d.connections == 0)
            .map(|d| d.fcp_id)
            .collect();
        if !idle.is_empty() {
            DeviceService::unreserve_in(conn, &idle).await?;
        }
        tx.commit().await?;

        info!(
            assigner_id = %assigner_id,
            template_id = %template_id,
            devices = %shrink_fcp_list(&idle),
            "FCP devices released"
        );
        Ok(idle)
    }

    async fn select_in(
        conn: &mut SqliteConnection,
        template_id: &str,
        capacity: &CapacitySnapshot,
        policy: SelectionPolicy,
    ) -> AppResult<Selection> {
        let template = TemplateService::find_in(conn, template_id).await?;
        let rows = TemplateFcpRepository::device_rows(conn, &[template.id.clone()]).await?;
        let path_count = TemplateFcpRepository::path_count(conn, &template.id).await?;
        let inventory =
            TemplateInventory::new(&template.id, template.resolved_min_paths(path_count), rows);

        Ok(run_strategy(policy, &inventory, capacity))
    }

    /// Explicit template, else the provider's default, else the host default.
    async fn resolve_template(
        conn: &mut SqliteConnection,
        template_id: Option<&str>,
        sp_name: Option<&str>,
    ) -> AppResult<String> {
        if let Some(id) = template_id.filter(|id| !id.is_empty()) {
            return Ok(TemplateService::find_in(conn, id).await?.id);
        }
        if let Some(sp_name) = sp_name.filter(|sp| !sp.is_empty()) {
            if let Some(id) = TemplateSpRepository::template_of(conn, sp_name).await? {
                return Ok(id);
            }
        }
        TemplateRepository::find_by_default(conn, true)
            .await?
            .into_iter()
            .next()
            .map(|t| t.id)
            .ok_or_else(|| {
                AppError::not_found(
                    "No FCP multipath template was given and neither the storage provider nor \
                     the host has a default template",
                )
            })
    }
}

/// Run the strategy on the calling thread with a thread-local generator.
fn run_strategy(
    policy: SelectionPolicy,
    inventory: &TemplateInventory,
    capacity: &CapacitySnapshot,
) -> Selection {
    let mut rng = rand::rng();
    SelectionStrategyDispatch::new(policy).select(inventory, capacity, &mut rng)
}

fn to_selected(device: AssignedDevice) -> SelectedDevice {
    SelectedDevice {
        path: u32::try_from(device.path).unwrap_or_default(),
        fcp_id: device.fcp_id,
        wwpn_npiv: device.wwpn_npiv,
        wwpn_phy: device.wwpn_phy,
        pchid: device.pchid.to_uppercase(),
    }
}

fn outcome(
    mut devices: Vec<SelectedDevice>,
    is_reserved_changed: bool,
    template_id: String,
    path_count: usize,
    reason: Option<String>,
) -> AllocationOutcome {
    devices.sort_by_key(|d| d.path);
    AllocationOutcome {
        pchid_devices: AllocationOutcome::group_by_pchid(&devices),
        devices,
        is_reserved_changed,
        template_id,
        path_count,
        reason,
    }
}
