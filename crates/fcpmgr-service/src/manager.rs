//! The allocator aggregate handed to callers.

use tracing::info;

use fcpmgr_core::config::{AllocatorConfig, AppConfig};
use fcpmgr_core::result::AppResult;
use fcpmgr_database::FcpDatabase;
use fcpmgr_database::migration::run_migrations;

use crate::allocation::AllocationService;
use crate::device::DeviceService;
use crate::template::TemplateService;

/// One store handle shared by the device, template and allocation
/// services. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct FcpManager {
    /// Store handle shared by all services.
    db: FcpDatabase,
    /// Device usage counters and hypervisor sync.
    pub devices: DeviceService,
    /// Multipath templates.
    pub templates: TemplateService,
    /// Device selection and reservation.
    pub allocation: AllocationService,
}

impl FcpManager {
    /// Wire the services over an open store.
    pub fn new(db: FcpDatabase, allocator: &AllocatorConfig) -> Self {
        Self {
            devices: DeviceService::new(db.clone()),
            templates: TemplateService::new(db.clone()),
            allocation: AllocationService::new(db.clone(), allocator.policy()),
            db,
        }
    }

    /// Open the configured store, apply pending migrations and wire the
    /// services.
    pub async fn connect(config: &AppConfig) -> AppResult<Self> {
        let db = FcpDatabase::connect(&config.database).await?;
        run_migrations(db.pool()).await?;
        info!(policy = %config.allocator.policy(), "FCP manager ready");
        Ok(Self::new(db, &config.allocator))
    }

    /// The shared store handle.
    pub fn database(&self) -> &FcpDatabase {
        &self.db
    }

    /// Close the store.
    pub async fn close(&self) {
        self.db.close().await;
    }
}
