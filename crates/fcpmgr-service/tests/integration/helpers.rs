//! Shared test helpers for integration tests.

use fcpmgr_core::config::{AllocatorConfig, AppConfig, DatabaseConfig};
use fcpmgr_core::types::{CapacitySnapshot, FcpId};
use fcpmgr_entity::fcp::{DeviceFacts, FcpDevice};
use fcpmgr_entity::template::TemplateInfo;
use fcpmgr_service::FcpManager;
use fcpmgr_service::template::{CreateTemplateRequest, DeviceList};

/// Test application context
pub struct TestApp {
    /// Allocator over a private in-memory store
    pub manager: FcpManager,
}

impl TestApp {
    /// Create a new test application with the weighted policy
    pub async fn new() -> Self {
        Self::with_allocator(AllocatorConfig::default()).await
    }

    /// Create a new test application with custom allocator settings
    pub async fn with_allocator(allocator: AllocatorConfig) -> Self {
        let config = AppConfig {
            database: DatabaseConfig::in_memory(),
            allocator,
            ..AppConfig::default()
        };
        let manager = FcpManager::connect(&config)
            .await
            .expect("Failed to open test database");
        Self { manager }
    }

    /// Insert free devices as `(fcp_id, pchid)` pairs
    pub async fn seed(&self, devices: &[(&str, &str)]) {
        let facts = devices
            .iter()
            .map(|(fcp_id, pchid)| free_device(fcp_id, pchid))
            .collect();
        self.manager
            .devices
            .import_devices(facts)
            .await
            .expect("Failed to seed devices");
    }

    /// Create a template from the textual device list
    pub async fn create_template(
        &self,
        id: &str,
        devices: &str,
        min_paths: Option<i64>,
    ) -> TemplateInfo {
        self.manager
            .templates
            .create(CreateTemplateRequest {
                id: Some(id.to_string()),
                name: id.to_string(),
                devices: DeviceList::Text(devices.to_string()),
                min_fcp_paths_count: min_paths,
                ..CreateTemplateRequest::default()
            })
            .await
            .expect("Failed to create template")
    }

    /// Seed the devices of the two-path template used across tests:
    /// path 0 holds 1A01-1A02 on AAAA, path 1 holds 1B01 on BBBB.
    pub async fn example_p(&self) -> TemplateInfo {
        self.seed(&[("1A01", "AAAA"), ("1A02", "AAAA"), ("1B01", "BBBB")])
            .await;
        self.create_template("P", "1A01-1A02;1B01", Some(2)).await
    }

    /// Fetch one device row
    pub async fn device(&self, fcp_id: &str) -> FcpDevice {
        let id = fcp(fcp_id);
        self.manager
            .devices
            .all_devices()
            .await
            .expect("Failed to list devices")
            .into_iter()
            .find(|d| d.fcp_id == id)
            .expect("Device not found")
    }
}

/// Parse a device id
pub fn fcp(raw: &str) -> FcpId {
    FcpId::parse(raw).expect("Invalid FCP id")
}

/// Parse several device ids
pub fn fcps(raw: &[&str]) -> Vec<FcpId> {
    raw.iter().map(|r| fcp(r)).collect()
}

/// Facts of a free, fully described device
pub fn free_device(fcp_id: &str, pchid: &str) -> DeviceFacts {
    DeviceFacts {
        fcp_id: fcp(fcp_id),
        wwpn_npiv: format!("c05076de3300{}", fcp_id.to_lowercase()),
        wwpn_phy: format!("c05076de3300{}", pchid.to_lowercase()),
        chpid: "27".to_string(),
        pchid: pchid.to_string(),
        state: "free".to_string(),
        owner: "NONE".to_string(),
    }
}

/// Capacity for Example P
pub fn example_capacity(bbbb_allocated: i64) -> CapacitySnapshot {
    CapacitySnapshot::new()
        .with("AAAA", 0, 2)
        .with("BBBB", bbbb_allocated, 1)
}
