//! CLI command definitions and dispatch.

pub mod allocate;
pub mod device;
pub mod migrate;
pub mod pchid;
pub mod template;

use std::collections::BTreeMap;
use std::path::Path;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use fcpmgr_core::config::AppConfig;
use fcpmgr_core::error::AppError;
use fcpmgr_core::types::{CapacitySnapshot, FcpId, PchidCapacity, expand_fcp_list};
use fcpmgr_service::FcpManager;

/// FCP multipath device allocator
#[derive(Debug, Parser)]
#[command(name = "fcpmgr", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// FCP device usage and hypervisor facts
    Device(device::DeviceArgs),
    /// FCP multipath templates
    Template(template::TemplateArgs),
    /// Pick devices from a template without reserving them
    Select(allocate::SelectArgs),
    /// Reserve devices for a guest
    Allocate(allocate::AllocateArgs),
    /// Unreserve a guest's idle devices
    Release(allocate::ReleaseArgs),
    /// PCHID usage across templates
    Pchids(pchid::PchidArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        if let Commands::Migrate = self.command {
            return migrate::execute(config).await;
        }

        let manager = FcpManager::connect(config).await?;
        let result = match &self.command {
            Commands::Migrate => Ok(()),
            Commands::Device(args) => device::execute(args, &manager, self.format).await,
            Commands::Template(args) => template::execute(args, &manager, self.format).await,
            Commands::Select(args) => allocate::select(args, &manager, config, self.format).await,
            Commands::Allocate(args) => {
                allocate::allocate(args, &manager, config, self.format).await
            }
            Commands::Release(args) => allocate::release(args, &manager, self.format).await,
            Commands::Pchids(args) => pchid::execute(args, &manager, self.format).await,
        };
        manager.close().await;
        result
    }
}

/// Parse a device list such as `"1A00-1A03,1B05"` into ids. Path
/// separators are accepted and flattened.
pub fn parse_ids(raw: &str) -> Result<Vec<FcpId>, AppError> {
    let ids: Vec<FcpId> = expand_fcp_list(raw)?.into_values().flatten().collect();
    if ids.is_empty() {
        return Err(AppError::invalid_input(format!("No FCP device in '{raw}'")));
    }
    Ok(ids)
}

/// Capacity snapshot read from a JSON file, or derived from the store:
/// every template PCHID gets the configured `max` and its in-use devices
/// as `allocated`.
pub async fn load_capacity(
    file: Option<&Path>,
    manager: &FcpManager,
    config: &AppConfig,
) -> Result<CapacitySnapshot, AppError> {
    if let Some(file) = file {
        let raw = tokio::fs::read_to_string(file).await?;
        return Ok(serde_json::from_str(&raw)?);
    }

    let mut allocated: BTreeMap<String, i64> = BTreeMap::new();
    for device in manager.devices.all_devices().await? {
        if device.is_in_use() {
            *allocated.entry(device.pchid.to_uppercase()).or_default() += 1;
        }
    }

    let max = config.allocator.default_capacity_max;
    let mut snapshot = CapacitySnapshot::new();
    for pchid in manager.templates.pchids_of_all_templates().await? {
        let used = allocated.get(&pchid).copied().unwrap_or_default();
        snapshot.insert(&pchid, PchidCapacity::new(used, max));
    }
    Ok(snapshot)
}
