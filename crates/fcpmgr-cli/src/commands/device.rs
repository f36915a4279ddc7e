//! FCP device commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Deserialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use fcpmgr_core::error::AppError;
use fcpmgr_core::types::{FcpId, shrink_fcp_list};
use fcpmgr_entity::fcp::{DeviceFacts, FcpDevice, FcpUsage, SyncBatch};
use fcpmgr_service::FcpManager;
use fcpmgr_service::device::SyncSummary;

/// Arguments for device commands
#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Device subcommand
    #[command(subcommand)]
    pub command: DeviceCommand,
}

/// Device subcommands
#[derive(Debug, Subcommand)]
pub enum DeviceCommand {
    /// List devices, optionally of one guest
    List {
        /// Guest id
        #[arg(long)]
        assigner: Option<String>,
    },
    /// Show the usage columns of a device
    Usage {
        /// Device id
        id: FcpId,
    },
    /// Overwrite the usage columns of a device
    SetUsage {
        /// Device id
        id: FcpId,
        /// Guest id, empty to clear
        #[arg(long, default_value = "")]
        assigner: String,
        /// 1 to mark reserved
        #[arg(long, default_value_t = 0)]
        reserved: i64,
        /// Connection count
        #[arg(long, default_value_t = 0)]
        connections: i64,
        /// Template the device was allocated from
        #[arg(long, default_value = "")]
        template: String,
    },
    /// Reserve devices for a guest from a template
    Reserve {
        /// Devices, e.g. "1A00-1A03,1B05"
        ids: String,
        /// Guest id
        #[arg(long)]
        assigner: String,
        /// Template id
        #[arg(long)]
        template: String,
    },
    /// Clear the reservation of devices
    Unreserve {
        /// Devices, e.g. "1A00-1A03,1B05"
        ids: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// Record an attachment of a device held by a guest
    Connect {
        /// Device id
        id: FcpId,
        /// Guest id
        #[arg(long)]
        assigner: String,
    },
    /// Record a detachment of a device
    Disconnect {
        /// Device id
        id: FcpId,
    },
    /// Release every device of a guest
    Reset {
        /// Guest id
        assigner: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// Import hypervisor facts from a JSON file: either a list of devices
    /// or a sync batch with insert/update/delete/state_changes
    Import {
        /// JSON file
        file: PathBuf,
    },
}

/// Contents accepted by `device import`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Devices(Vec<DeviceFacts>),
    Batch(SyncBatch),
}

/// Device display row
#[derive(Debug, Tabled)]
struct DeviceRow {
    /// Device
    fcp_id: String,
    /// Guest
    assigner: String,
    /// Reserved
    reserved: i64,
    /// Connections
    connections: i64,
    /// Template
    template: String,
    /// PCHID
    pchid: String,
    /// CHPID
    chpid: String,
    /// State
    state: String,
    /// Owner
    owner: String,
    /// NPIV WWPN
    wwpn_npiv: String,
    /// Physical WWPN
    wwpn_phy: String,
}

impl From<&FcpDevice> for DeviceRow {
    fn from(d: &FcpDevice) -> Self {
        Self {
            fcp_id: d.fcp_id.to_string(),
            assigner: d.assigner_id.clone(),
            reserved: d.reserved,
            connections: d.connections,
            template: d.tmpl_id.clone(),
            pchid: d.pchid.clone(),
            chpid: d.chpid.clone(),
            state: d.state.clone(),
            owner: d.owner.clone(),
            wwpn_npiv: d.wwpn_npiv.clone(),
            wwpn_phy: d.wwpn_phy.clone(),
        }
    }
}

/// Execute device commands
pub async fn execute(
    args: &DeviceArgs,
    manager: &FcpManager,
    format: OutputFormat,
) -> Result<(), AppError> {
    let devices = &manager.devices;

    match &args.command {
        DeviceCommand::List { assigner } => {
            let list = devices.list_devices(assigner.as_deref()).await?;
            let rows: Vec<DeviceRow> = list.iter().map(DeviceRow::from).collect();
            output::print_list(&rows, &list, format)?;
        }
        DeviceCommand::Usage { id } => {
            let usage = devices.usage(id).await?;
            print_usage(id, &usage, format)?;
        }
        DeviceCommand::SetUsage {
            id,
            assigner,
            reserved,
            connections,
            template,
        } => {
            let usage = FcpUsage {
                assigner_id: assigner.clone(),
                reserved: *reserved,
                connections: *connections,
                tmpl_id: template.clone(),
            };
            devices.set_usage(id, &usage).await?;
            output::print_success(&format!("Usage of FCP device {id} updated"));
        }
        DeviceCommand::Reserve {
            ids,
            assigner,
            template,
        } => {
            let ids = super::parse_ids(ids)?;
            devices.reserve_devices(&ids, assigner, template).await?;
            output::print_success(&format!(
                "FCP devices {} reserved for {assigner}",
                shrink_fcp_list(&ids)
            ));
        }
        DeviceCommand::Unreserve { ids, force } => {
            let ids = super::parse_ids(ids)?;
            let prompt = format!(
                "Unreserve FCP devices {} even if they are connected?",
                shrink_fcp_list(&ids)
            );
            if output::confirm(&prompt, *force)? {
                devices.unreserve_devices(&ids).await?;
                output::print_success(&format!("FCP devices {} unreserved", shrink_fcp_list(&ids)));
            }
        }
        DeviceCommand::Connect { id, assigner } => {
            let connections = devices.increase_connections(id, assigner).await?;
            output::print_success(&format!("FCP device {id} now has {connections} connections"));
        }
        DeviceCommand::Disconnect { id } => {
            let connections = devices.decrease_connections(id).await?;
            output::print_success(&format!("FCP device {id} now has {connections} connections"));
        }
        DeviceCommand::Reset { assigner, force } => {
            let prompt = format!("Release every FCP device held by {assigner}?");
            if output::confirm(&prompt, *force)? {
                let count = devices.reset_devices_of_assigner(assigner).await?;
                output::print_success(&format!("Released {count} FCP devices of {assigner}"));
            }
        }
        DeviceCommand::Import { file } => {
            let raw = tokio::fs::read_to_string(file).await?;
            let summary = match serde_json::from_str::<ImportFile>(&raw)? {
                ImportFile::Devices(facts) => devices.import_devices(facts).await?,
                ImportFile::Batch(batch) => devices.sync_from_hypervisor(&batch).await?,
            };
            print_summary(&summary, format)?;
        }
    }

    Ok(())
}

fn print_usage(id: &FcpId, usage: &FcpUsage, format: OutputFormat) -> Result<(), AppError> {
    let pairs = [
        ("FCP device", id.to_string()),
        ("Assigner", usage.assigner_id.clone()),
        ("Reserved", usage.reserved.to_string()),
        ("Connections", usage.connections.to_string()),
        ("Template", usage.tmpl_id.clone()),
    ];
    output::print_item(&pairs, usage, format)
}

fn print_summary(summary: &SyncSummary, format: OutputFormat) -> Result<(), AppError> {
    let pairs = [
        ("Inserted", summary.inserted.to_string()),
        ("Updated", summary.updated.to_string()),
        ("Deleted", summary.deleted.to_string()),
        ("State changed", summary.state_changed.to_string()),
    ];
    output::print_item(&pairs, summary, format)
}
