//! Device selection and reservation commands.

use std::path::PathBuf;

use clap::Args;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use fcpmgr_core::config::AppConfig;
use fcpmgr_core::error::AppError;
use fcpmgr_core::types::{SelectionPolicy, shrink_fcp_list};
use fcpmgr_entity::allocation::SelectedDevice;
use fcpmgr_service::FcpManager;
use fcpmgr_service::allocation::AllocateRequest;

/// Arguments for `select`
#[derive(Debug, Args)]
pub struct SelectArgs {
    /// Template id
    pub template: String,
    /// Capacity snapshot JSON file; derived from the store when omitted
    #[arg(long)]
    pub capacity: Option<PathBuf>,
    /// Selection policy (same_index or weighted)
    #[arg(long)]
    pub policy: Option<SelectionPolicy>,
}

/// Arguments for `allocate`
#[derive(Debug, Args)]
pub struct AllocateArgs {
    /// Guest id
    #[arg(long)]
    pub assigner: String,
    /// Template id; falls back to the storage provider or host default
    #[arg(long)]
    pub template: Option<String>,
    /// Storage provider the guest attaches to
    #[arg(long)]
    pub sp: Option<String>,
    /// Capacity snapshot JSON file; derived from the store when omitted
    #[arg(long)]
    pub capacity: Option<PathBuf>,
    /// Selection policy (same_index or weighted)
    #[arg(long)]
    pub policy: Option<SelectionPolicy>,
}

/// Arguments for `release`
#[derive(Debug, Args)]
pub struct ReleaseArgs {
    /// Guest id
    #[arg(long)]
    pub assigner: String,
    /// Template id
    #[arg(long)]
    pub template: String,
}

/// Selected device display row
#[derive(Debug, Tabled)]
struct SelectedRow {
    /// Path
    path: u32,
    /// Device
    fcp_id: String,
    /// PCHID
    pchid: String,
    /// NPIV WWPN
    wwpn_npiv: String,
    /// Physical WWPN
    wwpn_phy: String,
}

impl From<&SelectedDevice> for SelectedRow {
    fn from(d: &SelectedDevice) -> Self {
        Self {
            path: d.path,
            fcp_id: d.fcp_id.to_string(),
            pchid: d.pchid.clone(),
            wwpn_npiv: d.wwpn_npiv.clone(),
            wwpn_phy: d.wwpn_phy.clone(),
        }
    }
}

/// Execute `select`
pub async fn select(
    args: &SelectArgs,
    manager: &FcpManager,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let capacity = super::load_capacity(args.capacity.as_deref(), manager, config).await?;
    let selection = manager
        .allocation
        .select_devices(&args.template, &capacity, args.policy)
        .await?;

    match format {
        OutputFormat::Json => output::print_json(&selection)?,
        OutputFormat::Table => {
            print_devices(&selection.devices)?;
            if let Some(reason) = &selection.reason {
                output::print_warning(reason);
            }
        }
    }
    Ok(())
}

/// Execute `allocate`
pub async fn allocate(
    args: &AllocateArgs,
    manager: &FcpManager,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let capacity = super::load_capacity(args.capacity.as_deref(), manager, config).await?;
    let req = AllocateRequest {
        assigner_id: args.assigner.clone(),
        template_id: args.template.clone(),
        sp_name: args.sp.clone(),
        capacity,
        policy: args.policy,
    };
    let outcome = manager.allocation.allocate(&req).await?;

    match format {
        OutputFormat::Json => output::print_json(&outcome)?,
        OutputFormat::Table => {
            output::print_kv("Template", &outcome.template_id);
            output::print_kv("Path count", &outcome.path_count.to_string());
            output::print_kv("Newly reserved", &outcome.is_reserved_changed.to_string());
            print_devices(&outcome.devices)?;
            if let Some(reason) = &outcome.reason {
                output::print_warning(reason);
            }
        }
    }
    Ok(())
}

/// Execute `release`
pub async fn release(
    args: &ReleaseArgs,
    manager: &FcpManager,
    format: OutputFormat,
) -> Result<(), AppError> {
    let released = manager
        .allocation
        .release(&args.assigner, &args.template)
        .await?;

    match format {
        OutputFormat::Json => output::print_json(&released)?,
        OutputFormat::Table if released.is_empty() => {
            output::print_warning(&format!("{} holds no idle reserved devices", args.assigner));
        }
        OutputFormat::Table => output::print_success(&format!(
            "Released FCP devices {} of {}",
            shrink_fcp_list(&released),
            args.assigner
        )),
    }
    Ok(())
}

fn print_devices(devices: &[SelectedDevice]) -> Result<(), AppError> {
    let rows: Vec<SelectedRow> = devices.iter().map(SelectedRow::from).collect();
    output::print_list(&rows, devices, OutputFormat::Table)
}
