//! PCHID usage commands.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use fcpmgr_core::error::AppError;
use fcpmgr_service::FcpManager;

/// Arguments for `pchids`
#[derive(Debug, Args)]
pub struct PchidArgs {
    /// Only PCHIDs of this template
    #[arg(long)]
    pub template: Option<String>,
}

/// PCHID display row
#[derive(Debug, Serialize, Tabled)]
struct PchidRow {
    /// PCHID
    pchid: String,
    /// Allocated devices
    in_use: String,
    /// Physical WWPNs
    wwpn_phy: String,
}

/// Execute `pchids`
pub async fn execute(
    args: &PchidArgs,
    manager: &FcpManager,
    format: OutputFormat,
) -> Result<(), AppError> {
    let pchids = match &args.template {
        Some(id) => manager.templates.pchids_of_template(id).await?,
        None => manager.templates.pchids_of_all_templates().await?,
    };
    let in_use = manager.devices.inuse_pchids().await?;
    let wwpns = manager.devices.wwpn_phy_of_pchids(&pchids).await?;

    let rows: Vec<PchidRow> = pchids
        .into_iter()
        .map(|pchid| PchidRow {
            in_use: in_use.get(&pchid).cloned().unwrap_or_default(),
            wwpn_phy: wwpns.get(&pchid).map(|w| w.join(", ")).unwrap_or_default(),
            pchid,
        })
        .collect();
    output::print_list(&rows, &rows, format)
}
