//! FCP multipath template commands.

use clap::{Args, Subcommand};
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use fcpmgr_core::error::AppError;
use fcpmgr_core::types::{FcpId, shrink_fcp_list};
use fcpmgr_entity::template::{TemplateDetail, TemplateFilter, TemplateInfo};
use fcpmgr_service::FcpManager;
use fcpmgr_service::template::{CreateTemplateRequest, DeviceList, EditTemplateRequest};

/// Arguments for template commands
#[derive(Debug, Args)]
pub struct TemplateArgs {
    /// Template subcommand
    #[command(subcommand)]
    pub command: TemplateCommand,
}

/// Template subcommands
#[derive(Debug, Subcommand)]
pub enum TemplateCommand {
    /// List templates
    List {
        /// Only these template ids
        #[arg(long = "id")]
        ids: Vec<String>,
        /// Templates a guest's devices were allocated from
        #[arg(long, conflicts_with_all = ["ids", "sp", "host_default"])]
        assigner: Option<String>,
        /// Templates bound to storage providers ("all" for every binding)
        #[arg(long, conflicts_with_all = ["ids", "host_default"])]
        sp: Vec<String>,
        /// Templates by host default flag
        #[arg(long, conflicts_with = "ids")]
        host_default: Option<bool>,
    },
    /// Show templates with per-path device statistics
    Show {
        /// Template ids, all when omitted
        ids: Vec<String>,
        /// Include raw device rows
        #[arg(long)]
        raw: bool,
    },
    /// Create a template
    Create {
        /// Template id, generated when omitted
        #[arg(long)]
        id: Option<String>,
        /// Display name
        #[arg(long)]
        name: String,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
        /// Devices per path, e.g. "1A00-1A03;1B00-1B03"
        #[arg(long, default_value = "")]
        devices: String,
        /// Make this the host default template
        #[arg(long)]
        host_default: bool,
        /// Storage providers defaulting to this template
        #[arg(long = "sp")]
        sp_list: Vec<String>,
        /// Minimum usable paths, -1 for all paths
        #[arg(long, allow_negative_numbers = true)]
        min_paths: Option<i64>,
    },
    /// Edit a template; omitted options are left unchanged
    Edit {
        /// Template id
        id: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Devices per path, e.g. "1A00-1A03;1B00-1B03"
        #[arg(long)]
        devices: Option<String>,
        /// Host default flag
        #[arg(long)]
        host_default: Option<bool>,
        /// Replace the storage provider bindings
        #[arg(long = "sp")]
        sp_list: Option<Vec<String>>,
        /// Unbind every storage provider
        #[arg(long, conflicts_with = "sp_list")]
        clear_sp: bool,
        /// Minimum usable paths, -1 for all paths
        #[arg(long, allow_negative_numbers = true)]
        min_paths: Option<i64>,
    },
    /// Delete a template
    Delete {
        /// Template id
        id: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// Drop devices from a template, keeping those in use
    RemoveUnused {
        /// Template id
        id: String,
        /// Devices, e.g. "1A00-1A03,1B05"
        devices: String,
    },
    /// Show the host default template
    Default,
}

/// Template display row
#[derive(Debug, Tabled)]
struct TemplateRow {
    /// Id
    id: String,
    /// Name
    name: String,
    /// Host default
    host_default: bool,
    /// Paths
    paths: usize,
    /// Min paths
    min_paths: usize,
    /// Storage providers
    storage_providers: String,
    /// Description
    description: String,
}

impl From<&TemplateInfo> for TemplateRow {
    fn from(t: &TemplateInfo) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            host_default: t.host_default,
            paths: t.path_count,
            min_paths: t.min_fcp_paths_count,
            storage_providers: t.storage_providers.join(", "),
            description: t.description.clone(),
        }
    }
}

/// Per-path statistics row
#[derive(Debug, Tabled)]
struct PathRow {
    /// Path
    path: u32,
    /// Total
    total: String,
    /// Available
    available: String,
    /// Allocated
    allocated: String,
    /// Reserve only
    reserve_only: String,
    /// Connection only
    connection_only: String,
    /// Allocated but free
    allocated_but_free: String,
    /// Not found
    notfound: String,
    /// Offline
    offline: String,
}

/// Raw device row
#[derive(Debug, Tabled)]
struct RawRow {
    /// Path
    path: i64,
    /// Device
    fcp_id: String,
    /// Guest
    assigner: String,
    /// Reserved
    reserved: String,
    /// Connections
    connections: String,
    /// PCHID
    pchid: String,
    /// State
    state: String,
    /// Allocated from
    template: String,
}

/// Execute template commands
pub async fn execute(
    args: &TemplateArgs,
    manager: &FcpManager,
    format: OutputFormat,
) -> Result<(), AppError> {
    let templates = &manager.templates;

    match &args.command {
        TemplateCommand::List {
            ids,
            assigner,
            sp,
            host_default,
        } => {
            let filter = if !ids.is_empty() {
                TemplateFilter::Ids(ids.clone())
            } else if let Some(assigner) = assigner {
                TemplateFilter::Assigner(assigner.clone())
            } else if !sp.is_empty() {
                TemplateFilter::StorageProviders(sp.clone())
            } else if let Some(flag) = host_default {
                TemplateFilter::HostDefault(*flag)
            } else {
                TemplateFilter::All
            };
            let list = templates.list(&filter).await?;
            let rows: Vec<TemplateRow> = list.iter().map(TemplateRow::from).collect();
            output::print_list(&rows, &list, format)?;
        }
        TemplateCommand::Show { ids, raw } => {
            let ids = (!ids.is_empty()).then_some(ids.as_slice());
            let details = templates.details(ids).await?;
            match format {
                OutputFormat::Json => output::print_json(&details)?,
                OutputFormat::Table => {
                    for detail in &details {
                        print_detail(detail, *raw)?;
                    }
                    if details.is_empty() {
                        println!("No results found.");
                    }
                }
            }
        }
        TemplateCommand::Create {
            id,
            name,
            description,
            devices,
            host_default,
            sp_list,
            min_paths,
        } => {
            let req = CreateTemplateRequest {
                id: id.clone(),
                name: name.clone(),
                description: description.clone(),
                devices: DeviceList::Text(devices.clone()),
                host_default: *host_default,
                default_sp_list: sp_list.clone(),
                min_fcp_paths_count: *min_paths,
            };
            let info = templates.create(req).await?;
            print_info(&info, format)?;
        }
        TemplateCommand::Edit {
            id,
            name,
            description,
            devices,
            host_default,
            sp_list,
            clear_sp,
            min_paths,
        } => {
            let default_sp_list = if *clear_sp {
                Some(Vec::new())
            } else {
                sp_list.clone()
            };
            let req = EditTemplateRequest {
                name: name.clone(),
                description: description.clone(),
                devices: devices.clone().map(DeviceList::Text),
                host_default: *host_default,
                default_sp_list,
                min_fcp_paths_count: *min_paths,
            };
            let outcome = templates.edit(id, req).await?;
            match format {
                OutputFormat::Json => output::print_json(&outcome)?,
                OutputFormat::Table => {
                    print_info(&outcome.template, format)?;
                    let pchids = &outcome.pchids;
                    output::print_kv("PCHIDs", &pchids.all.join(", "));
                    output::print_kv("PCHIDs added", &pchids.add.all.join(", "));
                    output::print_kv(
                        "PCHIDs first used",
                        &pchids.add.first_used_by_templates.join(", "),
                    );
                    output::print_kv("PCHIDs removed", &pchids.delete.all.join(", "));
                    output::print_kv(
                        "PCHIDs no longer used",
                        &pchids.delete.not_exist_in_any_template.join(", "),
                    );
                }
            }
        }
        TemplateCommand::Delete { id, force } => {
            let prompt = format!("Delete FCP multipath template {id}?");
            if output::confirm(&prompt, *force)? {
                templates.delete(id).await?;
                output::print_success(&format!("FCP multipath template {id} deleted"));
            }
        }
        TemplateCommand::RemoveUnused { id, devices } => {
            let ids = super::parse_ids(devices)?;
            let removed: Vec<FcpId> = templates.remove_unused_devices(id, &ids).await?;
            if removed.len() < ids.len() {
                output::print_warning("Devices in use were kept in the template");
            }
            output::print_success(&format!(
                "Removed FCP devices [{}] from template {id}",
                shrink_fcp_list(&removed)
            ));
        }
        TemplateCommand::Default => match templates.host_default().await? {
            Some(info) => print_info(&info, format)?,
            None => output::print_warning("No host default template is set"),
        },
    }

    Ok(())
}

fn print_info(info: &TemplateInfo, format: OutputFormat) -> Result<(), AppError> {
    let pairs = [
        ("Id", info.id.clone()),
        ("Name", info.name.clone()),
        ("Description", info.description.clone()),
        ("Host default", info.host_default.to_string()),
        ("Storage providers", info.storage_providers.join(", ")),
        ("Path count", info.path_count.to_string()),
        ("Min paths", info.min_fcp_paths_count.to_string()),
    ];
    output::print_item(&pairs, info, format)
}

fn print_detail(detail: &TemplateDetail, raw: bool) -> Result<(), AppError> {
    println!();
    print_info(&detail.info, OutputFormat::Table)?;

    let rows: Vec<PathRow> = detail
        .statistics
        .iter()
        .map(|(path, s)| PathRow {
            path: *path,
            total: s.total.clone(),
            available: s.available.clone(),
            allocated: s.allocated.clone(),
            reserve_only: s.reserve_only.clone(),
            connection_only: s.connection_only.clone(),
            allocated_but_free: s.allocated_but_free.clone(),
            notfound: s.notfound.clone(),
            offline: s.offline.clone(),
        })
        .collect();
    output::print_list(&rows, &detail.statistics, OutputFormat::Table)?;

    for (path, stats) in &detail.statistics {
        for (fcp_id, owner) in &stats.unallocated_but_active {
            output::print_warning(&format!(
                "Path {path}: FCP device {fcp_id} is active on the hypervisor (owner {owner}) \
                 without local usage"
            ));
        }
    }

    if raw {
        let rows: Vec<RawRow> = detail
            .raw
            .values()
            .flatten()
            .map(|r| RawRow {
                path: r.path,
                fcp_id: r.fcp_id.to_string(),
                assigner: r.assigner_id.clone().unwrap_or_default(),
                reserved: r.reserved.map(|v| v.to_string()).unwrap_or_default(),
                connections: r.connections.map(|v| v.to_string()).unwrap_or_default(),
                pchid: r.pchid.clone().unwrap_or_default(),
                state: r.state.clone().unwrap_or_else(|| "notfound".to_string()),
                template: r.allocated_tmpl_id.clone().unwrap_or_default(),
            })
            .collect();
        output::print_list(&rows, &detail.raw, OutputFormat::Table)?;
    }
    Ok(())
}
