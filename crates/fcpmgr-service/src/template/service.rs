//! Template create, edit and delete, validated against live allocations.

use std::collections::{BTreeMap, BTreeSet};

use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use fcpmgr_core::error::AppError;
use fcpmgr_core::result::AppResult;
use fcpmgr_core::types::{DevicesByPath, FcpId, shrink_fcp_list};
use fcpmgr_database::FcpDatabase;
use fcpmgr_database::repositories::{
    TemplateFcpRepository, TemplateRepository, TemplateSpRepository,
};
use fcpmgr_entity::template::{
    PchidDiff, PchidsAdded, PchidsDeleted, Template, TemplateEditOutcome, TemplateInfo,
    UNSET_MIN_PATHS,
};

use super::request::{CreateTemplateRequest, EditTemplateRequest};

/// Manages multipath templates and their device/provider mappings.
#[derive(Debug, Clone)]
pub struct TemplateService {
    /// Store handle.
    db: FcpDatabase,
}

impl TemplateService {
    /// Creates a new template service.
    pub fn new(db: FcpDatabase) -> Self {
        Self { db }
    }

    pub(crate) fn db(&self) -> &FcpDatabase {
        &self.db
    }

    /// Creates a template with its device and provider mappings.
    pub async fn create(&self, req: CreateTemplateRequest) -> AppResult<TemplateInfo> {
        req.validate()?;
        let devices = req.devices.resolve()?;
        let id = req
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let min_fcp_paths_count = checked_min_paths(&id, req.min_fcp_paths_count, devices.len())?;

        let template = Template {
            id: id.clone(),
            name: req.name,
            description: req.description,
            is_default: req.host_default,
            min_fcp_paths_count,
        };

        let mut tx = self.db.begin().await?;
        let conn = tx.conn();

        if TemplateRepository::exists(conn, &id).await? {
            return Err(AppError::already_exists(format!(
                "FCP multipath template {id} already exists"
            )));
        }
        if template.is_default {
            TemplateRepository::clear_default_except(conn, &id).await?;
        }
        TemplateRepository::insert(conn, &template).await?;
        TemplateFcpRepository::insert_many(conn, &id, &flatten(&devices)).await?;
        TemplateSpRepository::bind(conn, &id, &req.default_sp_list).await?;

        let info = Self::info_in(conn, template).await?;
        tx.commit().await?;

        info!(
            template_id = %info.id,
            name = %info.name,
            path_count = info.path_count,
            host_default = info.host_default,
            "FCP multipath template created"
        );
        Ok(info)
    }

    /// Edits a template. Structural changes are refused while they would
    /// strand devices allocated from it.
    pub async fn edit(&self, id: &str, req: EditTemplateRequest) -> AppResult<TemplateEditOutcome> {
        req.validate()?;
        let new_devices = req.devices.as_ref().map(|d| d.resolve()).transpose()?;

        let mut tx = self.db.begin().await?;
        let conn = tx.conn();

        let mut template = Self::find_in(conn, id).await?;
        let id = template.id.clone();

        let pchids_before = TemplateFcpRepository::pchids(conn, Some(&id)).await?;
        let pchids_before_all = TemplateFcpRepository::pchids(conn, None).await?;
        let stored_path_count = TemplateFcpRepository::path_count(conn, &id).await?;

        let path_count = match &new_devices {
            Some(devices) => {
                Self::apply_devices(conn, &id, stored_path_count, devices).await?;
                devices.len()
            }
            None => stored_path_count,
        };

        // The stored minimum is only rechecked when paths or the minimum change.
        if req.min_fcp_paths_count.is_some() || new_devices.is_some() {
            let requested_min = req.min_fcp_paths_count.unwrap_or(template.min_fcp_paths_count);
            template.min_fcp_paths_count = checked_min_paths(&id, Some(requested_min), path_count)?;
        }
        if let Some(name) = req.name {
            template.name = name;
        }
        if let Some(description) = req.description {
            template.description = description;
        }
        if let Some(host_default) = req.host_default {
            if host_default {
                TemplateRepository::clear_default_except(conn, &id).await?;
            }
            template.is_default = host_default;
        }
        TemplateRepository::update(conn, &template).await?;

        if let Some(sp_list) = &req.default_sp_list {
            TemplateSpRepository::unbind_template(conn, &id).await?;
            TemplateSpRepository::bind(conn, &id, sp_list).await?;
        }

        let pchids_after = TemplateFcpRepository::pchids(conn, Some(&id)).await?;
        let pchids_after_all = TemplateFcpRepository::pchids(conn, None).await?;
        let pchids = pchid_diff(
            &pchids_before,
            &pchids_after,
            &pchids_before_all,
            &pchids_after_all,
        );

        let template = Self::info_in(conn, template).await?;
        tx.commit().await?;

        info!(
            template_id = %template.id,
            path_count = template.path_count,
            pchids_added = ?pchids.add.all,
            pchids_deleted = ?pchids.delete.all,
            "FCP multipath template edited"
        );
        Ok(TemplateEditOutcome { template, pchids })
    }

    /// Deletes a template that no device is allocated from.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let conn = tx.conn();

        if !TemplateRepository::exists(conn, id).await? {
            return Err(AppError::not_found(format!(
                "FCP multipath template {id} does not exist"
            )));
        }
        let allocated = TemplateFcpRepository::allocated_from(conn, id).await?;
        if !allocated.is_empty() {
            return Err(AppError::conflict(format!(
                "Cannot delete FCP multipath template {id}: FCP devices {} are allocated from it",
                shrink_fcp_list(&allocated)
            )));
        }

        TemplateFcpRepository::delete_by_template(conn, id).await?;
        TemplateSpRepository::unbind_template(conn, id).await?;
        TemplateRepository::delete(conn, id).await?;
        tx.commit().await?;

        info!(template_id = %id, "FCP multipath template deleted");
        Ok(())
    }

    /// Replaces the device mappings of a template after checking that no
    /// allocated device is stranded.
    async fn apply_devices(
        conn: &mut SqliteConnection,
        id: &str,
        stored_path_count: usize,
        devices: &DevicesByPath,
    ) -> AppResult<()> {
        if devices.len() != stored_path_count {
            let allocated = TemplateFcpRepository::allocated_from(conn, id).await?;
            if !allocated.is_empty() {
                return Err(AppError::conflict(format!(
                    "Cannot change the path count of FCP multipath template {id} from \
                     {stored_path_count} to {}: FCP devices {} are allocated from it",
                    devices.len(),
                    shrink_fcp_list(&allocated)
                )));
            }
        }

        let current: BTreeMap<FcpId, u32> = TemplateFcpRepository::mappings_of(conn, id)
            .await?
            .into_iter()
            .map(|m| (m.fcp_id, u32::try_from(m.path).unwrap_or_default()))
            .collect();
        let wanted: BTreeMap<FcpId, u32> = flatten(devices).into_iter().collect();

        let dropped: Vec<FcpId> = current
            .keys()
            .filter(|fcp_id| !wanted.contains_key(*fcp_id))
            .cloned()
            .collect();
        let in_use = TemplateFcpRepository::inuse_allocated_from(conn, id, &dropped).await?;
        if !in_use.is_empty() {
            return Err(AppError::conflict(format!(
                "Cannot remove FCP devices {} from FCP multipath template {id}: they are in use \
                 and allocated from this template",
                shrink_fcp_list(&in_use)
            )));
        }

        let added: Vec<(FcpId, u32)> = wanted
            .iter()
            .filter(|(fcp_id, _)| !current.contains_key(*fcp_id))
            .map(|(fcp_id, path)| (fcp_id.clone(), *path))
            .collect();
        let moved: Vec<(FcpId, u32)> = wanted
            .iter()
            .filter(|(fcp_id, path)| current.get(*fcp_id).is_some_and(|old| old != *path))
            .map(|(fcp_id, path)| (fcp_id.clone(), *path))
            .collect();

        TemplateFcpRepository::delete_many(conn, id, &dropped).await?;
        TemplateFcpRepository::insert_many(conn, id, &added).await?;
        TemplateFcpRepository::update_paths(conn, id, &moved).await?;
        Ok(())
    }

    /// Basic info of a template row read inside an open transaction.
    pub(crate) async fn info_in(
        conn: &mut SqliteConnection,
        template: Template,
    ) -> AppResult<TemplateInfo> {
        let storage_providers = TemplateSpRepository::sp_names_of(conn, &template.id).await?;
        let path_count = TemplateFcpRepository::path_count(conn, &template.id).await?;
        Ok(TemplateInfo::new(template, storage_providers, path_count))
    }
}

/// Validate a requested minimum path count against the path count and
/// return the value to store.
fn checked_min_paths(id: &str, requested: Option<i64>, path_count: usize) -> AppResult<i64> {
    match requested {
        None | Some(UNSET_MIN_PATHS) => Ok(UNSET_MIN_PATHS),
        Some(min) if min < 1 => Err(AppError::invalid_input(format!(
            "min_fcp_paths_count of FCP multipath template {id} must be -1 or at least 1, got {min}"
        ))),
        Some(min) if min as u64 > path_count as u64 => Err(AppError::conflict(format!(
            "min_fcp_paths_count {min} of FCP multipath template {id} is larger than its path \
             count {path_count}"
        ))),
        Some(min) => Ok(min),
    }
}

fn flatten(devices: &DevicesByPath) -> Vec<(FcpId, u32)> {
    devices
        .iter()
        .flat_map(|(path, ids)| ids.iter().map(move |id| (id.clone(), *path)))
        .collect()
}

/// PCHID changes of one template, judged against every template before and
/// after the edit.
pub(crate) fn pchid_diff(
    before: &[String],
    after: &[String],
    before_all: &[String],
    after_all: &[String],
) -> PchidDiff {
    let before: BTreeSet<&String> = before.iter().collect();
    let after: BTreeSet<&String> = after.iter().collect();
    let before_all: BTreeSet<&String> = before_all.iter().collect();
    let after_all: BTreeSet<&String> = after_all.iter().collect();

    let added: Vec<String> = after.difference(&before).map(|p| (*p).clone()).collect();
    let deleted: Vec<String> = before.difference(&after).map(|p| (*p).clone()).collect();

    PchidDiff {
        add: PchidsAdded {
            first_used_by_templates: added
                .iter()
                .filter(|p| !before_all.contains(p))
                .cloned()
                .collect(),
            all: added,
        },
        delete: PchidsDeleted {
            not_exist_in_any_template: deleted
                .iter()
                .filter(|p| !after_all.contains(p))
                .cloned()
                .collect(),
            all: deleted,
        },
        all: after.into_iter().cloned().collect(),
    }
}
