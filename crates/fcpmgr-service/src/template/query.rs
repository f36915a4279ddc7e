//! Read-side template operations.

use std::collections::{BTreeMap, BTreeSet};

use sqlx::SqliteConnection;
use tracing::info;

use fcpmgr_core::error::AppError;
use fcpmgr_core::result::AppResult;
use fcpmgr_core::types::{FcpId, shrink_fcp_list};
use fcpmgr_database::repositories::{TemplateFcpRepository, TemplateRepository};
use fcpmgr_entity::template::{Template, TemplateDetail, TemplateFilter, TemplateInfo};

use super::service::TemplateService;
use super::statistics::path_statistics;

impl TemplateService {
    /// Templates matching a filter, ordered by id.
    pub async fn list(&self, filter: &TemplateFilter) -> AppResult<Vec<TemplateInfo>> {
        let mut tx = self.db().begin().await?;
        let conn = tx.conn();

        let templates = match filter {
            TemplateFilter::All => TemplateRepository::find_all(conn).await?,
            TemplateFilter::Ids(ids) => Self::find_all_of(conn, ids).await?,
            TemplateFilter::Assigner(assigner_id) => {
                TemplateRepository::find_by_assigner(conn, assigner_id).await?
            }
            TemplateFilter::StorageProviders(sp_names) => {
                let every = sp_names.iter().any(|sp| sp.eq_ignore_ascii_case("all"));
                let sp_names: &[String] = if every { &[] } else { sp_names };
                TemplateRepository::find_by_sp_names(conn, sp_names).await?
            }
            TemplateFilter::HostDefault(is_default) => {
                TemplateRepository::find_by_default(conn, *is_default).await?
            }
        };

        let mut infos = Vec::with_capacity(templates.len());
        for template in templates {
            infos.push(Self::info_in(conn, template).await?);
        }
        tx.commit().await?;
        Ok(infos)
    }

    /// One template by id.
    pub async fn get(&self, id: &str) -> AppResult<TemplateInfo> {
        let mut tx = self.db().begin().await?;
        let conn = tx.conn();
        let template = Self::find_in(conn, id).await?;
        let info = Self::info_in(conn, template).await?;
        tx.commit().await?;
        Ok(info)
    }

    /// The host default template, if one is set.
    pub async fn host_default(&self) -> AppResult<Option<TemplateInfo>> {
        Ok(self
            .list(&TemplateFilter::HostDefault(true))
            .await?
            .into_iter()
            .next())
    }

    /// Templates with their device rows and per-path statistics. `None`
    /// means every template.
    pub async fn details(&self, ids: Option<&[String]>) -> AppResult<Vec<TemplateDetail>> {
        let mut tx = self.db().begin().await?;
        let conn = tx.conn();

        let templates = match ids {
            Some(ids) => Self::find_all_of(conn, ids).await?,
            None => TemplateRepository::find_all(conn).await?,
        };
        let template_ids: Vec<String> = templates.iter().map(|t| t.id.clone()).collect();
        let mut rows_by_template: BTreeMap<String, BTreeMap<u32, Vec<_>>> = BTreeMap::new();
        if !template_ids.is_empty() {
            for row in TemplateFcpRepository::device_rows(conn, &template_ids).await? {
                let path = u32::try_from(row.path).unwrap_or_default();
                rows_by_template
                    .entry(row.tmpl_id.clone())
                    .or_default()
                    .entry(path)
                    .or_default()
                    .push(row);
            }
        }

        let mut details = Vec::with_capacity(templates.len());
        for template in templates {
            let raw = rows_by_template.remove(&template.id).unwrap_or_default();
            let statistics = raw
                .iter()
                .map(|(path, rows)| (*path, path_statistics(rows)))
                .collect();
            details.push(TemplateDetail {
                info: Self::info_in(conn, template).await?,
                raw,
                statistics,
            });
        }
        tx.commit().await?;
        Ok(details)
    }

    /// Drop template mappings of the given devices, skipping devices in
    /// use. Returns the devices actually removed.
    pub async fn remove_unused_devices(&self, id: &str, ids: &[FcpId]) -> AppResult<Vec<FcpId>> {
        let mut tx = self.db().begin().await?;
        let conn = tx.conn();

        Self::find_in(conn, id).await?;
        let in_use: BTreeSet<FcpId> = TemplateFcpRepository::inuse_among(conn, ids)
            .await?
            .into_iter()
            .collect();
        let unused: Vec<FcpId> = ids
            .iter()
            .filter(|fcp_id| !in_use.contains(*fcp_id))
            .cloned()
            .collect();
        TemplateFcpRepository::delete_many(conn, id, &unused).await?;
        tx.commit().await?;

        info!(
            template_id = %id,
            removed = %shrink_fcp_list(&unused),
            skipped_in_use = %shrink_fcp_list(&in_use),
            "Unused FCP devices removed from template"
        );
        Ok(unused)
    }

    /// Minimum path count with `-1` resolved to the path count.
    pub async fn min_paths_count(&self, id: &str) -> AppResult<usize> {
        let mut tx = self.db().begin().await?;
        let conn = tx.conn();
        let template = Self::find_in(conn, id).await?;
        let path_count = TemplateFcpRepository::path_count(conn, id).await?;
        tx.commit().await?;
        Ok(template.resolved_min_paths(path_count))
    }

    /// Number of configured paths of a template.
    pub async fn path_count(&self, id: &str) -> AppResult<usize> {
        let mut tx = self.db().begin().await?;
        let conn = tx.conn();
        Self::find_in(conn, id).await?;
        let path_count = TemplateFcpRepository::path_count(conn, id).await?;
        tx.commit().await?;
        Ok(path_count)
    }

    /// PCHIDs of the devices mapped into a template.
    pub async fn pchids_of_template(&self, id: &str) -> AppResult<Vec<String>> {
        let mut tx = self.db().begin().await?;
        let conn = tx.conn();
        Self::find_in(conn, id).await?;
        let pchids = TemplateFcpRepository::pchids(conn, Some(id)).await?;
        tx.commit().await?;
        Ok(pchids)
    }

    /// PCHIDs used by any template.
    pub async fn pchids_of_all_templates(&self) -> AppResult<Vec<String>> {
        let mut tx = self.db().begin().await?;
        let pchids = TemplateFcpRepository::pchids(tx.conn(), None).await?;
        tx.commit().await?;
        Ok(pchids)
    }

    pub(crate) async fn find_in(conn: &mut SqliteConnection, id: &str) -> AppResult<Template> {
        TemplateRepository::find(conn, id).await?.ok_or_else(|| {
            AppError::not_found(format!("FCP multipath template {id} does not exist"))
        })
    }

    /// Every requested template, failing on the first unknown id.
    async fn find_all_of(conn: &mut SqliteConnection, ids: &[String]) -> AppResult<Vec<Template>> {
        let templates = TemplateRepository::find_by_ids(conn, ids).await?;
        let found: BTreeSet<String> = templates.iter().map(|t| t.id.to_lowercase()).collect();
        let missing: Vec<&str> = ids
            .iter()
            .filter(|id| !found.contains(&id.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::not_found(format!(
                "FCP multipath templates {} do not exist",
                missing.join(", ")
            )));
        }
        Ok(templates)
    }
}
