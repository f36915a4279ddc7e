//! Bulk synchronization of hypervisor-reported device facts.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use fcpmgr_core::result::AppResult;
use fcpmgr_database::StoreTx;
use fcpmgr_database::repositories::FcpRepository;
use fcpmgr_entity::fcp::{DeviceFacts, SyncBatch};

use super::service::DeviceService;

/// Row counts applied by one synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Devices inserted.
    pub inserted: usize,
    /// Devices refreshed.
    pub updated: usize,
    /// Devices deleted.
    pub deleted: u64,
    /// Devices whose state changed.
    pub state_changed: u64,
}

impl DeviceService {
    /// Applies one reconciliation batch in a single transaction.
    pub async fn sync_from_hypervisor(&self, batch: &SyncBatch) -> AppResult<SyncSummary> {
        if batch.is_empty() {
            return Ok(SyncSummary::default());
        }

        let tx = self.db().begin().await?;
        let summary = commit_batch(tx, batch).await?;

        log_summary(&summary);
        Ok(summary)
    }

    /// Upserts device facts: unknown devices are inserted, known ones
    /// refreshed.
    pub async fn import_devices(&self, facts: Vec<DeviceFacts>) -> AppResult<SyncSummary> {
        let ids: Vec<_> = facts.iter().map(|f| f.fcp_id.clone()).collect();

        let mut tx = self.db().begin().await?;
        let existing = FcpRepository::find_existing_ids(tx.conn(), &ids).await?;
        let (update, insert): (Vec<_>, Vec<_>) = facts
            .into_iter()
            .partition(|f| existing.contains(&f.fcp_id));
        let batch = SyncBatch {
            insert,
            update,
            ..SyncBatch::default()
        };
        let summary = commit_batch(tx, &batch).await?;

        log_summary(&summary);
        Ok(summary)
    }
}

/// Applies a batch and commits, or rolls the whole batch back.
async fn commit_batch(mut tx: StoreTx, batch: &SyncBatch) -> AppResult<SyncSummary> {
    match apply_batch(tx.conn(), batch).await {
        Ok(summary) => {
            tx.commit().await?;
            Ok(summary)
        }
        Err(e) => {
            warn!(error = %e, "FCP device synchronization rolled back");
            tx.rollback().await?;
            Err(e)
        }
    }
}

async fn apply_batch(conn: &mut SqliteConnection, batch: &SyncBatch) -> AppResult<SyncSummary> {
    FcpRepository::insert_facts(conn, &batch.insert).await?;
    FcpRepository::update_facts(conn, &batch.update).await?;
    let deleted = FcpRepository::delete(conn, &batch.delete).await?;

    let mut state_changed = 0;
    for change in &batch.state_changes {
        state_changed += FcpRepository::update_state(conn, &change.ids, &change.state).await?;
    }

    Ok(SyncSummary {
        inserted: batch.insert.len(),
        updated: batch.update.len(),
        deleted,
        state_changed,
    })
}

fn log_summary(summary: &SyncSummary) {
    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        deleted = summary.deleted,
        state_changed = summary.state_changed,
        "FCP devices synchronized"
    );
}
