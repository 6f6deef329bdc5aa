//! Batch-orchestrated sync pass
//!
//! References are processed in fixed-size batches: items within a batch fan
//! out concurrently, batches run strictly one after another. That caps peak
//! concurrency at one batch width instead of the whole mailbox. A failure
//! on one item is caught, logged, and counted; it never aborts the batch or
//! the pass.

use rayon::prelude::*;
use std::time::Instant;

use super::reconcile::reconcile;
use crate::error::SyncError;
use crate::gmail::api::MessageRef;
use crate::gmail::{
    GmailClient, ItemOutcome, MailboxApi, SessionManager, list_all_references, sync_message,
};
use crate::models::UserId;
use crate::storage::{EmailStore, UserStore};

/// Number of references processed per batch. Independent of the provider's
/// listing page size.
pub const BATCH_SIZE: usize = 10;

/// Running counters for the ingestion phase of a pass
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncStats {
    /// New records created
    pub synced: usize,
    /// References whose record already existed
    pub skipped: usize,
    /// Per-item failures (fetch, parse, or persistence)
    pub errors: usize,
}

/// Summary of a completed sync pass.
///
/// Counts only; which specific items errored is visible in the logs, not
/// here.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub synced: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Records deleted by reconciliation
    pub deleted: usize,
    /// Size of the enumerated remote set
    pub total_in_remote: usize,
    /// Local record count after the pass
    pub total_in_local: usize,
    pub duration_ms: u64,
}

/// Ingest the given references in sequential batches with bounded fan-out.
///
/// Each item resolves to a result-or-error slot before the counters are
/// folded, so failures stay visible at the logging seam without aborting
/// anything.
pub fn run_batches(
    api: &dyn MailboxApi,
    store: &dyn EmailStore,
    user_id: UserId,
    references: &[MessageRef],
) -> SyncStats {
    let mut stats = SyncStats::default();

    for batch in references.chunks(BATCH_SIZE) {
        let results: Vec<_> = batch
            .par_iter()
            .map(|reference| sync_message(api, store, user_id, reference))
            .collect();

        for (reference, result) in batch.iter().zip(results) {
            match result {
                Ok(ItemOutcome::Created) => stats.synced += 1,
                Ok(ItemOutcome::AlreadyExists) => stats.skipped += 1,
                Err(e) => {
                    log::warn!("failed to sync message {}: {}", reference.id, e);
                    stats.errors += 1;
                }
            }
        }

        log::debug!(
            "batch settled: {} synced, {} skipped, {} errors",
            stats.synced,
            stats.skipped,
            stats.errors
        );
    }

    stats
}

/// Run a full sync pass against an already-acquired provider handle:
/// enumerate, ingest in batches, reconcile deletions.
///
/// Enumeration failure aborts before any reconciliation; records created
/// by earlier batches of a failed pass remain and make the retry cheaper.
pub fn run_sync(
    api: &dyn MailboxApi,
    store: &dyn EmailStore,
    user_id: UserId,
) -> Result<SyncReport, SyncError> {
    let start = Instant::now();

    let references = list_all_references(api)?;
    log::info!(
        "user {}: starting sync of {} remote messages",
        user_id,
        references.len()
    );

    let stats = run_batches(api, store, user_id, &references);
    let outcome = reconcile(store, user_id, &references)?;
    let total_in_local = store.count_for_user(user_id)?;

    let report = SyncReport {
        synced: stats.synced,
        skipped: stats.skipped,
        errors: stats.errors,
        deleted: outcome.deleted,
        total_in_remote: references.len(),
        total_in_local,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    log::info!(
        "user {}: sync completed: {} new, {} skipped, {} deleted, {} errors",
        user_id,
        report.synced,
        report.skipped,
        report.deleted,
        report.errors
    );

    Ok(report)
}

/// Acquire a session for the user and run a full sync pass.
pub fn sync_mailbox(
    manager: &SessionManager,
    users: &dyn UserStore,
    emails: &dyn EmailStore,
    user_id: UserId,
) -> Result<SyncReport, SyncError> {
    let session = manager.acquire(users, user_id)?;
    let client = GmailClient::new(session);
    run_sync(&client, emails, user_id)
}
