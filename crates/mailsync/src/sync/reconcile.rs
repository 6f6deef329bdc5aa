//! Deletion reconciliation
//!
//! After ingestion, local records whose remote counterpart vanished are
//! removed so the mirror converges on exactly the enumerated set.

use std::collections::HashSet;

use crate::error::StoreError;
use crate::gmail::api::MessageRef;
use crate::models::UserId;
use crate::storage::EmailStore;

/// Result of a reconciliation step
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileOutcome {
    /// Number of local records deleted
    pub deleted: usize,
}

/// Delete a user's local records that are no longer present remotely.
///
/// `references` must come from a *complete* enumeration of the current
/// pass; running this after a partial listing would delete records for
/// messages that still exist remotely. The pass driver guarantees that
/// ordering by aborting before this point on any enumeration failure.
///
/// The bulk delete always carries the ownership filter: a stale id set can
/// never reach into another user's records.
pub fn reconcile(
    store: &dyn EmailStore,
    user_id: UserId,
    references: &[MessageRef],
) -> Result<ReconcileOutcome, StoreError> {
    let remote_ids: HashSet<&str> = references.iter().map(|r| r.id.as_str()).collect();

    let local = store.id_pairs_for_user(user_id)?;
    let stale: Vec<i64> = local
        .iter()
        // Rows without a Gmail id are never deletion candidates
        .filter(|pair| !pair.gmail_id.is_empty() && !remote_ids.contains(pair.gmail_id.as_str()))
        .map(|pair| pair.local_id)
        .collect();

    if stale.is_empty() {
        log::debug!("user {}: local store already in sync", user_id);
        return Ok(ReconcileOutcome::default());
    }

    log::info!(
        "user {}: deleting {} local records no longer present remotely",
        user_id,
        stale.len()
    );
    let deleted = store.delete_by_local_ids(user_id, &stale)?;

    Ok(ReconcileOutcome { deleted })
}
