//! Action handler for mail mutations
//!
//! Remote-affecting actions run in two steps: update provider state first,
//! then the local mirror. The sync pass never updates records in place, so
//! these handlers are the only writers besides creation and reconciliation.

use std::sync::Arc;

use log::{info, warn};

use crate::error::StoreError;
use crate::gmail::MailboxApi;
use crate::models::{GmailId, UserId};
use crate::query::extract_email;
use crate::storage::EmailStore;

/// Gmail's batchDelete endpoint accepts up to 1000 ids per call
const REMOTE_DELETE_CHUNK: usize = 1000;

/// Outcome of a delete-by-sender action
#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteBySenderOutcome {
    /// Local records removed
    pub deleted: usize,
    /// Messages deleted at the provider
    pub remote_deleted: usize,
    /// Matching messages that had a Gmail id
    pub total_remote_ids: usize,
    /// Set when the provider rejected deletion for missing OAuth scope;
    /// the user must re-authenticate before retrying
    pub requires_reauth: bool,
}

/// Handler for mail actions
pub struct ActionHandler {
    api: Arc<dyn MailboxApi>,
    store: Arc<dyn EmailStore>,
}

impl ActionHandler {
    pub fn new(api: Arc<dyn MailboxApi>, store: Arc<dyn EmailStore>) -> Self {
        Self { api, store }
    }

    /// Mark one record as read. Returns whether a record was updated.
    pub fn mark_read(&self, user_id: UserId, local_id: i64) -> Result<bool, StoreError> {
        info!("marking email {} as read for user {}", local_id, user_id);
        self.store.set_read(user_id, local_id, true)
    }

    /// Mark one record as unread
    pub fn mark_unread(&self, user_id: UserId, local_id: i64) -> Result<bool, StoreError> {
        info!("marking email {} as unread for user {}", local_id, user_id);
        self.store.set_read(user_id, local_id, false)
    }

    /// Delete every message from one sender, remotely and locally.
    ///
    /// Remote deletion tolerates partial success: a failed batch falls back
    /// to deleting its messages one by one. A permission-denied rejection
    /// is different — it cannot succeed on retry, so it stops all further
    /// remote attempts and is surfaced via `requires_reauth`. Local rows
    /// are removed regardless, under the ownership filter.
    pub fn delete_by_sender(
        &self,
        user_id: UserId,
        sender: &str,
    ) -> Result<DeleteBySenderOutcome, StoreError> {
        let rows = self.store.sender_rows_for_user(user_id)?;
        let matching: Vec<_> = rows
            .into_iter()
            .filter(|row| extract_email(&row.from) == sender)
            .collect();

        if matching.is_empty() {
            return Ok(DeleteBySenderOutcome::default());
        }

        let gmail_ids: Vec<GmailId> = matching.iter().map(|row| row.gmail_id.clone()).collect();
        info!(
            "deleting {} messages from {} for user {}",
            gmail_ids.len(),
            sender,
            user_id
        );

        let mut remote_deleted = 0;
        let mut requires_reauth = false;

        'remote: for chunk in gmail_ids.chunks(REMOTE_DELETE_CHUNK) {
            match self.api.batch_delete(chunk) {
                Ok(()) => remote_deleted += chunk.len(),
                Err(e) if e.requires_reauth() => {
                    warn!("remote deletion rejected for missing scope: {}", e);
                    requires_reauth = true;
                    break 'remote;
                }
                Err(e) => {
                    warn!("batch delete failed ({}), retrying messages individually", e);
                    for id in chunk {
                        match self.api.delete_message(id) {
                            Ok(()) => remote_deleted += 1,
                            Err(e) if e.requires_reauth() => {
                                warn!("remote deletion rejected for missing scope: {}", e);
                                requires_reauth = true;
                                break 'remote;
                            }
                            Err(e) => warn!("failed to delete message {}: {}", id, e),
                        }
                    }
                }
            }
        }

        let local_ids: Vec<i64> = matching.iter().map(|row| row.local_id).collect();
        let deleted = self.store.delete_by_local_ids(user_id, &local_ids)?;

        info!(
            "deleted {} local records, {} remote messages from {}",
            deleted, remote_deleted, sender
        );
        Ok(DeleteBySenderOutcome {
            deleted,
            remote_deleted,
            total_remote_ids: gmail_ids.len(),
            requires_reauth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::gmail::api::{GmailMessage, ListMessagesResponse};
    use crate::models::EmailRecord;
    use crate::storage::InMemoryStore;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake provider that scripts deletion outcomes
    #[derive(Default)]
    struct FakeDeleter {
        batch_calls: AtomicUsize,
        single_calls: AtomicUsize,
        batch_error: Mutex<Option<FetchError>>,
        single_error: Mutex<Option<FetchError>>,
    }

    impl MailboxApi for FakeDeleter {
        fn list_messages(&self, _: Option<&str>) -> Result<ListMessagesResponse, FetchError> {
            unimplemented!("not used by actions")
        }

        fn get_message(&self, _: &GmailId) -> Result<GmailMessage, FetchError> {
            unimplemented!("not used by actions")
        }

        fn batch_delete(&self, _: &[GmailId]) -> Result<(), FetchError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            match self.batch_error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn delete_message(&self, _: &GmailId) -> Result<(), FetchError> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            match &*self.single_error.lock().unwrap() {
                Some(FetchError::PermissionDenied) => Err(FetchError::PermissionDenied),
                Some(_) => Err(FetchError::Status(500)),
                None => Ok(()),
            }
        }
    }

    fn store_with_mail() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for (i, from) in [
            "Spam Corp <spam@junk.com>",
            "Spam Corp <spam@junk.com>",
            "Alice <alice@example.com>",
        ]
        .iter()
        .enumerate()
        {
            store
                .insert_email(
                    EmailRecord::builder(UserId(1), GmailId::new(format!("g{i}")))
                        .from(*from)
                        .is_read(false)
                        .labels(vec!["UNREAD".into()])
                        .build(),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_mark_read() {
        let store = store_with_mail();
        let handler = ActionHandler::new(Arc::new(FakeDeleter::default()), store.clone());

        assert!(handler.mark_read(UserId(1), 1).unwrap());
        let record = store.get_email(UserId(1), 1).unwrap().unwrap();
        assert!(record.is_read);
    }

    #[test]
    fn test_delete_by_sender_removes_matching_only() {
        let store = store_with_mail();
        let api = Arc::new(FakeDeleter::default());
        let handler = ActionHandler::new(api.clone(), store.clone());

        let outcome = handler.delete_by_sender(UserId(1), "spam@junk.com").unwrap();
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.remote_deleted, 2);
        assert_eq!(outcome.total_remote_ids, 2);
        assert!(!outcome.requires_reauth);

        assert_eq!(store.count_for_user(UserId(1)).unwrap(), 1);
        assert_eq!(api.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.single_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_permission_denied_stops_remote_retries() {
        let store = store_with_mail();
        let api = Arc::new(FakeDeleter::default());
        *api.batch_error.lock().unwrap() = Some(FetchError::PermissionDenied);
        let handler = ActionHandler::new(api.clone(), store.clone());

        let outcome = handler.delete_by_sender(UserId(1), "spam@junk.com").unwrap();
        assert!(outcome.requires_reauth);
        assert_eq!(outcome.remote_deleted, 0);
        // No per-message fallback after a scope rejection
        assert_eq!(api.single_calls.load(Ordering::SeqCst), 0);
        // Local rows still removed
        assert_eq!(outcome.deleted, 2);
    }

    #[test]
    fn test_transient_batch_failure_falls_back_to_single_deletes() {
        let store = store_with_mail();
        let api = Arc::new(FakeDeleter::default());
        *api.batch_error.lock().unwrap() = Some(FetchError::Status(500));
        let handler = ActionHandler::new(api.clone(), store.clone());

        let outcome = handler.delete_by_sender(UserId(1), "spam@junk.com").unwrap();
        assert!(!outcome.requires_reauth);
        assert_eq!(outcome.remote_deleted, 2);
        assert_eq!(api.single_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_matches_is_a_noop() {
        let store = store_with_mail();
        let api = Arc::new(FakeDeleter::default());
        let handler = ActionHandler::new(api.clone(), store);

        let outcome = handler.delete_by_sender(UserId(1), "nobody@nowhere.com").unwrap();
        assert_eq!(outcome.deleted, 0);
        assert_eq!(api.batch_calls.load(Ordering::SeqCst), 0);
    }
}
