//! Storage trait definitions

use crate::error::StoreError;
use crate::models::{CredentialSet, EmailRecord, GmailId, User, UserId};

/// `{local_id, gmail_id}` projection used by the reconciler
#[derive(Debug, Clone)]
pub struct IdPair {
    pub local_id: i64,
    /// Empty string when a legacy row has no Gmail id; such rows are never
    /// deletion candidates
    pub gmail_id: String,
}

/// `{local_id, gmail_id, from}` projection used by the derived views and
/// the delete-by-sender action
#[derive(Debug, Clone)]
pub struct SenderRow {
    pub local_id: i64,
    pub gmail_id: GmailId,
    pub from: String,
}

/// Email record storage.
///
/// Implementations enforce global uniqueness of `gmail_id` across the whole
/// store; a colliding insert fails with [`StoreError::Duplicate`]. Every
/// mutating or user-scoped operation carries the owning `user_id` so one
/// user's pass can never touch another user's rows.
pub trait EmailStore: Send + Sync {
    /// Insert a new record, returning it with its assigned local id
    fn insert_email(&self, record: EmailRecord) -> Result<EmailRecord, StoreError>;

    /// Look up a record by Gmail id (global, not per-user)
    fn find_by_gmail_id(&self, gmail_id: &GmailId) -> Result<Option<EmailRecord>, StoreError>;

    /// Get one record scoped to its owner
    fn get_email(&self, user_id: UserId, local_id: i64) -> Result<Option<EmailRecord>, StoreError>;

    /// List a user's records, newest first
    fn list_page(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EmailRecord>, StoreError>;

    /// Count a user's records
    fn count_for_user(&self, user_id: UserId) -> Result<usize, StoreError>;

    /// Project `{local_id, gmail_id}` for all of a user's records
    fn id_pairs_for_user(&self, user_id: UserId) -> Result<Vec<IdPair>, StoreError>;

    /// Project `{local_id, gmail_id, from}` for all of a user's records
    fn sender_rows_for_user(&self, user_id: UserId) -> Result<Vec<SenderRow>, StoreError>;

    /// Bulk-delete by local id, constrained to the owning user.
    /// Returns the number of rows actually deleted.
    fn delete_by_local_ids(&self, user_id: UserId, local_ids: &[i64]) -> Result<usize, StoreError>;

    /// Set the read flag on one record, keeping the stored label set
    /// consistent with the flag. Returns whether a record was updated.
    fn set_read(&self, user_id: UserId, local_id: i64, is_read: bool) -> Result<bool, StoreError>;

    /// Clear all email data (for testing)
    fn clear(&self) -> Result<(), StoreError>;
}

/// User record storage
pub trait UserStore: Send + Sync {
    /// Insert a new user, returning it with its assigned id
    fn insert_user(&self, user: User) -> Result<User, StoreError>;

    /// Get a user by id
    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Persist a refreshed credential triple onto the user record
    fn save_credentials(&self, id: UserId, credentials: &CredentialSet) -> Result<(), StoreError>;
}
