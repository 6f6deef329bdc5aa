//! In-memory storage implementation
//!
//! HashMaps behind RwLocks, used for tests and as the reference
//! implementation of the store semantics.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use super::traits::{EmailStore, IdPair, SenderRow, UserStore};
use crate::error::StoreError;
use crate::models::{labels, CredentialSet, EmailRecord, GmailId, User, UserId};

/// In-memory implementation of [`EmailStore`] and [`UserStore`]
pub struct InMemoryStore {
    emails: RwLock<HashMap<i64, EmailRecord>>,
    /// gmail_id -> local_id; the uniqueness constraint
    gmail_index: RwLock<HashMap<String, i64>>,
    users: RwLock<HashMap<i64, User>>,
    next_email_id: AtomicI64,
    next_user_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            emails: RwLock::new(HashMap::new()),
            gmail_index: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            next_email_id: AtomicI64::new(1),
            next_user_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailStore for InMemoryStore {
    fn insert_email(&self, record: EmailRecord) -> Result<EmailRecord, StoreError> {
        // Lock order is always emails then index. Both are held across the
        // duplicate check and the insert so a racing duplicate cannot slip
        // between them.
        let mut emails = self.emails.write().unwrap();
        let mut index = self.gmail_index.write().unwrap();
        if index.contains_key(record.gmail_id.as_str()) {
            return Err(StoreError::Duplicate(record.gmail_id.clone()));
        }

        let local_id = self.next_email_id.fetch_add(1, Ordering::SeqCst);
        let record = record.with_local_id(local_id);

        index.insert(record.gmail_id.as_str().to_string(), local_id);
        emails.insert(local_id, record.clone());
        Ok(record)
    }

    fn find_by_gmail_id(&self, gmail_id: &GmailId) -> Result<Option<EmailRecord>, StoreError> {
        let emails = self.emails.read().unwrap();
        let index = self.gmail_index.read().unwrap();
        let Some(local_id) = index.get(gmail_id.as_str()) else {
            return Ok(None);
        };
        Ok(emails.get(local_id).cloned())
    }

    fn get_email(&self, user_id: UserId, local_id: i64) -> Result<Option<EmailRecord>, StoreError> {
        Ok(self
            .emails
            .read()
            .unwrap()
            .get(&local_id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    fn list_page(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EmailRecord>, StoreError> {
        let emails = self.emails.read().unwrap();
        let mut records: Vec<EmailRecord> = emails
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    fn count_for_user(&self, user_id: UserId) -> Result<usize, StoreError> {
        Ok(self
            .emails
            .read()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .count())
    }

    fn id_pairs_for_user(&self, user_id: UserId) -> Result<Vec<IdPair>, StoreError> {
        Ok(self
            .emails
            .read()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| IdPair {
                local_id: r.local_id,
                gmail_id: r.gmail_id.as_str().to_string(),
            })
            .collect())
    }

    fn sender_rows_for_user(&self, user_id: UserId) -> Result<Vec<SenderRow>, StoreError> {
        Ok(self
            .emails
            .read()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| SenderRow {
                local_id: r.local_id,
                gmail_id: r.gmail_id.clone(),
                from: r.from.clone(),
            })
            .collect())
    }

    fn delete_by_local_ids(&self, user_id: UserId, local_ids: &[i64]) -> Result<usize, StoreError> {
        let mut emails = self.emails.write().unwrap();
        let mut index = self.gmail_index.write().unwrap();
        let mut deleted = 0;

        for local_id in local_ids {
            // The ownership filter must hold even for a malformed id set
            let owned = emails
                .get(local_id)
                .is_some_and(|r| r.user_id == user_id);
            if owned
                && let Some(record) = emails.remove(local_id)
            {
                index.remove(record.gmail_id.as_str());
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    fn set_read(&self, user_id: UserId, local_id: i64, is_read: bool) -> Result<bool, StoreError> {
        let mut emails = self.emails.write().unwrap();
        let Some(record) = emails
            .get_mut(&local_id)
            .filter(|r| r.user_id == user_id)
        else {
            return Ok(false);
        };

        record.is_read = is_read;
        if is_read {
            record.labels.retain(|l| l != labels::UNREAD);
        } else if !record.labels.iter().any(|l| l == labels::UNREAD) {
            record.labels.push(labels::UNREAD.to_string());
        }
        Ok(true)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.emails.write().unwrap().clear();
        self.gmail_index.write().unwrap().clear();
        Ok(())
    }
}

impl UserStore for InMemoryStore {
    fn insert_user(&self, mut user: User) -> Result<User, StoreError> {
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        user.id = UserId(id);
        self.users.write().unwrap().insert(id, user.clone());
        Ok(user)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().unwrap().get(&id.0).cloned())
    }

    fn save_credentials(&self, id: UserId, credentials: &CredentialSet) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap();
        if let Some(user) = users.get_mut(&id.0) {
            user.credentials = credentials.clone();
        }
        Ok(())
    }
}
