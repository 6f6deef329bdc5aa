//! Email listing queries

use serde::Serialize;

use super::domains::extract_email;
use crate::error::StoreError;
use crate::models::{EmailRecord, UserId};
use crate::storage::EmailStore;

/// One page of a user's mailbox, newest first
#[derive(Debug, Serialize)]
pub struct EmailPage {
    pub records: Vec<EmailRecord>,
    pub total_pages: usize,
    pub current_page: usize,
    pub total: usize,
}

/// List a user's records with pagination. Pages are 1-based.
pub fn list_emails(
    store: &dyn EmailStore,
    user_id: UserId,
    page: usize,
    per_page: usize,
) -> Result<EmailPage, StoreError> {
    let page = page.max(1);
    let per_page = per_page.max(1);

    let total = store.count_for_user(user_id)?;
    let records = store.list_page(user_id, per_page, (page - 1) * per_page)?;

    Ok(EmailPage {
        records,
        total_pages: total.div_ceil(per_page),
        current_page: page,
        total,
    })
}

/// Fetch one record, scoped to its owner
pub fn get_email(
    store: &dyn EmailStore,
    user_id: UserId,
    local_id: i64,
) -> Result<Option<EmailRecord>, StoreError> {
    store.get_email(user_id, local_id)
}

/// All of a user's records whose sender address matches, newest first
pub fn list_by_sender(
    store: &dyn EmailStore,
    user_id: UserId,
    sender: &str,
) -> Result<Vec<EmailRecord>, StoreError> {
    let rows = store.sender_rows_for_user(user_id)?;

    let mut records = Vec::new();
    for row in rows {
        if extract_email(&row.from) == sender
            && let Some(record) = store.get_email(user_id, row.local_id)?
        {
            records.push(record);
        }
    }

    records.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GmailId;
    use crate::storage::InMemoryStore;
    use chrono::{Duration, Utc};

    fn seed(store: &InMemoryStore, n: usize) {
        for i in 0..n {
            store
                .insert_email(
                    EmailRecord::builder(UserId(1), GmailId::new(format!("g{i}")))
                        .from(format!("Sender {i} <s{i}@example.com>"))
                        .date(Utc::now() - Duration::hours(i as i64))
                        .build(),
                )
                .unwrap();
        }
    }

    #[test]
    fn test_pagination_shape() {
        let store = InMemoryStore::new();
        seed(&store, 7);

        let page = list_emails(&store, UserId(1), 2, 3).unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.records.len(), 3);
        // Newest first; page 2 starts at the 4th newest
        assert_eq!(page.records[0].gmail_id.as_str(), "g3");
    }

    #[test]
    fn test_page_zero_clamps_to_first() {
        let store = InMemoryStore::new();
        seed(&store, 2);

        let page = list_emails(&store, UserId(1), 0, 10).unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.records.len(), 2);
    }

    #[test]
    fn test_list_by_sender_matches_extracted_address() {
        let store = InMemoryStore::new();
        seed(&store, 3);

        let records = list_by_sender(&store, UserId(1), "s1@example.com").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gmail_id.as_str(), "g1");
    }
}
