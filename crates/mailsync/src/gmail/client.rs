//! Gmail API HTTP client
//!
//! Uses synchronous HTTP (ureq) to stay executor-agnostic. All calls go
//! through the [`MailboxApi`] trait so the sync engine can run against a
//! fake provider in tests, mirroring the storage trait seam.

use std::time::Duration;

use super::api::{BatchDeleteRequest, GmailMessage, ListMessagesResponse, MessageRef};
use super::session::GmailSession;
use crate::error::FetchError;
use crate::models::GmailId;

/// Remote mailbox operations used by the sync engine.
///
/// Implemented by [`GmailClient`] for the real API and by test fakes.
pub trait MailboxApi: Send + Sync {
    /// Fetch one page of message references
    fn list_messages(&self, page_token: Option<&str>) -> Result<ListMessagesResponse, FetchError>;

    /// Fetch a message's full representation
    fn get_message(&self, id: &GmailId) -> Result<GmailMessage, FetchError>;

    /// Permanently delete a batch of messages (up to 1000 ids)
    fn batch_delete(&self, ids: &[GmailId]) -> Result<(), FetchError>;

    /// Permanently delete a single message
    fn delete_message(&self, id: &GmailId) -> Result<(), FetchError>;
}

/// Gmail API client bound to one session
pub struct GmailClient {
    session: GmailSession,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Provider maximum page size for the listing endpoint
    const PAGE_SIZE: usize = 500;

    /// Listing filter covering every mailbox section we mirror
    const FOLDER_QUERY: &'static str = "in:inbox OR in:sent OR in:drafts OR in:trash OR in:spam";

    /// Retry budget for single-message fetches
    const FETCH_RETRIES: u32 = 3;

    pub fn new(session: GmailSession) -> Self {
        Self { session }
    }

    fn fetch_message(&self, id: &GmailId) -> Result<GmailMessage, FetchError> {
        let url = format!(
            "{}/users/me/messages/{}?format=full",
            Self::BASE_URL,
            id.as_str()
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &self.session.bearer())
            .call()
            .map_err(FetchError::from_call)?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| FetchError::Decode(Box::new(e)))
    }
}

impl MailboxApi for GmailClient {
    fn list_messages(&self, page_token: Option<&str>) -> Result<ListMessagesResponse, FetchError> {
        let mut url = format!(
            "{}/users/me/messages?maxResults={}&q={}",
            Self::BASE_URL,
            Self::PAGE_SIZE,
            urlencoding::encode(Self::FOLDER_QUERY),
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let mut response = ureq::get(&url)
            .header("Authorization", &self.session.bearer())
            .call()
            .map_err(FetchError::from_call)?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| FetchError::Decode(Box::new(e)))
    }

    /// Fetch with bounded exponential backoff; transient provider hiccups
    /// on one message should not count against the pass.
    fn get_message(&self, id: &GmailId) -> Result<GmailMessage, FetchError> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..Self::FETCH_RETRIES {
            match self.fetch_message(id) {
                Ok(msg) => return Ok(msg),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < Self::FETCH_RETRIES - 1 {
                        std::thread::sleep(delay + Duration::from_millis(rand_jitter()));
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap())
    }

    fn batch_delete(&self, ids: &[GmailId]) -> Result<(), FetchError> {
        let url = format!("{}/users/me/messages/batchDelete", Self::BASE_URL);
        let request = BatchDeleteRequest {
            ids: ids.iter().map(|id| id.as_str().to_string()).collect(),
        };

        ureq::post(&url)
            .header("Authorization", &self.session.bearer())
            .send_json(&request)
            .map_err(FetchError::from_call)?;

        Ok(())
    }

    fn delete_message(&self, id: &GmailId) -> Result<(), FetchError> {
        let url = format!("{}/users/me/messages/{}", Self::BASE_URL, id.as_str());

        ureq::delete(&url)
            .header("Authorization", &self.session.bearer())
            .call()
            .map_err(FetchError::from_call)?;

        Ok(())
    }
}

/// Enumerate the entire mailbox as an order-preserving list of references.
///
/// Follows the provider's opaque cursor until no further one is returned.
/// Any page failure aborts the whole enumeration: a partial reference list
/// would make the reconciler delete records that still exist remotely.
pub fn list_all_references(api: &dyn MailboxApi) -> Result<Vec<MessageRef>, FetchError> {
    let mut references: Vec<MessageRef> = Vec::new();
    let mut page_token: Option<String> = None;
    let mut page_count = 0usize;

    loop {
        let response = api.list_messages(page_token.as_deref())?;
        page_count += 1;

        if let Some(messages) = response.messages {
            references.extend(messages);
        }

        log::debug!(
            "listed page {}: {} references so far",
            page_count,
            references.len()
        );

        match response.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    log::info!(
        "enumerated {} remote messages across {} pages",
        references.len(),
        page_count
    );
    Ok(references)
}

/// Small random jitter (0-100ms) to spread retries out
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
