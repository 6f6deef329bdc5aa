//! Email record model
//!
//! One row per Gmail message mirrored into the local store. Records are
//! created by the sync pass and deleted by the reconciler; the only
//! in-place mutation is the explicit mark-as-read action.

use super::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a message as assigned by Gmail.
///
/// Globally unique across the whole store, not just per user; idempotent
/// re-sync depends on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GmailId(pub String);

impl GmailId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GmailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GmailId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GmailId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A mirrored email message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Local primary key (0 until the store assigns one)
    pub local_id: i64,
    /// Owning user
    pub user_id: UserId,
    /// Gmail message id (globally unique)
    pub gmail_id: GmailId,
    /// Gmail thread id
    pub thread_id: String,
    /// Raw From header value
    pub from: String,
    /// Raw To header value
    pub to: String,
    /// Subject line ("(No Subject)" when the header was absent)
    pub subject: String,
    /// Gmail's short preview of the body
    pub snippet: String,
    /// Extracted plain-text body (may fall back to the snippet)
    pub body: String,
    /// Delivery time: the Date header, or Gmail's internal timestamp
    pub date: DateTime<Utc>,
    /// Gmail label ids on the message at sync time
    pub labels: Vec<String>,
    /// Derived from the label set: no UNREAD label means read
    pub is_read: bool,
    /// Derived from the label set: STARRED label present
    pub is_starred: bool,
}

impl EmailRecord {
    /// Create a new record builder
    pub fn builder(user_id: UserId, gmail_id: GmailId) -> EmailRecordBuilder {
        EmailRecordBuilder::new(user_id, gmail_id)
    }

    /// Record with a store-assigned local id
    pub fn with_local_id(mut self, local_id: i64) -> Self {
        self.local_id = local_id;
        self
    }
}

/// Builder for [`EmailRecord`]
pub struct EmailRecordBuilder {
    user_id: UserId,
    gmail_id: GmailId,
    thread_id: String,
    from: String,
    to: String,
    subject: String,
    snippet: String,
    body: String,
    date: Option<DateTime<Utc>>,
    labels: Vec<String>,
    is_read: bool,
    is_starred: bool,
}

impl EmailRecordBuilder {
    fn new(user_id: UserId, gmail_id: GmailId) -> Self {
        Self {
            user_id,
            gmail_id,
            thread_id: String::new(),
            from: String::new(),
            to: String::new(),
            subject: String::new(),
            snippet: String::new(),
            body: String::new(),
            date: None,
            labels: Vec::new(),
            is_read: true,
            is_starred: false,
        }
    }

    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn is_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    pub fn is_starred(mut self, is_starred: bool) -> Self {
        self.is_starred = is_starred;
        self
    }

    pub fn build(self) -> EmailRecord {
        EmailRecord {
            local_id: 0,
            user_id: self.user_id,
            gmail_id: self.gmail_id,
            thread_id: self.thread_id,
            from: self.from,
            to: self.to,
            subject: self.subject,
            snippet: self.snippet,
            body: self.body,
            date: self.date.unwrap_or_else(Utc::now),
            labels: self.labels,
            is_read: self.is_read,
            is_starred: self.is_starred,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let record = EmailRecord::builder(UserId(1), GmailId::new("g1")).build();
        assert_eq!(record.local_id, 0);
        assert_eq!(record.user_id, UserId(1));
        assert_eq!(record.gmail_id.as_str(), "g1");
        assert!(record.is_read);
        assert!(!record.is_starred);
        assert!(record.labels.is_empty());
    }

    #[test]
    fn test_builder_fields() {
        let record = EmailRecord::builder(UserId(1), GmailId::new("g1"))
            .thread_id("t1")
            .from("Alice <alice@example.com>")
            .subject("Hello")
            .labels(vec!["INBOX".into(), "UNREAD".into()])
            .is_read(false)
            .build();
        assert_eq!(record.thread_id, "t1");
        assert_eq!(record.subject, "Hello");
        assert!(!record.is_read);
        assert_eq!(record.labels.len(), 2);
    }
}
