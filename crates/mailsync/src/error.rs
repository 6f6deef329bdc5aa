//! Error types for the sync engine
//!
//! Errors are split by blast radius: `AuthError` and `FetchError` abort a
//! whole sync pass, `NormalizeError` is confined to a single message and
//! only shows up in aggregate counters, and `StoreError::Duplicate` is the
//! recoverable skip path.

use crate::models::{GmailId, UserId};

/// Credential failures. Fatal to the pass that hit them; never retried.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("user has no stored Gmail refresh token")]
    MissingRefreshToken,

    #[error("user {0} not found")]
    UnknownUser(UserId),

    #[error("token refresh rejected by provider: {0}")]
    RefreshRejected(#[source] Box<ureq::Error>),

    #[error("could not decode token response: {0}")]
    InvalidTokenResponse(#[source] Box<ureq::Error>),

    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
}

/// A provider call failed.
///
/// During enumeration this is fatal to the pass: a partial reference list
/// must never reach the reconciler. During per-message work it is caught at
/// the batch boundary instead.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Gmail rejected the operation: insufficient permission scope")]
    PermissionDenied,

    #[error("Gmail request failed with status {0}")]
    Status(u16),

    #[error("Gmail request failed: {0}")]
    Transport(#[source] Box<ureq::Error>),

    #[error("could not decode Gmail response: {0}")]
    Decode(#[source] Box<ureq::Error>),
}

impl FetchError {
    /// Classify a transport-level error, pulling permission problems out
    /// of the generic status bucket.
    pub fn from_call(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(403) => FetchError::PermissionDenied,
            ureq::Error::StatusCode(code) => FetchError::Status(code),
            other => FetchError::Transport(Box::new(other)),
        }
    }

    /// Whether the failure means the user must re-grant OAuth scopes.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, FetchError::PermissionDenied)
    }
}

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with this Gmail id already exists. Uniqueness is global
    /// across users; the sync path treats this as "already synced".
    #[error("email with gmail id {0} already exists")]
    Duplicate(GmailId),

    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.into())
    }
}

/// Failure while syncing one message: fetching its full form, making sense
/// of the payload, or persisting the record. Confined to that message.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("failed to fetch message: {0}")]
    Fetch(#[from] FetchError),

    #[error("message {0} has no payload")]
    MissingPayload(GmailId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pass-level error surfaced to callers of `sync_mailbox`.
///
/// Callers get either a full `SyncReport` or one of these; there is no
/// partial-summary-plus-error combination. Records committed before the
/// failure stay put, so re-running the pass is safe.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("mailbox enumeration failed: {0}")]
    RemoteFetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
