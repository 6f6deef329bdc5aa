//! mailsync - Gmail mailbox mirroring engine
//!
//! This crate keeps a local store an eventually-exact mirror of a user's
//! remote mailbox:
//! - Credential session management (OAuth refresh-token exchange)
//! - Full-mailbox enumeration via cursor pagination
//! - Normalization of provider messages into local records
//! - Bounded-concurrency batch ingestion with per-item failure isolation
//! - Deletion reconciliation against the enumerated remote set
//! - Derived views (sending domain / sender aggregates) over synced data
//!
//! HTTP routing, identity tokens, and presentation are out of scope; this
//! crate exposes the operations those layers call.

pub mod actions;
pub mod config;
pub mod error;
pub mod gmail;
pub mod models;
pub mod query;
pub mod storage;
pub mod sync;

pub use actions::{ActionHandler, DeleteBySenderOutcome};
pub use config::GmailCredentials;
pub use error::{AuthError, FetchError, NormalizeError, StoreError, SyncError};
pub use gmail::{GmailClient, GmailSession, ItemOutcome, MailboxApi, SessionManager, list_all_references, sync_message};
pub use models::{CredentialSet, EmailRecord, GmailId, User, UserId, labels};
pub use query::{
    DomainStat, EmailPage, SenderStat, domain_stats, extract_domain, extract_email, get_email,
    list_by_sender, list_emails, senders_for_domain,
};
pub use storage::{EmailStore, IdPair, InMemoryStore, SenderRow, SqliteStore, UserStore};
pub use sync::{
    BATCH_SIZE, ReconcileOutcome, SyncReport, SyncStats, reconcile, run_batches, run_sync,
    sync_mailbox,
};
