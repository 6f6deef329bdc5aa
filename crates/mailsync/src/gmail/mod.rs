//! Gmail API integration
//!
//! This module provides:
//! - Credential session management (refresh-token exchange)
//! - A Gmail API client behind the `MailboxApi` trait
//! - Full-mailbox enumeration via cursor pagination
//! - Normalization of API responses into local email records

pub mod api;
mod client;
mod normalize;
mod session;

pub use client::{GmailClient, MailboxApi, list_all_references};
pub use normalize::{ItemOutcome, sync_message};
pub use session::{GmailSession, SessionManager};
