//! Read-side queries over synced records
//!
//! Pure functions of already-synced local data; no remote calls.

mod domains;
mod emails;

pub use domains::{DomainStat, SenderStat, domain_stats, extract_domain, extract_email, senders_for_domain};
pub use emails::{EmailPage, get_email, list_by_sender, list_emails};
