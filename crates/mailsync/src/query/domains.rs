//! Sending-domain and sender aggregates
//!
//! Groups a user's records by the address in the From header, preferring
//! an angle-bracket-delimited address over a bare token.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::StoreError;
use crate::models::UserId;
use crate::storage::EmailStore;

/// Aggregate for one sending domain
#[derive(Debug, Clone, Serialize)]
pub struct DomainStat {
    pub domain: String,
    pub email_count: usize,
    pub unique_from_count: usize,
}

/// Aggregate for one sender address
#[derive(Debug, Clone, Serialize)]
pub struct SenderStat {
    pub from: String,
    pub count: usize,
}

/// Pull the sender address out of a raw From header.
///
/// `"Alice <alice@example.com>"` yields the bracketed address; a bare
/// `"alice@example.com"` token is the fallback. Unparseable non-empty input
/// is returned as-is.
pub fn extract_email(from: &str) -> String {
    if from.is_empty() {
        return "Unknown".to_string();
    }

    if let Some(address) = angle_address(from) {
        return address.to_string();
    }

    if let Some(token) = bare_address(from) {
        return token.to_string();
    }

    from.to_string()
}

/// Domain suffix of the sender address, or "Unknown"
pub fn extract_domain(from: &str) -> String {
    let address = match (angle_address(from), bare_address(from)) {
        (Some(a), _) => a,
        (None, Some(a)) => a,
        (None, None) => return "Unknown".to_string(),
    };

    match address.rsplit_once('@') {
        Some((_, domain)) if !domain.is_empty() => domain.to_string(),
        _ => "Unknown".to_string(),
    }
}

/// The part between the last `<` and the last `>`, if well-formed
fn angle_address(s: &str) -> Option<&str> {
    let start = s.rfind('<')?;
    let end = s.rfind('>')?;
    if start < end {
        let address = s[start + 1..end].trim();
        if !address.is_empty() {
            return Some(address);
        }
    }
    None
}

/// First whitespace-separated token that looks like an address
fn bare_address(s: &str) -> Option<&str> {
    s.split_whitespace()
        .find(|token| token.contains('@') && !token.contains('<') && !token.contains('>'))
}

/// Per-domain counts over all of a user's records, most mail first
pub fn domain_stats(store: &dyn EmailStore, user_id: UserId) -> Result<Vec<DomainStat>, StoreError> {
    let rows = store.sender_rows_for_user(user_id)?;

    let mut by_domain: HashMap<String, (usize, HashSet<String>)> = HashMap::new();
    for row in &rows {
        let domain = extract_domain(&row.from);
        let sender = extract_email(&row.from);
        let entry = by_domain.entry(domain).or_default();
        entry.0 += 1;
        entry.1.insert(sender);
    }

    let mut stats: Vec<DomainStat> = by_domain
        .into_iter()
        .map(|(domain, (email_count, senders))| DomainStat {
            domain,
            email_count,
            unique_from_count: senders.len(),
        })
        .collect();

    stats.sort_by(|a, b| b.email_count.cmp(&a.email_count).then(a.domain.cmp(&b.domain)));
    Ok(stats)
}

/// Per-sender counts within one domain, most mail first
pub fn senders_for_domain(
    store: &dyn EmailStore,
    user_id: UserId,
    domain: &str,
) -> Result<Vec<SenderStat>, StoreError> {
    let rows = store.sender_rows_for_user(user_id)?;

    let mut by_sender: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        if extract_domain(&row.from) == domain {
            *by_sender.entry(extract_email(&row.from)).or_default() += 1;
        }
    }

    let mut stats: Vec<SenderStat> = by_sender
        .into_iter()
        .map(|(from, count)| SenderStat { from, count })
        .collect();

    stats.sort_by(|a, b| b.count.cmp(&a.count).then(a.from.cmp(&b.from)));
    Ok(stats)
}
