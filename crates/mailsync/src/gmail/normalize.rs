//! Gmail message normalization
//!
//! Maps a provider message (headers, multipart body, label set) into a
//! local [`EmailRecord`] and persists it. The whole path is idempotent:
//! already-synced messages short-circuit before the expensive full fetch,
//! and a duplicate insert raced in by a concurrent pass resolves to the
//! same skip outcome.

use base64::prelude::*;
use chrono::{DateTime, TimeZone, Utc};

use super::api::{GmailMessage, MessagePayload, MessageRef};
use super::client::MailboxApi;
use crate::error::{NormalizeError, StoreError};
use crate::models::{labels, EmailRecord, GmailId, UserId};
use crate::storage::EmailStore;

/// Placeholder subject for messages without a Subject header
const NO_SUBJECT: &str = "(No Subject)";

/// What happened to one reference during a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A new record was created
    Created,
    /// A record for this Gmail id already existed
    AlreadyExists,
}

/// Sync a single referenced message into the store.
///
/// The existence check runs before the full fetch: existence is far
/// cheaper to test than a message is to fetch.
pub fn sync_message(
    api: &dyn MailboxApi,
    store: &dyn EmailStore,
    user_id: UserId,
    reference: &MessageRef,
) -> Result<ItemOutcome, NormalizeError> {
    let gmail_id = GmailId::new(&reference.id);

    if store.find_by_gmail_id(&gmail_id)?.is_some() {
        return Ok(ItemOutcome::AlreadyExists);
    }

    let message = api.get_message(&gmail_id)?;
    let record = normalize_message(&message, user_id)?;

    match store.insert_email(record) {
        Ok(_) => Ok(ItemOutcome::Created),
        // Lost a race against a concurrent pass; same as the pre-check hit
        Err(StoreError::Duplicate(_)) => Ok(ItemOutcome::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

/// Build a local record from a full Gmail message
pub fn normalize_message(msg: &GmailMessage, user_id: UserId) -> Result<EmailRecord, NormalizeError> {
    let gmail_id = GmailId::new(&msg.id);
    let payload = msg
        .payload
        .as_ref()
        .ok_or_else(|| NormalizeError::MissingPayload(gmail_id.clone()))?;

    let subject = extract_header(payload, "Subject").unwrap_or_else(|| NO_SUBJECT.to_string());
    let from = extract_header(payload, "From").unwrap_or_default();
    let to = extract_header(payload, "To").unwrap_or_default();

    // The Date header wins; Gmail's internal timestamp is the authoritative
    // delivery time when the header is missing or unparseable
    let date = extract_header(payload, "Date")
        .and_then(|v| parse_date_header(&v))
        .unwrap_or_else(|| internal_timestamp(&msg.internal_date));

    let body = extract_body(payload).unwrap_or_else(|| msg.snippet.clone());

    let label_ids = msg.label_ids.clone().unwrap_or_default();
    let is_read = !label_ids.iter().any(|l| l == labels::UNREAD);
    let is_starred = label_ids.iter().any(|l| l == labels::STARRED);

    Ok(EmailRecord::builder(user_id, gmail_id)
        .thread_id(&msg.thread_id)
        .from(from)
        .to(to)
        .subject(subject)
        .snippet(&msg.snippet)
        .body(body)
        .date(date)
        .labels(label_ids)
        .is_read(is_read)
        .is_starred(is_starred)
        .build())
}

/// Extract a header value by exact, case-sensitive field name
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload
        .headers
        .as_ref()?
        .iter()
        .find(|h| h.name == name)
        .map(|h| h.value.clone())
}

/// Parse an RFC 2822 Date header
fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Gmail's internal timestamp (milliseconds since epoch, decimal string)
fn internal_timestamp(internal_date: &str) -> DateTime<Utc> {
    let millis: i64 = internal_date.parse().unwrap_or(0);
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Extract a plain-text body, in priority order:
/// 1. inline payload on the root part
/// 2. the first top-level sub-part whose media type is exactly `text/plain`
///
/// Returns None when neither yields text; the caller falls back to the
/// snippet. HTML-only and multipart/alternative mail without a plain-text
/// part lands on the snippet on purpose.
fn extract_body(payload: &MessagePayload) -> Option<String> {
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && let Some(text) = decode_base64_body(data)
    {
        return Some(text);
    }

    if let Some(parts) = &payload.parts
        && let Some(part) = parts
            .iter()
            .find(|p| p.mime_type.as_deref() == Some("text/plain"))
        && let Some(body) = &part.body
        && let Some(data) = &body.data
        && let Some(text) = decode_base64_body(data)
    {
        return Some(text);
    }

    None
}

/// Decode base64-encoded body data.
///
/// Gmail uses URL-safe base64 but padding varies in the wild, so several
/// engines are tried in turn.
fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    for decoder in decoders {
        if let Ok(decoded) = decoder.decode(data)
            && let Ok(text) = String::from_utf8(decoded)
        {
            return Some(text);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{Header, MessageBody, MessagePart};

    fn b64(text: &str) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(text)
    }

    fn payload_with_headers(headers: Vec<(&str, &str)>) -> MessagePayload {
        MessagePayload {
            mime_type: Some("text/plain".to_string()),
            headers: Some(
                headers
                    .into_iter()
                    .map(|(n, v)| Header {
                        name: n.to_string(),
                        value: v.to_string(),
                    })
                    .collect(),
            ),
            body: None,
            parts: None,
        }
    }

    fn message(payload: Option<MessagePayload>, labels: Vec<&str>) -> GmailMessage {
        GmailMessage {
            id: "g1".to_string(),
            thread_id: "t1".to_string(),
            label_ids: Some(labels.into_iter().map(|s| s.to_string()).collect()),
            snippet: "snippet text".to_string(),
            internal_date: "1700000000000".to_string(),
            payload,
        }
    }

    #[test]
    fn test_extract_header_exact_case() {
        let payload = payload_with_headers(vec![("Subject", "Hello"), ("from", "nope")]);
        assert_eq!(extract_header(&payload, "Subject"), Some("Hello".to_string()));
        // Field-name match is case-sensitive
        assert_eq!(extract_header(&payload, "From"), None);
    }

    #[test]
    fn test_subject_defaults_when_absent() {
        let msg = message(Some(payload_with_headers(vec![("From", "a@b.com")])), vec![]);
        let record = normalize_message(&msg, UserId(1)).unwrap();
        assert_eq!(record.subject, "(No Subject)");
        assert_eq!(record.from, "a@b.com");
        assert_eq!(record.to, "");
    }

    #[test]
    fn test_date_header_wins() {
        let msg = message(
            Some(payload_with_headers(vec![(
                "Date",
                "Tue, 1 Jul 2003 10:52:37 +0200",
            )])),
            vec![],
        );
        let record = normalize_message(&msg, UserId(1)).unwrap();
        assert_eq!(record.date.timestamp(), 1_057_049_557);
    }

    #[test]
    fn test_unparseable_date_falls_back_to_internal_timestamp() {
        let msg = message(
            Some(payload_with_headers(vec![("Date", "not a date")])),
            vec![],
        );
        let record = normalize_message(&msg, UserId(1)).unwrap();
        assert_eq!(record.date.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_body_prefers_inline_payload() {
        let mut payload = payload_with_headers(vec![]);
        payload.body = Some(MessageBody {
            size: Some(10),
            data: Some(b64("inline body")),
        });
        let msg = message(Some(payload), vec![]);
        let record = normalize_message(&msg, UserId(1)).unwrap();
        assert_eq!(record.body, "inline body");
    }

    #[test]
    fn test_body_falls_back_to_plain_text_part() {
        let mut payload = payload_with_headers(vec![]);
        payload.parts = Some(vec![
            MessagePart {
                part_id: None,
                mime_type: Some("text/html".to_string()),
                filename: None,
                headers: None,
                body: Some(MessageBody {
                    size: Some(10),
                    data: Some(b64("<p>html</p>")),
                }),
                parts: None,
            },
            MessagePart {
                part_id: None,
                mime_type: Some("text/plain".to_string()),
                filename: None,
                headers: None,
                body: Some(MessageBody {
                    size: Some(10),
                    data: Some(b64("plain body")),
                }),
                parts: None,
            },
        ]);
        let msg = message(Some(payload), vec![]);
        let record = normalize_message(&msg, UserId(1)).unwrap();
        assert_eq!(record.body, "plain body");
    }

    #[test]
    fn test_html_only_message_uses_snippet() {
        let mut payload = payload_with_headers(vec![]);
        payload.parts = Some(vec![MessagePart {
            part_id: None,
            mime_type: Some("text/html".to_string()),
            filename: None,
            headers: None,
            body: Some(MessageBody {
                size: Some(10),
                data: Some(b64("<p>html</p>")),
            }),
            parts: None,
        }]);
        let msg = message(Some(payload), vec![]);
        let record = normalize_message(&msg, UserId(1)).unwrap();
        assert_eq!(record.body, "snippet text");
    }

    #[test]
    fn test_flags_from_inbox_only() {
        let msg = message(Some(payload_with_headers(vec![])), vec!["INBOX"]);
        let record = normalize_message(&msg, UserId(1)).unwrap();
        assert!(record.is_read);
        assert!(!record.is_starred);
    }

    #[test]
    fn test_flags_from_unread_starred() {
        let msg = message(Some(payload_with_headers(vec![])), vec!["UNREAD", "STARRED"]);
        let record = normalize_message(&msg, UserId(1)).unwrap();
        assert!(!record.is_read);
        assert!(record.is_starred);
    }

    #[test]
    fn test_missing_payload_is_an_error() {
        let msg = message(None, vec![]);
        assert!(matches!(
            normalize_message(&msg, UserId(1)),
            Err(NormalizeError::MissingPayload(_))
        ));
    }

    #[test]
    fn test_decode_base64_body_variants() {
        // "Hello, World!" without padding
        assert_eq!(
            decode_base64_body("SGVsbG8sIFdvcmxkIQ"),
            Some("Hello, World!".to_string())
        );
        // Standard alphabet with padding
        assert_eq!(
            decode_base64_body("SGVsbG8sIFdvcmxkIQ=="),
            Some("Hello, World!".to_string())
        );
        assert_eq!(decode_base64_body("!!!"), None);
    }
}
