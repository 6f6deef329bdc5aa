//! Gmail REST API request and response types

use serde::{Deserialize, Serialize};

/// One page of the message listing endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    /// Absent when the mailbox (or page) is empty
    pub messages: Option<Vec<MessageRef>>,
    /// Opaque cursor; absent on the final page
    pub next_page_token: Option<String>,
    pub result_size_estimate: Option<u32>,
}

/// Lightweight reference returned by listing, before full content is fetched
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    pub thread_id: String,
}

/// Full message as returned by `messages.get` with `format=full`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Option<Vec<String>>,
    #[serde(default)]
    pub snippet: String,
    /// Milliseconds since epoch, as a decimal string
    #[serde(default)]
    pub internal_date: String,
    pub payload: Option<MessagePayload>,
}

/// Message payload: headers plus either an inline body or sub-parts
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub mime_type: Option<String>,
    pub headers: Option<Vec<Header>>,
    pub body: Option<MessageBody>,
    pub parts: Option<Vec<MessagePart>>,
}

/// RFC 822 header as a name-value pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Body content, base64url-encoded when present
#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub size: Option<u32>,
    pub data: Option<String>,
}

/// One part of a multipart message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub part_id: Option<String>,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    pub headers: Option<Vec<Header>>,
    pub body: Option<MessageBody>,
    pub parts: Option<Vec<MessagePart>>,
}

/// Response from the OAuth token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Only present when the provider rotates the refresh token
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    #[allow(dead_code)]
    pub token_type: Option<String>,
}

/// Request body for `messages.batchDelete`
#[derive(Debug, Serialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<String>,
}
