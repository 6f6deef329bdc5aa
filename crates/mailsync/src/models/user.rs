//! User model and stored Gmail credentials

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local user identifier (database primary key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The OAuth credential triple stored on a user record.
///
/// Mutated only by the session manager when it refreshes an access token.
/// The refresh token, once issued, is retained across refreshes unless the
/// provider's response supplies a replacement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialSet {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialSet {
    /// Whether the access token is expired or about to expire.
    ///
    /// A missing expiry is treated as expired, which forces a refresh. The
    /// buffer keeps a token from dying mid-pass.
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer_secs: i64) -> bool {
        match (&self.access_token, self.expires_at) {
            (None, _) => true,
            (_, None) => true,
            (Some(_), Some(expires_at)) => expires_at.timestamp() <= now.timestamp() + buffer_secs,
        }
    }
}

/// A registered user whose mailbox is mirrored locally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Local primary key (0 until the store assigns one)
    pub id: UserId,
    /// Account email address (unique)
    pub email: String,
    /// Display name
    pub name: String,
    /// Stored Gmail OAuth credentials
    pub credentials: CredentialSet,
}

impl User {
    /// Create a new user (id is assigned on insert)
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId(0),
            email: email.into(),
            name: name.into(),
            credentials: CredentialSet::default(),
        }
    }

    /// Attach stored credentials
    pub fn with_credentials(mut self, credentials: CredentialSet) -> Self {
        self.credentials = credentials;
        self
    }
}
