//! Credential session management
//!
//! Turns a user's stored OAuth triple into a usable session, refreshing the
//! access token through the provider's token endpoint when it has expired.
//! Refreshed credentials are written back to the user record before the
//! session is handed out.
//!
//! There is no locking across concurrent callers: two passes for the same
//! user may both refresh and both persist. The overwrite is redundant but
//! harmless, since either write leaves a valid triple behind.

use chrono::{Duration, Utc};

use super::api::TokenResponse;
use crate::config::GmailCredentials;
use crate::error::AuthError;
use crate::models::{CredentialSet, UserId};
use crate::storage::UserStore;

/// A session bound to a valid (possibly just refreshed) access token.
///
/// Threaded explicitly into every remote call; no provider-client state
/// lives outside a pass.
#[derive(Debug, Clone)]
pub struct GmailSession {
    access_token: String,
}

impl GmailSession {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// Authorization header value for API requests
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Acquires sessions for users, refreshing stored tokens as needed
pub struct SessionManager {
    credentials: GmailCredentials,
}

impl SessionManager {
    /// Google OAuth2 token endpoint
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Refresh this long before the recorded expiry so a token does not
    /// die mid-pass
    const EXPIRY_BUFFER_SECS: i64 = 300;

    pub fn new(credentials: GmailCredentials) -> Self {
        Self { credentials }
    }

    /// Get a usable session for a user, refreshing the access token first
    /// if the stored one is expired or missing.
    ///
    /// Fails with [`AuthError::MissingRefreshToken`] when the user has never
    /// granted offline access, and [`AuthError::RefreshRejected`] when the
    /// provider refuses the exchange (e.g. a revoked grant).
    pub fn acquire(&self, users: &dyn UserStore, user_id: UserId) -> Result<GmailSession, AuthError> {
        let user = users
            .get_user(user_id)?
            .ok_or(AuthError::UnknownUser(user_id))?;

        let stored = &user.credentials;
        let Some(refresh_token) = stored.refresh_token.as_deref() else {
            return Err(AuthError::MissingRefreshToken);
        };

        if !stored.needs_refresh(Utc::now(), Self::EXPIRY_BUFFER_SECS) {
            // needs_refresh() returning false guarantees an access token
            if let Some(access_token) = &stored.access_token {
                return Ok(GmailSession::new(access_token.clone()));
            }
        }

        log::debug!("access token for user {} expired, refreshing", user_id);
        let response = self.refresh_access_token(refresh_token)?;
        let updated = merge_refresh(stored, &response);
        users.save_credentials(user_id, &updated)?;

        Ok(GmailSession::new(response.access_token))
    }

    /// Exchange a refresh token for a new access token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .map_err(|e| AuthError::RefreshRejected(Box::new(e)))?;

        response
            .into_body()
            .read_json()
            .map_err(|e| AuthError::InvalidTokenResponse(Box::new(e)))
    }
}

/// Fold a token response into the stored triple.
///
/// The refresh token is replaced only when the response carries a new one;
/// otherwise the existing one is retained.
fn merge_refresh(stored: &CredentialSet, response: &TokenResponse) -> CredentialSet {
    CredentialSet {
        access_token: Some(response.access_token.clone()),
        refresh_token: response
            .refresh_token
            .clone()
            .or_else(|| stored.refresh_token.clone()),
        expires_at: response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs as i64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> CredentialSet {
        CredentialSet {
            access_token: Some("old-access".into()),
            refresh_token: Some("old-refresh".into()),
            expires_at: Some(Utc::now() - Duration::hours(1)),
        }
    }

    #[test]
    fn test_merge_preserves_refresh_token() {
        let response = TokenResponse {
            access_token: "new-access".into(),
            refresh_token: None,
            expires_in: Some(3600),
            token_type: None,
        };

        let merged = merge_refresh(&stored(), &response);
        assert_eq!(merged.access_token.as_deref(), Some("new-access"));
        assert_eq!(merged.refresh_token.as_deref(), Some("old-refresh"));
        assert!(merged.expires_at.unwrap() > Utc::now());
    }

    #[test]
    fn test_merge_takes_rotated_refresh_token() {
        let response = TokenResponse {
            access_token: "new-access".into(),
            refresh_token: Some("new-refresh".into()),
            expires_in: Some(3600),
            token_type: None,
        };

        let merged = merge_refresh(&stored(), &response);
        assert_eq!(merged.refresh_token.as_deref(), Some("new-refresh"));
    }

    #[test]
    fn test_bearer_header() {
        let session = GmailSession::new("tok");
        assert_eq!(session.bearer(), "Bearer tok");
    }
}
