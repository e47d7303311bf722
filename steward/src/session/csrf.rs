//! CSRF token issuance and validation
//!
//! Tokens guard the state-changing steps of confirmation flows. They are:
//! - Cryptographically secure (32 bytes of randomness, base64url encoded)
//! - Stored per-session (one active token per session)
//! - Expiring (24 hours), with rotation on demand
//!
//! The workflow validates a presented token against the session's active
//! one whenever a request carries a `confirm` or `cancel` action; a first
//! visit instead *issues* a token for the confirmation page to present
//! back.

use super::SessionData;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Token lifetime before a fresh one is issued
const TOKEN_TTL_HOURS: i64 = 24;

/// CSRF token string (base64url-encoded 32-byte random value)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Generate a new cryptographically secure CSRF token
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Get the token as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create a token from a string (for validation)
    #[must_use]
    pub const fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CSRF token with its expiry, stored on the session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct CsrfTokenData {
    token: CsrfToken,
    expires_at: DateTime<Utc>,
}

impl CsrfTokenData {
    fn new(token: CsrfToken) -> Self {
        Self {
            token,
            expires_at: Utc::now() + Duration::hours(TOKEN_TTL_HOURS),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Get the session's active token, issuing a fresh one if none is live
pub fn issue(session: &mut SessionData) -> CsrfToken {
    match &session.csrf {
        Some(data) if !data.is_expired() => data.token.clone(),
        _ => rotate(session),
    }
}

/// Unconditionally replace the session's token with a fresh one
pub fn rotate(session: &mut SessionData) -> CsrfToken {
    let token = CsrfToken::generate();
    session.csrf = Some(CsrfTokenData::new(token.clone()));
    token
}

/// Validate a presented token against the session's active one
///
/// Fails when no token was ever issued, the issued token has expired, or
/// the strings differ.
#[must_use]
pub fn validate(session: &SessionData, presented: &str) -> bool {
    match &session.csrf {
        Some(data) if !data.is_expired() => data.token.as_str() == presented,
        _ => false,
    }
}
