//! Identity token carried in the `ID-Token` cookie
//!
//! The server splits its signed identity token: the `header.payload` part is
//! readable by the client, the signature lives in a separate HttpOnly cookie.
//! The client never verifies anything, it only reads the payload claims.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims the client reads from the identity token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
}

/// Reasons a cookie value is not a readable token
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has no payload segment")]
    MissingPayload,

    #[error("token payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token payload is not valid claims JSON: {0}")]
    Claims(#[from] serde_json::Error),
}

impl AuthToken {
    /// Decode the payload segment of a `header.payload[.signature]` token
    pub fn decode(raw: &str) -> Result<Self, TokenError> {
        let payload = raw
            .split('.')
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .ok_or(TokenError::MissingPayload)?;

        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Whether the token expired at or before `now` (UTC seconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }

    /// Whether the token has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}
