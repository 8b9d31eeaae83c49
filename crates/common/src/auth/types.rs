//! OAuth 2.0 token endpoint payloads
//!
//! Deserialization targets for RFC 6749 §5.1 success responses and §5.2
//! error bodies, plus [`TokenSet`], the normalized result handed to the token
//! manager.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound applied to `expires_in` (one year).
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

/// Token endpoint success response (RFC 6749 §5.1)
///
/// `expires_in` is optional on the wire; some providers omit it for
/// long-lived tokens and callers substitute a default lifetime.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Access/refresh token pair with an absolute expiry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Normalize a token response received at `received_at`.
    ///
    /// A missing or non-positive `expires_in` falls back to
    /// `default_lifetime_secs`, and lifetimes are capped at
    /// [`MAX_TOKEN_LIFETIME_SECS`]. An empty refresh token counts as absent.
    #[must_use]
    pub fn from_response(
        response: TokenResponse,
        received_at: DateTime<Utc>,
        default_lifetime_secs: i64,
    ) -> Self {
        let lifetime = response
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(default_lifetime_secs)
            .clamp(0, MAX_TOKEN_LIFETIME_SECS);

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            token_type: response.token_type,
            expires_at: received_at + chrono::Duration::seconds(lifetime),
            scope: response.scope,
        }
    }

    /// Keep `previous` when a refresh response did not rotate the refresh token.
    #[must_use]
    pub fn or_refresh_token(mut self, previous: Option<&str>) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.map(str::to_string);
        }
        self
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token endpoint error body (RFC 6749 §5.2)
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthErrorBody {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_response_and_applies_default_lifetime() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        let now = Utc::now();
        let tokens = TokenSet::from_response(response, now, 1800);

        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_at, now + chrono::Duration::seconds(1800));
        assert!(tokens.refresh_token.is_none());
    }

    #[test]
    fn oversized_expires_in_is_capped() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","expires_in":9223372036854775807}"#,
        )
        .unwrap();
        let now = Utc::now();
        let tokens = TokenSet::from_response(response, now, 1800);

        assert_eq!(tokens.expires_at, now + chrono::Duration::seconds(MAX_TOKEN_LIFETIME_SECS));
    }

    #[test]
    fn keeps_previous_refresh_token_when_not_rotated() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"new","token_type":"bearer","expires_in":3600,"refresh_token":""}"#,
        )
        .unwrap();
        let tokens = TokenSet::from_response(response, Utc::now(), 60).or_refresh_token(Some("old"));
        assert_eq!(tokens.refresh_token.as_deref(), Some("old"));
    }

    #[test]
    fn error_body_display() {
        let body: OAuthErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"code expired"}"#,
        )
        .unwrap();
        assert_eq!(body.to_string(), "invalid_grant: code expired");
    }

    #[test]
    fn debug_never_prints_tokens() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"secret-a","refresh_token":"secret-r"}"#)
                .unwrap();
        let rendered = format!("{response:?}");
        assert!(!rendered.contains("secret-a") && !rendered.contains("secret-r"));
    }
}
