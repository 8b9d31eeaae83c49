//! Per-provider OAuth credential state

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{FinSyncError, Result};
use crate::impl_domain_status_conversions;
use crate::types::ProviderId;

/// Lifecycle of a provider's OAuth credential.
///
/// ```text
/// Unauthenticated → Authorizing → Authenticated → Refreshing → Authenticated
///                                                            ↘ Unauthenticated
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    #[default]
    Unauthenticated,
    Authorizing,
    Authenticated,
    Refreshing,
}

impl_domain_status_conversions!(TokenState {
    Unauthenticated => "unauthenticated",
    Authorizing => "authorizing",
    Authenticated => "authenticated",
    Refreshing => "refreshing",
});

/// OAuth access/refresh token pair for one provider.
///
/// A `Credential` only exists in the `Authenticated` state: constructing one
/// with an empty access token fails, and the token manager holds no credential
/// at all while it is authorizing or refreshing.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    provider_id: ProviderId,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
    state: TokenState,
}

impl Credential {
    /// Build an authenticated credential.
    pub fn authenticated(
        provider_id: ProviderId,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self> {
        let credential = Self {
            provider_id,
            access_token: access_token.into(),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            expires_at,
            state: TokenState::Authenticated,
        };
        credential.validate()?;
        Ok(credential)
    }

    /// Re-check the invariant on values restored from storage.
    pub fn validate(&self) -> Result<()> {
        if self.state != TokenState::Authenticated {
            return Err(FinSyncError::InvalidState(format!(
                "stored credential for {} is {} rather than authenticated",
                self.provider_id, self.state
            )));
        }
        if self.access_token.trim().is_empty() {
            return Err(FinSyncError::auth(self.provider_id, "empty access token"));
        }
        Ok(())
    }

    #[must_use]
    pub fn provider_id(&self) -> ProviderId {
        self.provider_id
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub fn state(&self) -> TokenState {
        self.state
    }

    /// True when the token expires within `margin` of `now` (or already has).
    #[must_use]
    pub fn is_expiring(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }

    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

// Tokens must never reach logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("provider_id", &self.provider_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("state", &self.state)
            .finish()
    }
}
