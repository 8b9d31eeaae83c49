//! Remote financial systems and their static profiles

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{FinSyncError, Result};
use crate::impl_domain_status_conversions;

/// Closed set of remote systems the core talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    /// South African Revenue Service eFiling (tax authority)
    #[serde(rename = "sars")]
    Sars,
    #[serde(rename = "xero")]
    Xero,
    #[serde(rename = "quickbooks")]
    QuickBooks,
    #[serde(rename = "sage")]
    Sage,
    #[serde(rename = "zoho-books")]
    ZohoBooks,
}

impl_domain_status_conversions!(ProviderId {
    Sars => "sars",
    Xero => "xero",
    QuickBooks => "quickbooks",
    Sage => "sage",
    ZohoBooks => "zoho-books",
});

impl ProviderId {
    pub const ALL: [ProviderId; 5] =
        [Self::Sars, Self::Xero, Self::QuickBooks, Self::Sage, Self::ZohoBooks];

    /// General-ledger providers that accept transaction pushes.
    pub const ACCOUNTING: [ProviderId; 4] =
        [Self::Xero, Self::QuickBooks, Self::Sage, Self::ZohoBooks];

    #[must_use]
    pub const fn is_tax_authority(&self) -> bool {
        matches!(self, Self::Sars)
    }

    /// Human readable name for user-facing messages.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Sars => "SARS eFiling",
            Self::Xero => "Xero",
            Self::QuickBooks => "QuickBooks",
            Self::Sage => "Sage",
            Self::ZohoBooks => "Zoho Books",
        }
    }

    /// Upper-case token used in environment variable names.
    #[must_use]
    pub const fn env_key(&self) -> &'static str {
        match self {
            Self::Sars => "SARS",
            Self::Xero => "XERO",
            Self::QuickBooks => "QUICKBOOKS",
            Self::Sage => "SAGE",
            Self::ZohoBooks => "ZOHO_BOOKS",
        }
    }
}

/// Request ceilings declared by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl RateLimit {
    pub const fn new(per_minute: u32, per_hour: u32) -> Self {
        Self { per_minute, per_hour }
    }

    /// Validate that both ceilings allow at least one call.
    pub fn validate(&self) -> Result<()> {
        if self.per_minute == 0 || self.per_hour == 0 {
            return Err(FinSyncError::Config(format!(
                "rate limit must be positive (per_minute={}, per_hour={})",
                self.per_minute, self.per_hour
            )));
        }
        Ok(())
    }
}

/// Static configuration of one remote system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub provider_id: ProviderId,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub scope: String,
    pub rate_limit: RateLimit,
}

/// Immutable lookup of profiles keyed by provider, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ProviderProfiles {
    profiles: HashMap<ProviderId, ProviderProfile>,
}

impl ProviderProfiles {
    pub fn new(profiles: impl IntoIterator<Item = ProviderProfile>) -> Result<Self> {
        let mut map = HashMap::new();
        for profile in profiles {
            profile.rate_limit.validate()?;
            if map.insert(profile.provider_id, profile.clone()).is_some() {
                return Err(FinSyncError::Config(format!(
                    "duplicate profile for provider {}",
                    profile.provider_id
                )));
            }
        }
        Ok(Self { profiles: map })
    }

    pub fn get(&self, provider: ProviderId) -> Result<&ProviderProfile> {
        self.profiles
            .get(&provider)
            .ok_or_else(|| FinSyncError::Config(format!("no profile registered for {provider}")))
    }

    pub fn providers(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.profiles.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(provider_id: ProviderId) -> ProviderProfile {
        ProviderProfile {
            provider_id,
            authorize_url: "https://auth.example/authorize".into(),
            token_url: "https://auth.example/token".into(),
            api_base_url: "https://api.example".into(),
            scope: "accounting".into(),
            rate_limit: RateLimit::new(60, 1000),
        }
    }

    #[test]
    fn provider_ids_round_trip_through_strings() {
        for provider in ProviderId::ALL {
            let parsed: ProviderId = provider.to_string().parse().unwrap();
            assert_eq!(parsed, provider);
        }
        assert_eq!(serde_json::to_string(&ProviderId::ZohoBooks).unwrap(), "\"zoho-books\"");
    }

    #[test]
    fn registry_rejects_duplicates_and_zero_limits() {
        let dup = ProviderProfiles::new([profile(ProviderId::Xero), profile(ProviderId::Xero)]);
        assert!(matches!(dup, Err(FinSyncError::Config(_))));

        let mut zero = profile(ProviderId::Sage);
        zero.rate_limit = RateLimit::new(0, 10);
        assert!(ProviderProfiles::new([zero]).is_err());
    }

    #[test]
    fn registry_lookup() {
        let profiles = ProviderProfiles::new([profile(ProviderId::Xero)]).unwrap();
        assert_eq!(profiles.get(ProviderId::Xero).unwrap().scope, "accounting");
        assert!(matches!(profiles.get(ProviderId::Sage), Err(FinSyncError::Config(_))));
    }
}
