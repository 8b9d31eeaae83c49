//! Configuration management

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_IN_FLIGHT, DEFAULT_REFRESH_MARGIN_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_BACKOFF_MS,
};
use crate::errors::{FinSyncError, Result};
use crate::impl_domain_status_conversions;
use crate::types::{ProviderId, RateLimit};

/// Which set of provider endpoints to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl_domain_status_conversions!(Environment {
    Sandbox => "sandbox",
    Production => "production",
});

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinSyncConfig {
    pub environment: Environment,
    /// VAT registration number used for tax submissions.
    pub tax_identifier: Option<String>,
    pub request_timeout_secs: u64,
    pub refresh_margin_secs: u64,
    pub max_in_flight: usize,
    pub retry_backoff_ms: u64,
    pub providers: HashMap<ProviderId, ProviderSettings>,
}

impl Default for FinSyncConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            tax_identifier: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            providers: HashMap::new(),
        }
    }
}

impl FinSyncConfig {
    /// Settings for `provider`, or a `Config` error naming the missing entry.
    pub fn provider(&self, provider: ProviderId) -> Result<&ProviderSettings> {
        self.providers.get(&provider).ok_or_else(|| {
            FinSyncError::Config(format!("no settings configured for {}", provider.display_name()))
        })
    }

    /// Tax identifier, required before anything is filed.
    pub fn require_tax_identifier(&self) -> Result<&str> {
        self.tax_identifier
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FinSyncError::Config("tax_identifier is not configured".into()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(FinSyncError::Config("request_timeout_secs must be positive".into()));
        }
        if self.max_in_flight == 0 {
            return Err(FinSyncError::Config("max_in_flight must be positive".into()));
        }
        for (provider, settings) in &self.providers {
            settings.validate(*provider)?;
        }
        Ok(())
    }
}

/// Per-provider OAuth client and endpoint overrides.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub redirect_uri: String,
    /// Organisation/realm/company the requests are scoped to, where required.
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
}

impl ProviderSettings {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            tenant_id: None,
            api_base_url: None,
            rate_limit: None,
        }
    }

    pub fn validate(&self, provider: ProviderId) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(FinSyncError::Config(format!("{provider}: client_id is empty")));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(FinSyncError::Config(format!("{provider}: redirect_uri is empty")));
        }
        if let Some(limit) = &self.rate_limit {
            limit
                .validate()
                .map_err(|e| FinSyncError::Config(format!("{provider}: {e}")))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("tenant_id", &self.tenant_id)
            .field("api_base_url", &self.api_base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FinSyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.environment, Environment::Sandbox);
        assert!(config.require_tax_identifier().is_err());
    }

    #[test]
    fn rejects_empty_client_id() {
        let mut config = FinSyncConfig::default();
        config.providers.insert(ProviderId::Xero, ProviderSettings::new("", "s", "http://cb"));
        assert!(matches!(config.validate(), Err(FinSyncError::Config(_))));
    }

    #[test]
    fn rejects_zero_rate_limit_override() {
        let mut settings = ProviderSettings::new("id", "secret", "http://cb");
        settings.rate_limit = Some(RateLimit { per_minute: 0, per_hour: 100 });
        assert!(settings.validate(ProviderId::Sage).is_err());
    }

    #[test]
    fn deserializes_partial_toml_like_json() {
        let json = serde_json::json!({
            "environment": "production",
            "tax_identifier": "4123456789",
            "providers": {
                "xero": { "client_id": "abc", "client_secret": "shh", "redirect_uri": "http://cb" }
            }
        });
        let config: FinSyncConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert_eq!(config.provider(ProviderId::Xero).unwrap().client_id, "abc");
        assert!(config.provider(ProviderId::Sage).is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let settings = ProviderSettings::new("id", "top-secret", "http://cb");
        assert!(!format!("{settings:?}").contains("top-secret"));
    }
}
