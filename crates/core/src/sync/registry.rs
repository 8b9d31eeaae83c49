//! Lookup of per-provider sync collaborators
//!
//! Everything the engine needs for one provider travels together in a
//! [`ProviderChannel`]. Channels share nothing with each other, so providers
//! can be synced concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use finsync_common::resilience::{SlidingWindowLimiter, WindowLimit};
use finsync_common::time::Clock;
use finsync_domain::{FinSyncError, ProviderId, RateLimit, Result};

use super::ports::{FormatAdapter, ProviderApi};
use crate::auth::ports::AccessTokenSource;

/// Limiter type used by every channel
pub type ProviderLimiter = SlidingWindowLimiter<Arc<dyn Clock>>;

/// Adapter, API client, token source and limiter for one provider
#[derive(Clone)]
pub struct ProviderChannel {
    pub adapter: Arc<dyn FormatAdapter>,
    pub api: Arc<dyn ProviderApi>,
    pub tokens: Arc<dyn AccessTokenSource>,
    pub limiter: Arc<ProviderLimiter>,
}

impl ProviderChannel {
    /// Assemble a channel, building its limiter from the provider's ceilings.
    pub fn new(
        adapter: Arc<dyn FormatAdapter>,
        api: Arc<dyn ProviderApi>,
        tokens: Arc<dyn AccessTokenSource>,
        rate_limit: RateLimit,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        rate_limit.validate()?;
        let provider = adapter.provider();
        let limiter = SlidingWindowLimiter::with_clock(
            provider.to_string(),
            vec![
                WindowLimit::per_minute(rate_limit.per_minute),
                WindowLimit::per_hour(rate_limit.per_hour),
            ],
            clock,
        )
        .map_err(|e| FinSyncError::Config(e.to_string()))?;

        Ok(Self { adapter, api, tokens, limiter: Arc::new(limiter) })
    }

    pub fn provider(&self) -> ProviderId {
        self.adapter.provider()
    }
}

/// Channels keyed by provider
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    channels: HashMap<ProviderId, ProviderChannel>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel for an accounting provider.
    ///
    /// Rejects the tax authority, duplicates, and channels whose token source
    /// belongs to a different provider.
    pub fn register(&mut self, channel: ProviderChannel) -> Result<()> {
        let provider = channel.provider();
        if provider.is_tax_authority() {
            return Err(FinSyncError::Config(format!(
                "{} is a tax authority, not a sync target",
                provider.display_name()
            )));
        }
        if channel.tokens.provider() != provider {
            return Err(FinSyncError::Config(format!(
                "token source for {} registered on the {provider} channel",
                channel.tokens.provider()
            )));
        }
        if self.channels.contains_key(&provider) {
            return Err(FinSyncError::Config(format!("channel for {provider} already registered")));
        }
        self.channels.insert(provider, channel);
        Ok(())
    }

    pub fn get(&self, provider: ProviderId) -> Result<&ProviderChannel> {
        self.channels.get(&provider).ok_or_else(|| {
            FinSyncError::Config(format!("{} is not configured for sync", provider.display_name()))
        })
    }

    pub fn providers(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.channels.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
