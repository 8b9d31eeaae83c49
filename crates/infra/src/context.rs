//! Dependency container wiring configuration to the core services
//!
//! One [`TokenManager`] per configured provider, one sync channel per
//! configured accounting provider, and the VAT submission service when the
//! tax authority is configured. Hosts swap the credential store, authorization
//! flow or clock through [`ContextBuilder`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use finsync_common::time::{Clock, SystemClock};
use finsync_core::{
    AuthPorts, AuthorizationFlow, CredentialStore, ProviderChannel, ProviderRegistry,
    SubmissionBuilder, SubmissionService, SyncConfig, SyncEngine, TokenManager,
    TokenManagerConfig,
};
use finsync_domain::{FinSyncConfig, FinSyncError, ProviderId, ProviderProfiles, Result};
use tracing::info;

use crate::config::build_profiles;
use crate::credentials::KeychainCredentialStore;
use crate::http::HttpClient;
use crate::integrations::accounting::{adapter_for, HttpProviderApi, TenantScope};
use crate::integrations::{HttpTaxAuthority, HttpTokenEndpoint, LoopbackAuthorizationFlow};

pub struct FinSyncContext {
    pub config: FinSyncConfig,
    pub profiles: ProviderProfiles,
    pub engine: Arc<SyncEngine>,
    pub submissions: Option<Arc<SubmissionService>>,
    pub submission_builder: Option<Arc<SubmissionBuilder>>,
    tokens: HashMap<ProviderId, Arc<TokenManager>>,
}

impl FinSyncContext {
    pub fn builder(config: FinSyncConfig) -> ContextBuilder {
        ContextBuilder { config, store: None, flow: None, clock: None }
    }

    /// Token manager for a configured provider.
    pub fn tokens(&self, provider: ProviderId) -> Result<Arc<TokenManager>> {
        self.tokens.get(&provider).cloned().ok_or_else(|| {
            FinSyncError::Config(format!("{} is not configured", provider.display_name()))
        })
    }

    /// Configured providers in a stable order.
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers: Vec<_> = self.tokens.keys().copied().collect();
        providers.sort();
        providers
    }

    /// Run the interactive authorization for `provider`.
    pub async fn connect(&self, provider: ProviderId) -> Result<()> {
        self.tokens(provider)?.authenticate().await.map(|_| ())
    }

    pub async fn disconnect(&self, provider: ProviderId) -> Result<()> {
        self.tokens(provider)?.logout().await
    }
}

pub struct ContextBuilder {
    config: FinSyncConfig,
    store: Option<Arc<dyn CredentialStore>>,
    flow: Option<Arc<dyn AuthorizationFlow>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ContextBuilder {
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn authorization_flow(mut self, flow: Arc<dyn AuthorizationFlow>) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<FinSyncContext> {
        let config = self.config;
        config.validate()?;
        let profiles = build_profiles(&config)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        // Single attempt per call: the sync engine and submission service own
        // retries, and each retry goes back through the provider rate limit.
        let http = HttpClient::builder().timeout(request_timeout).max_attempts(1).build()?;

        let ports = AuthPorts {
            store: self.store.unwrap_or_else(|| Arc::new(KeychainCredentialStore::default())),
            endpoint: Arc::new(HttpTokenEndpoint::new(http.clone(), Arc::clone(&clock))),
            flow: self.flow.unwrap_or_else(|| Arc::new(LoopbackAuthorizationFlow::default())),
        };
        let manager_config = TokenManagerConfig {
            refresh_margin: Duration::from_secs(config.refresh_margin_secs),
        };

        let mut configured: Vec<_> = config.providers.iter().collect();
        configured.sort_by_key(|(provider, _)| **provider);

        let mut tokens = HashMap::new();
        let mut registry = ProviderRegistry::new();
        let mut submissions = None;
        let mut submission_builder = None;

        for (&provider, settings) in configured {
            let profile = profiles.get(provider)?;
            let manager = Arc::new(TokenManager::new(
                profile,
                settings,
                ports.clone(),
                Arc::clone(&clock),
                manager_config,
            )?);

            if provider.is_tax_authority() {
                let authority = HttpTaxAuthority::new(profile.api_base_url.clone(), http.clone());
                let service =
                    SubmissionService::new(Arc::new(authority), manager.clone(), Arc::clone(&clock))?
                        .with_request_timeout(request_timeout);
                submissions = Some(Arc::new(service));
                submission_builder =
                    Some(Arc::new(SubmissionBuilder::from_config(&config, Arc::clone(&clock))?));
            } else {
                let adapter = adapter_for(provider).ok_or_else(|| {
                    FinSyncError::Config(format!("no format adapter for {provider}"))
                })?;
                let api = HttpProviderApi::new(
                    provider,
                    profile.api_base_url.clone(),
                    http.clone(),
                    TenantScope::for_provider(provider, settings.tenant_id.as_deref()),
                );
                registry.register(ProviderChannel::new(
                    adapter,
                    Arc::new(api),
                    manager.clone(),
                    profile.rate_limit,
                    Arc::clone(&clock),
                )?)?;
            }

            tokens.insert(provider, manager);
        }

        info!(
            environment = %config.environment,
            providers = tokens.len(),
            vat = submissions.is_some(),
            "finsync context ready"
        );

        Ok(FinSyncContext {
            engine: Arc::new(SyncEngine::new(registry, clock, SyncConfig::from(&config))),
            config,
            profiles,
            submissions,
            submission_builder,
            tokens,
        })
    }
}
