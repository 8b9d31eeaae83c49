//! Built-in provider endpoints per environment
//!
//! Defaults can be overridden per provider with `api_base_url` and
//! `rate_limit` in [`ProviderSettings`](finsync_domain::ProviderSettings).

use finsync_domain::{
    Environment, FinSyncConfig, ProviderId, ProviderProfile, ProviderProfiles, RateLimit, Result,
};

struct Endpoints {
    authorize_url: &'static str,
    token_url: &'static str,
    sandbox_api: &'static str,
    production_api: &'static str,
    scope: &'static str,
    rate_limit: RateLimit,
}

fn endpoints(provider: ProviderId) -> Endpoints {
    match provider {
        ProviderId::Sars => Endpoints {
            authorize_url: "https://secure.sarsefiling.co.za/oauth2/authorize",
            token_url: "https://secure.sarsefiling.co.za/oauth2/token",
            sandbox_api: "https://sandbox-api.sarsefiling.co.za/v1",
            production_api: "https://api.sarsefiling.co.za/v1",
            scope: "vat.returns.submit vat.returns.read",
            rate_limit: RateLimit::new(30, 500),
        },
        ProviderId::Xero => Endpoints {
            authorize_url: "https://login.xero.com/identity/connect/authorize",
            token_url: "https://identity.xero.com/connect/token",
            sandbox_api: "https://api.xero.com/api.xro/2.0",
            production_api: "https://api.xero.com/api.xro/2.0",
            scope: "offline_access accounting.transactions accounting.settings.read",
            rate_limit: RateLimit::new(60, 1_000),
        },
        ProviderId::QuickBooks => Endpoints {
            authorize_url: "https://appcenter.intuit.com/connect/oauth2",
            token_url: "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer",
            sandbox_api: "https://sandbox-quickbooks.api.intuit.com/v3/company",
            production_api: "https://quickbooks.api.intuit.com/v3/company",
            scope: "com.intuit.quickbooks.accounting",
            rate_limit: RateLimit::new(500, 10_000),
        },
        ProviderId::Sage => Endpoints {
            authorize_url: "https://www.sageone.com/oauth2/auth/central?filter=apiv3.1",
            token_url: "https://oauth.accounting.sage.com/token",
            sandbox_api: "https://api.accounting.sage.com/v3.1",
            production_api: "https://api.accounting.sage.com/v3.1",
            scope: "full_access",
            rate_limit: RateLimit::new(100, 2_000),
        },
        ProviderId::ZohoBooks => Endpoints {
            authorize_url: "https://accounts.zoho.com/oauth/v2/auth",
            token_url: "https://accounts.zoho.com/oauth/v2/token",
            sandbox_api: "https://sandbox.zohoapis.com/books/v3",
            production_api: "https://www.zohoapis.com/books/v3",
            scope: "ZohoBooks.banking.CREATE,ZohoBooks.banking.READ",
            rate_limit: RateLimit::new(100, 1_000),
        },
    }
}

/// Built-in profile of `provider` in `environment`.
pub fn default_profile(provider: ProviderId, environment: Environment) -> ProviderProfile {
    let defaults = endpoints(provider);
    let api_base_url = match environment {
        Environment::Sandbox => defaults.sandbox_api,
        Environment::Production => defaults.production_api,
    };

    ProviderProfile {
        provider_id: provider,
        authorize_url: defaults.authorize_url.to_string(),
        token_url: defaults.token_url.to_string(),
        api_base_url: api_base_url.to_string(),
        scope: defaults.scope.to_string(),
        rate_limit: defaults.rate_limit,
    }
}

/// Profiles for every provider, with the configured overrides applied.
pub fn build_profiles(config: &FinSyncConfig) -> Result<ProviderProfiles> {
    let profiles = ProviderId::ALL.into_iter().map(|provider| {
        let mut profile = default_profile(provider, config.environment);
        if let Some(settings) = config.providers.get(&provider) {
            if let Some(base) = &settings.api_base_url {
                profile.api_base_url = base.trim_end_matches('/').to_string();
            }
            if let Some(limit) = settings.rate_limit {
                profile.rate_limit = limit;
            }
        }
        profile
    });

    ProviderProfiles::new(profiles)
}
