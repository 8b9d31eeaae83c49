//! Shared fixtures for `finsync-infra` integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use finsync_common::time::MockClock;
use finsync_core::CredentialStore;
use finsync_domain::{
    Credential, Direction, Environment, FinSyncConfig, Money, ProviderId, ProviderSettings,
    RateLimit, Transaction, VatRate,
};
use finsync_infra::{FinSyncContext, InMemoryCredentialStore};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn transaction(id: &str, cents: i64, direction: Direction, vat_cents: Option<i64>) -> Transaction {
    Transaction {
        id: id.to_string(),
        date: date(2024, 3, 10),
        description: format!("{id} description"),
        amount: Money::from_cents(cents),
        direction,
        category: if direction == Direction::Income { "sales".into() } else { "office".into() },
        account: "bank".into(),
        reference: format!("REF-{id}"),
        vat_amount: vat_cents.map(Money::from_cents),
        vat_rate: VatRate::STANDARD,
    }
}

pub fn credential(provider: ProviderId, access: &str) -> Credential {
    Credential::authenticated(
        provider,
        access,
        Some(format!("{access}-refresh")),
        epoch() + Duration::hours(1),
    )
    .unwrap()
}

/// Settings pointing `provider` at a mock server.
pub fn settings(api_base_url: String, tenant_id: Option<&str>) -> ProviderSettings {
    let mut settings =
        ProviderSettings::new("client-123", "secret-456", "http://127.0.0.1:8765/callback");
    settings.api_base_url = Some(api_base_url);
    settings.tenant_id = tenant_id.map(str::to_string);
    settings.rate_limit = Some(RateLimit::new(1_000, 10_000));
    settings
}

pub fn config(providers: Vec<(ProviderId, ProviderSettings)>) -> FinSyncConfig {
    FinSyncConfig {
        environment: Environment::Sandbox,
        tax_identifier: Some("4123456789".into()),
        retry_backoff_ms: 1,
        providers: providers.into_iter().collect(),
        ..FinSyncConfig::default()
    }
}

/// Context whose credential store already holds a valid token per provider.
pub async fn connected_context(config: FinSyncConfig) -> FinSyncContext {
    let store = Arc::new(InMemoryCredentialStore::new());
    for provider in config.providers.keys() {
        store.set(&credential(*provider, "live-token")).await.unwrap();
    }

    FinSyncContext::builder(config)
        .credential_store(store)
        .clock(Arc::new(MockClock::starting_at(epoch())))
        .build()
        .unwrap()
}
