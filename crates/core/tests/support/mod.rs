//! Shared test helpers for `finsync-core` integration tests.
//!
//! Fixtures build domain values with sensible defaults; `fakes` holds
//! in-memory implementations of every core port.

#![allow(dead_code)]

pub mod fakes;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use finsync_domain::{
    Credential, Direction, Money, ProviderId, ProviderProfile, ProviderSettings, RateLimit,
    Transaction, VatRate,
};

/// Fixed wall-clock origin so expiry arithmetic is reproducible.
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

pub fn transactions(count: usize) -> Vec<Transaction> {
    (1..=count).map(|i| transaction(&format!("tx-{i}"), 10_000, Direction::Income, Some(1_500))).collect()
}

pub fn profile(provider: ProviderId) -> ProviderProfile {
    ProviderProfile {
        provider_id: provider,
        authorize_url: "https://login.example.test/authorize".into(),
        token_url: "https://login.example.test/token".into(),
        api_base_url: "https://api.example.test".into(),
        scope: "accounting.transactions offline_access".into(),
        rate_limit: RateLimit::new(60, 5_000),
    }
}

pub fn settings() -> ProviderSettings {
    ProviderSettings::new("client-123", "secret-456", "http://127.0.0.1:8765/callback")
}

pub fn credential(provider: ProviderId, access: &str, expires_in_secs: i64) -> Credential {
    Credential::authenticated(
        provider,
        access,
        Some(format!("{access}-refresh")),
        epoch() + Duration::seconds(expires_in_secs),
    )
    .unwrap()
}
