//! Accounting provider integrations
//!
//! One [`FormatAdapter`] per provider plus the shared [`HttpProviderApi`].
//! Adapters own the provider's JSON shape and its chart-of-accounts lookup;
//! money crosses the wire as fixed-point decimals with at most two places.

pub mod http_api;
pub mod quickbooks;
pub mod sage;
pub mod xero;
pub mod zoho;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use finsync_core::FormatAdapter;
use finsync_domain::{DecodedBatch, Direction, Money, ProviderId, Transaction, VatRate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;
use tracing::debug;

pub use http_api::{HttpProviderApi, TenantScope};
pub use quickbooks::QuickBooksAdapter;
pub use sage::SageAdapter;
pub use xero::XeroAdapter;
pub use zoho::ZohoBooksAdapter;

/// Records requested per list page.
pub const PAGE_SIZE: u32 = finsync_domain::constants::DEFAULT_PAGE_SIZE;

/// Adapter with the built-in chart of accounts for `provider`.
///
/// `None` for the tax authority, which has no transaction schema.
pub fn adapter_for(provider: ProviderId) -> Option<Arc<dyn FormatAdapter>> {
    match provider {
        ProviderId::Xero => Some(Arc::new(XeroAdapter::default())),
        ProviderId::QuickBooks => Some(Arc::new(QuickBooksAdapter::default())),
        ProviderId::Sage => Some(Arc::new(SageAdapter::default())),
        ProviderId::ZohoBooks => Some(Arc::new(ZohoBooksAdapter::default())),
        ProviderId::Sars => None,
    }
}

/// Internal name → provider account code, with a code for unmapped names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartOfAccounts {
    codes: BTreeMap<String, String>,
    fallback: String,
}

impl ChartOfAccounts {
    pub fn new<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
        fallback: impl Into<String>,
    ) -> Self {
        let codes = entries
            .into_iter()
            .map(|(name, code)| (normalize(name), code.to_string()))
            .collect();
        Self { codes, fallback: fallback.into() }
    }

    /// Provider code for `name`, or the fallback code.
    pub fn code_for(&self, name: &str) -> &str {
        self.codes.get(&normalize(name)).map_or(self.fallback.as_str(), String::as_str)
    }

    /// Internal name for `code`; unknown codes are kept as-is.
    pub fn name_for(&self, code: &str) -> String {
        self.codes
            .iter()
            .find(|(_, mapped)| mapped.as_str() == code)
            .map_or_else(|| code.to_string(), |(name, _)| name.clone())
    }

    pub fn contains_code(&self, code: &str) -> bool {
        code == self.fallback || self.codes.values().any(|mapped| mapped == code)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Account tables an adapter translates through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMapping {
    pub income: ChartOfAccounts,
    pub expense: ChartOfAccounts,
    pub bank: ChartOfAccounts,
}

impl AccountMapping {
    pub fn category_code(&self, direction: Direction, category: &str) -> &str {
        self.categories(direction).code_for(category)
    }

    pub fn category_name(&self, direction: Direction, code: &str) -> String {
        self.categories(direction).name_for(code)
    }

    fn categories(&self, direction: Direction) -> &ChartOfAccounts {
        match direction {
            Direction::Income => &self.income,
            Direction::Expense => &self.expense,
        }
    }
}

/// VAT treatment as the providers distinguish it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VatTreatment {
    Standard,
    ZeroRated,
    Exempt,
}

impl VatTreatment {
    pub(crate) fn of(rate: VatRate) -> Self {
        if rate.is_exempt() {
            Self::Exempt
        } else if rate.is_zero_rated() {
            Self::ZeroRated
        } else {
            Self::Standard
        }
    }

    pub(crate) fn rate(self) -> VatRate {
        match self {
            Self::Standard => VatRate::STANDARD,
            Self::ZeroRated => VatRate::ZERO,
            Self::Exempt => VatRate::Exempt,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Wire money and dates */
/* -------------------------------------------------------------------------- */

pub(crate) fn to_decimal(amount: Money) -> Decimal {
    Decimal::new(amount.cents(), 2)
}

/// Exact cents for a decimal with at most two fractional digits.
pub(crate) fn to_money(amount: Decimal) -> Option<Money> {
    let normalized = amount.normalize();
    if normalized.scale() > 2 {
        return None;
    }
    (normalized * Decimal::ONE_HUNDRED).to_i64().map(Money::from_cents)
}

/// Amount from a JSON number or numeric string.
pub(crate) fn parse_amount(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)).ok()
}

/// `serialize_with` helper writing an amount as an exact two-place decimal
/// string (`"1500.00"`).
pub(crate) fn amount_as_decimal<S>(amount: &Money, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    rust_decimal::serde::str::serialize(&to_decimal(*amount), serializer)
}

pub(crate) fn optional_amount_as_decimal<S>(
    amount: &Option<Money>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match amount {
        Some(amount) => amount_as_decimal(amount, serializer),
        None => serializer.serialize_none(),
    }
}

/// `deserialize_with` helper for required wire amounts.
pub(crate) fn wire_amount<'de, D>(deserializer: D) -> Result<Money, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_amount(&value)
        .and_then(to_money)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid amount {value}")))
}

/// `deserialize_with` helper for optional wire amounts; `null` is absent.
pub(crate) fn optional_wire_amount<'de, D>(deserializer: D) -> Result<Option<Money>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_amount(&value)
            .and_then(to_money)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount {value}"))),
    }
}

/// Calendar date from `YYYY-MM-DD`, an ISO timestamp, or `/Date(ms+zone)/`.
pub(crate) fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix("/Date(").and_then(|rest| rest.strip_suffix(")/")) {
        let millis: String =
            inner.chars().take_while(|c| c.is_ascii_digit() || *c == '-').collect();
        let millis = millis.parse::<i64>().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|at| at.date_naive());
    }
    raw.get(..10).and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
}

pub(crate) fn format_wire_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/* -------------------------------------------------------------------------- */
/* Page decoding */
/* -------------------------------------------------------------------------- */

/// Decode every item of a page, dropping (and counting) the ones that do not
/// yield a valid [`Transaction`].
pub(crate) fn decode_items<F>(
    provider: ProviderId,
    items: Option<&Vec<Value>>,
    decode: F,
) -> DecodedBatch
where
    F: Fn(&Value) -> Option<Transaction>,
{
    let mut batch = DecodedBatch::default();
    for item in items.into_iter().flatten() {
        match decode(item).filter(|transaction| transaction.validate().is_ok()) {
            Some(transaction) => batch.transactions.push(transaction),
            None => batch.dropped += 1,
        }
    }
    if batch.dropped > 0 {
        debug!(%provider, dropped = batch.dropped, "dropped malformed provider records");
    }
    batch
}
