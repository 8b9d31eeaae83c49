//! Canonical internal transaction model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::STANDARD_VAT_RATE_BPS;
use crate::errors::{FinSyncError, Result};
use crate::impl_domain_status_conversions;
use crate::types::{Money, TaxRate};

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Income,
    Expense,
}

impl_domain_status_conversions!(Direction {
    Income => "income",
    Expense => "expense",
});

/// VAT treatment of a transaction.
///
/// `Rated(0)` is zero-rated: taxable at 0%, reported separately from exempt
/// supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "bps")]
pub enum VatRate {
    Rated(TaxRate),
    Exempt,
}

impl VatRate {
    pub const STANDARD: VatRate = VatRate::Rated(TaxRate::from_bps(STANDARD_VAT_RATE_BPS));
    pub const ZERO: VatRate = VatRate::Rated(TaxRate::zero());

    #[must_use]
    pub fn is_zero_rated(&self) -> bool {
        matches!(self, Self::Rated(rate) if rate.is_zero())
    }

    #[must_use]
    pub fn is_exempt(&self) -> bool {
        matches!(self, Self::Exempt)
    }

    /// True when the transaction's VAT counts toward collected/paid totals.
    #[must_use]
    pub fn is_standard_rated(&self) -> bool {
        matches!(self, Self::Rated(rate) if !rate.is_zero())
    }
}

impl Default for VatRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// One entry of the local ledger.
///
/// `amount` is the magnitude of the movement; `direction` carries the sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub direction: Direction,
    pub category: String,
    pub account: String,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_amount: Option<Money>,
    #[serde(default)]
    pub vat_rate: VatRate,
}

impl Transaction {
    /// VAT on the transaction, treating an absent amount as zero.
    #[must_use]
    pub fn vat_or_zero(&self) -> Money {
        self.vat_amount.unwrap_or_default()
    }

    /// Amount including VAT, `None` if it does not fit in [`Money`].
    pub fn gross(&self) -> Option<Money> {
        self.amount.checked_add(self.vat_or_zero())
    }

    /// Local checks performed before a record is handed to any provider.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(FinSyncError::Validation("transaction id is empty".into()));
        }
        if self.reference.trim().is_empty() {
            return Err(FinSyncError::Validation(format!(
                "transaction {} has no reference",
                self.id
            )));
        }
        if self.amount.is_negative() {
            return Err(FinSyncError::Validation(format!(
                "transaction {} has a negative amount; direction carries the sign",
                self.id
            )));
        }
        if self.vat_amount.is_some_and(|vat| vat.is_negative()) {
            return Err(FinSyncError::Validation(format!(
                "transaction {} has a negative VAT amount",
                self.id
            )));
        }
        if self.gross().is_none() {
            return Err(FinSyncError::Validation(format!(
                "transaction {} amount plus VAT is out of range",
                self.id
            )));
        }
        Ok(())
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(FinSyncError::Validation(format!(
                "date range ends ({end}) before it starts ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
