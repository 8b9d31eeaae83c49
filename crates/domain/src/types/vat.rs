//! VAT return and submission lifecycle types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{FinSyncError, Result};
use crate::impl_domain_status_conversions;
use crate::types::{DateRange, Money};

/// Calendar month a VAT return covers (`YYYY-MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VatPeriod {
    year: i32,
    month: u32,
}

impl VatPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1900..=9999).contains(&year) {
            return Err(FinSyncError::Validation(format!("invalid VAT period {year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// Period containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Inclusive first and last day of the month.
    pub fn date_range(&self) -> Result<DateRange> {
        let start = NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .ok_or_else(|| FinSyncError::Validation(format!("invalid VAT period {self}")))?;
        let (next_year, next_month) =
            if self.month == 12 { (self.year + 1, 1) } else { (self.year, self.month + 1) };
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| FinSyncError::Validation(format!("invalid VAT period {self}")))?;
        DateRange::new(start, end)
    }
}

impl fmt::Display for VatPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for VatPeriod {
    type Err = FinSyncError;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| FinSyncError::Validation(format!("VAT period must be YYYY-MM: {s}")))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| FinSyncError::Validation(format!("invalid VAT period year: {s}")))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| FinSyncError::Validation(format!("invalid VAT period month: {s}")))?;
        Self::new(year, month)
    }
}

impl Serialize for VatPeriod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VatPeriod {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Periodic VAT summary derived from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatReturn {
    pub period: VatPeriod,
    pub vat_collected: Money,
    pub vat_paid: Money,
    pub vat_owing: Money,
    pub sales: Money,
    pub purchases: Money,
    pub zero_rated: Money,
    pub exempt: Money,
    pub transaction_count: usize,
}

impl VatReturn {
    /// True when the derived owing figure matches collected minus paid.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.vat_collected.checked_sub(self.vat_paid) == Some(self.vat_owing)
    }

    /// A negative owing figure means a refund is due.
    #[must_use]
    pub fn is_refund(&self) -> bool {
        self.vat_owing.is_negative()
    }
}

/// Lifecycle of a submission to the tax authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Accepted,
    Rejected,
}

impl_domain_status_conversions!(SubmissionStatus {
    Draft => "draft",
    Submitted => "submitted",
    Accepted => "accepted",
    Rejected => "rejected",
});

impl SubmissionStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

/// Signed VAT return with its acceptance lifecycle.
///
/// Transitions only move forward; every method that changes `status` checks
/// the current state first and leaves the submission untouched on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    id: String,
    vat_return: VatReturn,
    tax_identifier: String,
    signature: String,
    created_at: DateTime<Utc>,
    status: SubmissionStatus,
    submitted_at: Option<DateTime<Utc>>,
    submission_id: Option<String>,
    reference_number: Option<String>,
    rejection_reason: Option<String>,
}

impl Submission {
    /// New draft carrying a precomputed signature.
    pub fn draft(
        id: impl Into<String>,
        vat_return: VatReturn,
        tax_identifier: impl Into<String>,
        signature: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            vat_return,
            tax_identifier: tax_identifier.into(),
            signature: signature.into(),
            created_at,
            status: SubmissionStatus::Draft,
            submitted_at: None,
            submission_id: None,
            reference_number: None,
            rejection_reason: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn vat_return(&self) -> &VatReturn {
        &self.vat_return
    }

    pub fn tax_identifier(&self) -> &str {
        &self.tax_identifier
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Identifier the authority assigned to the filed return.
    pub fn submission_id(&self) -> Option<&str> {
        self.submission_id.as_deref()
    }

    pub fn reference_number(&self) -> Option<&str> {
        self.reference_number.as_deref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Fail with `InvalidState` unless the submission is still a draft.
    pub fn ensure_draft(&self) -> Result<()> {
        if self.status != SubmissionStatus::Draft {
            return Err(FinSyncError::InvalidState(format!(
                "submission {} is {}; only drafts can be submitted",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// `Draft → Submitted` after the authority accepted the HTTP exchange.
    pub fn mark_submitted(
        &mut self,
        submission_id: impl Into<String>,
        reference_number: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_draft()?;
        self.status = SubmissionStatus::Submitted;
        self.submitted_at = Some(at);
        self.submission_id = Some(submission_id.into());
        self.reference_number = Some(reference_number.into());
        Ok(())
    }

    /// `Submitted → Accepted`.
    pub fn mark_accepted(&mut self, reference_number: Option<String>) -> Result<()> {
        self.ensure_submitted("accept")?;
        self.status = SubmissionStatus::Accepted;
        if let Some(reference) = reference_number.filter(|r| !r.is_empty()) {
            self.reference_number = Some(reference);
        }
        Ok(())
    }

    /// `Submitted → Rejected`, keeping the authority's reason verbatim.
    pub fn mark_rejected(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_submitted("reject")?;
        self.status = SubmissionStatus::Rejected;
        self.rejection_reason = Some(reason.into());
        Ok(())
    }

    fn ensure_submitted(&self, action: &str) -> Result<()> {
        if self.status != SubmissionStatus::Submitted {
            return Err(FinSyncError::InvalidState(format!(
                "cannot {action} submission {} in state {}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

/// Acknowledgement returned when the authority accepts a filing for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub submission_id: String,
    pub reference_number: String,
}

/// Processing outcome reported by the authority for a filed return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteSubmissionStatus {
    Pending,
    Accepted {
        #[serde(default)]
        reference_number: Option<String>,
    },
    Rejected {
        reason: String,
    },
}
