//! Signed VAT submissions and their filing lifecycle
//!
//! The signature is the lowercase hex SHA-256 of
//! `tax_identifier|YYYY-MM|vat_collected|vat_paid`, amounts rendered with two
//! decimals. Verifiers on the authority side recompute it from the same four
//! fields in the same order, so neither the order nor the separator may change.

use std::sync::Arc;
use std::time::Duration;

use finsync_common::time::Clock;
use finsync_domain::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, SIGNATURE_FIELD_SEPARATOR};
use finsync_domain::{
    FinSyncConfig, FinSyncError, Money, ProviderId, RemoteSubmissionStatus, Result, Submission,
    SubmissionReceipt, SubmissionStatus, VatPeriod, VatReturn,
};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use super::ports::{IdGenerator, TaxAuthorityApi, UuidV7Generator};
use crate::auth::ports::AccessTokenSource;

/// Exact string that gets hashed into a return's signature.
pub fn signing_payload(tax_identifier: &str, vat_return: &VatReturn) -> String {
    [
        tax_identifier.to_string(),
        vat_return.period.to_string(),
        vat_return.vat_collected.to_decimal_string(),
        vat_return.vat_paid.to_decimal_string(),
    ]
    .join(SIGNATURE_FIELD_SEPARATOR)
}

pub fn sign_return(tax_identifier: &str, vat_return: &VatReturn) -> String {
    hex::encode(Sha256::digest(signing_payload(tax_identifier, vat_return).as_bytes()))
}

/// True when the stored signature still matches the submission's figures.
pub fn verify_signature(submission: &Submission) -> bool {
    sign_return(submission.tax_identifier(), submission.vat_return()) == submission.signature()
}

/// Request body for filing a return
///
/// Field order is the wire order: the signed fields first, then the remaining
/// figures, then the local reference and the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub tax_identifier: String,
    pub period: VatPeriod,
    pub vat_collected: Money,
    pub vat_paid: Money,
    pub vat_owing: Money,
    pub sales: Money,
    pub purchases: Money,
    pub zero_rated: Money,
    pub exempt: Money,
    pub submission_reference: String,
    pub digital_signature: String,
}

impl SubmissionPayload {
    pub fn from_submission(submission: &Submission) -> Self {
        let vat_return = submission.vat_return();
        Self {
            tax_identifier: submission.tax_identifier().to_string(),
            period: vat_return.period,
            vat_collected: vat_return.vat_collected,
            vat_paid: vat_return.vat_paid,
            vat_owing: vat_return.vat_owing,
            sales: vat_return.sales,
            purchases: vat_return.purchases,
            zero_rated: vat_return.zero_rated,
            exempt: vat_return.exempt,
            submission_reference: submission.id().to_string(),
            digital_signature: submission.signature().to_string(),
        }
    }
}

/// Creates signed draft submissions for one taxpayer
pub struct SubmissionBuilder {
    tax_identifier: String,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl SubmissionBuilder {
    pub fn new(
        tax_identifier: impl Into<String>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self> {
        let tax_identifier = tax_identifier.into();
        if tax_identifier.trim().is_empty() {
            return Err(FinSyncError::Config("tax identifier is empty".into()));
        }
        Ok(Self { tax_identifier, clock, ids })
    }

    /// Builder for the configured taxpayer, with UUID v7 submission ids.
    pub fn from_config(config: &FinSyncConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(config.require_tax_identifier()?, clock, Arc::new(UuidV7Generator))
    }

    pub fn tax_identifier(&self) -> &str {
        &self.tax_identifier
    }

    /// Sign `vat_return` and wrap it in a new draft.
    pub fn build_submission(&self, vat_return: VatReturn) -> Result<Submission> {
        if !vat_return.is_consistent() {
            return Err(FinSyncError::Validation(format!(
                "VAT return for {} does not satisfy owing = collected - paid",
                vat_return.period
            )));
        }

        let signature = sign_return(&self.tax_identifier, &vat_return);
        Ok(Submission::draft(
            self.ids.next_id(),
            vat_return,
            self.tax_identifier.clone(),
            signature,
            self.clock.utc_now(),
        ))
    }
}

/// Files drafts with the tax authority and tracks their outcome
pub struct SubmissionService {
    authority: Arc<dyn TaxAuthorityApi>,
    tokens: Arc<dyn AccessTokenSource>,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
}

impl SubmissionService {
    pub fn new(
        authority: Arc<dyn TaxAuthorityApi>,
        tokens: Arc<dyn AccessTokenSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if tokens.provider() != ProviderId::Sars {
            return Err(FinSyncError::Config(format!(
                "VAT submissions need a {} token source, got {}",
                ProviderId::Sars.display_name(),
                tokens.provider().display_name()
            )));
        }
        Ok(Self {
            authority,
            tokens,
            clock,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// File a draft. On success the submission becomes `Submitted`; on any
    /// failure it is left exactly as it was.
    #[instrument(skip(self, submission), fields(submission = %submission.id(), period = %submission.vat_return().period))]
    pub async fn submit(&self, submission: &mut Submission) -> Result<SubmissionReceipt> {
        submission.ensure_draft()?;

        if !submission.vat_return().is_consistent() || !verify_signature(submission) {
            warn!(submission = %submission.id(), "Signature no longer matches the return");
            return Err(FinSyncError::Validation(format!(
                "submission {} was modified after signing",
                submission.id()
            )));
        }

        let credential = self.tokens.ensure_valid().await?;
        let payload = SubmissionPayload::from_submission(submission);

        let receipt = self
            .with_timeout(self.authority.file_return(credential.access_token(), &payload))
            .await?;

        submission.mark_submitted(
            receipt.submission_id.clone(),
            receipt.reference_number.clone(),
            self.clock.utc_now(),
        )?;
        info!(
            submission = %submission.id(),
            authority_id = %receipt.submission_id,
            reference = %receipt.reference_number,
            "VAT return filed"
        );
        Ok(receipt)
    }

    /// Ask the authority for the outcome of a filed return.
    ///
    /// `Pending` leaves the submission `Submitted`.
    #[instrument(skip(self, submission), fields(submission = %submission.id()))]
    pub async fn poll_status(&self, submission: &mut Submission) -> Result<SubmissionStatus> {
        if submission.status() != SubmissionStatus::Submitted {
            return Err(FinSyncError::InvalidState(format!(
                "submission {} is {}; only submitted returns can be polled",
                submission.id(),
                submission.status()
            )));
        }
        let authority_id = submission.submission_id().map(str::to_string).ok_or_else(|| {
            FinSyncError::InvalidState(format!(
                "submission {} has no authority identifier",
                submission.id()
            ))
        })?;

        let credential = self.tokens.ensure_valid().await?;
        let remote = self
            .with_timeout(self.authority.fetch_status(credential.access_token(), &authority_id))
            .await?;

        match remote {
            RemoteSubmissionStatus::Pending => {}
            RemoteSubmissionStatus::Accepted { reference_number } => {
                submission.mark_accepted(reference_number)?;
                info!(submission = %submission.id(), "VAT return accepted");
            }
            RemoteSubmissionStatus::Rejected { reason } => {
                warn!(submission = %submission.id(), %reason, "VAT return rejected");
                submission.mark_rejected(reason)?;
            }
        }
        Ok(submission.status())
    }

    /// User-facing line for a submission whose filing failed or was rejected.
    ///
    /// The authority's reason is reported verbatim, followed by the reference
    /// number once one has been assigned. `None` when there is nothing to
    /// report.
    pub fn failure_message(submission: &Submission, error: Option<&FinSyncError>) -> Option<String> {
        let reason = match error {
            Some(FinSyncError::Validation(reason)) => reason.clone(),
            Some(other) => other.user_message(),
            None => submission.rejection_reason()?.to_string(),
        };
        Some(match submission.reference_number() {
            Some(reference) => format!("{reason} (reference {reference})"),
            None => reason,
        })
    }

    async fn with_timeout<T>(
        &self,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let outcome = match tokio::time::timeout(self.request_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FinSyncError::Timeout(self.request_timeout.as_millis() as u64)),
        };
        if let Err(err) = &outcome {
            if err.is_authentication() {
                self.tokens.invalidate();
            }
        }
        outcome
    }
}
