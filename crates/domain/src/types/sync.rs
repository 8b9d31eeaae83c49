//! Wire payloads and aggregate sync outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{RecordError, RecordErrorKind};
use crate::types::{ProviderId, Transaction};

/// One record translated into a provider's request shape.
///
/// Transient: built by a format adapter, consumed by the provider API within
/// the same push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderTransaction {
    pub provider_id: ProviderId,
    pub transaction_id: String,
    pub reference: String,
    /// Resource path relative to the provider's API base URL.
    pub resource: String,
    pub body: serde_json::Value,
}

/// Read request for one page of remote records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub resource: String,
    pub query: Vec<(String, String)>,
}

/// Raw JSON page returned by a provider list call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub body: serde_json::Value,
}

impl ProviderResponse {
    pub fn new(body: serde_json::Value) -> Self {
        Self { body }
    }
}

/// Result of decoding a provider page: the usable records plus how many were
/// dropped as malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBatch {
    pub transactions: Vec<Transaction>,
    pub dropped: usize,
}

/// Identity and reason for one failed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecordError {
    pub transaction_id: String,
    pub kind: RecordErrorKind,
    pub reason: String,
}

impl SyncRecordError {
    pub fn new(transaction_id: impl Into<String>, error: RecordError) -> Self {
        Self { transaction_id: transaction_id.into(), kind: error.kind, reason: error.message }
    }
}

/// Aggregate outcome of one push against one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub provider_id: ProviderId,
    pub attempted: usize,
    pub succeeded_count: usize,
    /// Failures in the order the records were supplied.
    pub errors: Vec<SyncRecordError>,
    pub completed_at: DateTime<Utc>,
}

impl SyncResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Ids of the records a caller should retry.
    #[must_use]
    pub fn failed_ids(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.transaction_id.as_str()).collect()
    }

    /// "N of M synced, K failed" line for the UI.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} of {} synced to {}, {} failed",
            self.succeeded_count,
            self.attempted,
            self.provider_id.display_name(),
            self.errors.len()
        )
    }
}

/// Records read back from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    pub provider_id: ProviderId,
    pub transactions: Vec<Transaction>,
    /// Remote records skipped because they could not be decoded.
    pub dropped: usize,
    pub pages: u32,
}
