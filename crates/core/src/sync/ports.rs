//! Port interfaces for sync operations

use async_trait::async_trait;
use chrono::NaiveDate;
use finsync_domain::{
    CallError, DateRange, DecodedBatch, ListRequest, ProviderId, ProviderResponse,
    ProviderTransaction, Result, Transaction,
};

/// Bidirectional translator between [`Transaction`] and one provider's schema
///
/// Implementations are pure: `to_wire` yields the same payload for the same
/// transaction, and `from_wire` never fails a whole page because of one bad
/// record.
pub trait FormatAdapter: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Create request for one record
    fn to_wire(&self, transaction: &Transaction) -> ProviderTransaction;

    /// Decode one list page, dropping and counting malformed records
    fn from_wire(&self, response: &ProviderResponse) -> DecodedBatch;

    /// List request for `page` (1-based) of records dated within `range`
    fn list_request(&self, range: &DateRange, page: u32) -> ListRequest;

    /// Whether another page follows `page`
    fn has_more(&self, response: &ProviderResponse, page: u32) -> bool;

    /// Wrap record bodies the way the provider's list endpoint returns them
    fn envelope(&self, bodies: Vec<serde_json::Value>) -> ProviderResponse;
}

/// Resource endpoints of one accounting provider
///
/// `CallError::Abort` is reserved for failures that invalidate the whole
/// operation (HTTP 401); everything else is a per-record [`CallError::Record`].
#[async_trait]
pub trait ProviderApi: Send + Sync {
    async fn create(
        &self,
        access_token: &str,
        record: &ProviderTransaction,
    ) -> std::result::Result<(), CallError>;

    async fn list(
        &self,
        access_token: &str,
        request: &ListRequest,
    ) -> std::result::Result<ProviderResponse, CallError>;
}

/// Local transaction ledger owned by the host application
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Transactions dated within `start..=end`
    async fn read(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>>;

    async fn append(&self, transactions: &[Transaction]) -> Result<()>;
}
