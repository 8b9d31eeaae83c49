//! Push and pull orchestration for accounting providers
//!
//! A push validates and translates records in input order, admits each
//! create call through the provider's rate limiter in that same order, and
//! pipelines up to `max_in_flight` calls. Outcomes are collected in input
//! order. Transport failures get one retry after a backoff; a 401 aborts the
//! whole batch.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use finsync_common::time::Clock;
use finsync_domain::constants::{
    DEFAULT_MAX_IN_FLIGHT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_BACKOFF_MS, MAX_PULL_PAGES,
};
use finsync_domain::{
    CallError, DateRange, FinSyncConfig, FinSyncError, ListRequest, ProviderId, ProviderResponse,
    ProviderTransaction, PullResult, RecordError, RecordErrorKind, Result, SyncRecordError,
    SyncResult, Transaction,
};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ports::TransactionLedger;
use super::registry::{ProviderChannel, ProviderRegistry};

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Create calls allowed in flight at once per push
    pub max_in_flight: usize,
    /// Deadline for a single provider call
    pub request_timeout: Duration,
    /// Pause before the single retry of a transport failure
    pub retry_backoff: Duration,
    /// Safety cap on pages read by one pull
    pub max_pages: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            max_pages: MAX_PULL_PAGES,
        }
    }
}

impl From<&FinSyncConfig> for SyncConfig {
    fn from(config: &FinSyncConfig) -> Self {
        Self {
            max_in_flight: config.max_in_flight.max(1),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_pages: MAX_PULL_PAGES,
        }
    }
}

/// A record after local validation and translation, ready to send
enum Staged {
    Invalid { transaction_id: String, reason: String },
    Ready(ProviderTransaction),
}

/// Per-record result; `Err` aborts the batch
type RecordOutcome = Result<Option<SyncRecordError>>;

pub struct SyncEngine {
    registry: ProviderRegistry,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(registry: ProviderRegistry, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        Self { registry, clock, config: SyncConfig { max_in_flight: config.max_in_flight.max(1), ..config } }
    }

    pub fn providers(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.registry.providers()
    }

    /// Push `transactions` to `provider`, isolating per-record failures.
    ///
    /// Fails as a whole only on authentication problems (before or during the
    /// batch) and on cancellation.
    #[instrument(skip(self, transactions, cancel), fields(provider = %provider, count = transactions.len()))]
    pub async fn push_batch(
        &self,
        provider: ProviderId,
        transactions: &[Transaction],
        cancel: &CancellationToken,
    ) -> Result<SyncResult> {
        let channel = self.registry.get(provider)?;

        if transactions.is_empty() {
            return Ok(SyncResult {
                provider_id: provider,
                attempted: 0,
                succeeded_count: 0,
                errors: Vec::new(),
                completed_at: self.clock.utc_now(),
            });
        }

        cancellable(cancel, channel.tokens.ensure_valid()).await?;
        info!(provider = %provider, count = transactions.len(), "Starting push");

        let outcomes = stream::iter(transactions)
            .then(|transaction| async move {
                if let Err(err) = transaction.validate() {
                    return Staged::Invalid {
                        transaction_id: transaction.id.clone(),
                        reason: err.to_string(),
                    };
                }
                let record = channel.adapter.to_wire(transaction);
                channel.limiter.acquire().await;
                Staged::Ready(record)
            })
            .map(|staged| async move {
                match staged {
                    Staged::Invalid { transaction_id, reason } => {
                        debug!(transaction_id = %transaction_id, %reason, "Record failed local validation");
                        Ok(Some(SyncRecordError::new(transaction_id, RecordError::validation(reason))))
                    }
                    Staged::Ready(record) => self.issue(channel, record).await,
                }
            })
            .buffered(self.config.max_in_flight);

        let mut outcomes = pin!(outcomes);
        let mut succeeded_count = 0;
        let mut errors = Vec::new();

        loop {
            let next: Option<RecordOutcome> = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(provider = %provider, "Push cancelled");
                    return Err(FinSyncError::Cancelled);
                }
                next = outcomes.next() => next,
            };

            match next {
                None => break,
                Some(Ok(None)) => succeeded_count += 1,
                Some(Ok(Some(failure))) => errors.push(failure),
                Some(Err(abort)) => {
                    warn!(provider = %provider, error = %abort, "Push aborted");
                    return Err(abort);
                }
            }
        }

        let result = SyncResult {
            provider_id: provider,
            attempted: transactions.len(),
            succeeded_count,
            errors,
            completed_at: self.clock.utc_now(),
        };
        info!(
            provider = %provider,
            attempted = result.attempted,
            succeeded = result.succeeded_count,
            failed = result.errors.len(),
            "Push finished"
        );
        Ok(result)
    }

    /// Read every remote record dated within `range`.
    #[instrument(skip(self, cancel), fields(provider = %provider))]
    pub async fn pull_range(
        &self,
        provider: ProviderId,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> Result<PullResult> {
        let channel = self.registry.get(provider)?;
        let mut result =
            PullResult { provider_id: provider, transactions: Vec::new(), dropped: 0, pages: 0 };

        let mut page = 1;
        loop {
            if page > self.config.max_pages {
                warn!(provider = %provider, max_pages = self.config.max_pages, "Pull stopped at page cap");
                break;
            }

            let request = channel.adapter.list_request(&range, page);
            let response = cancellable(cancel, self.fetch_page(channel, &request)).await?;
            result.pages += 1;

            let batch = channel.adapter.from_wire(&response);
            if batch.dropped > 0 {
                warn!(provider = %provider, page, dropped = batch.dropped, "Dropped malformed remote records");
            }
            result.dropped += batch.dropped;
            result
                .transactions
                .extend(batch.transactions.into_iter().filter(|t| range.contains(t.date)));

            if !channel.adapter.has_more(&response, page) {
                break;
            }
            page += 1;
        }

        info!(
            provider = %provider,
            pages = result.pages,
            records = result.transactions.len(),
            dropped = result.dropped,
            "Pull finished"
        );
        Ok(result)
    }

    /// Read the ledger for `range` and push it.
    pub async fn push_from_ledger(
        &self,
        provider: ProviderId,
        ledger: &dyn TransactionLedger,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> Result<SyncResult> {
        let transactions = cancellable(cancel, ledger.read(range.start, range.end)).await?;
        self.push_batch(provider, &transactions, cancel).await
    }

    /// Pull `range` and append the decoded records to the ledger.
    pub async fn pull_into_ledger(
        &self,
        provider: ProviderId,
        ledger: &dyn TransactionLedger,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> Result<PullResult> {
        let pulled = self.pull_range(provider, range, cancel).await?;
        if !pulled.transactions.is_empty() {
            ledger.append(&pulled.transactions).await?;
        }
        Ok(pulled)
    }

    async fn issue(&self, channel: &ProviderChannel, record: ProviderTransaction) -> RecordOutcome {
        let mut retried = false;

        loop {
            let credential = channel.tokens.ensure_valid().await?;
            let outcome = self
                .with_timeout(channel.api.create(credential.access_token(), &record))
                .await;

            match outcome {
                Ok(()) => {
                    debug!(transaction_id = %record.transaction_id, "Record synced");
                    return Ok(None);
                }
                Err(CallError::Abort(err)) => {
                    if err.is_authentication() {
                        channel.tokens.invalidate();
                    }
                    return Err(err);
                }
                Err(CallError::Record(err)) if err.is_retryable() && !retried => {
                    debug!(
                        transaction_id = %record.transaction_id,
                        error = %err.message,
                        "Transport failure, retrying once"
                    );
                    retried = true;
                    self.clock.sleep(self.config.retry_backoff).await;
                    channel.limiter.acquire().await;
                }
                Err(CallError::Record(err)) => {
                    warn!(
                        transaction_id = %record.transaction_id,
                        kind = ?err.kind,
                        error = %err.message,
                        "Record failed"
                    );
                    return Ok(Some(SyncRecordError::new(record.transaction_id.clone(), err)));
                }
            }
        }
    }

    async fn fetch_page(
        &self,
        channel: &ProviderChannel,
        request: &ListRequest,
    ) -> Result<ProviderResponse> {
        let mut retried = false;

        loop {
            let credential = channel.tokens.ensure_valid().await?;
            channel.limiter.acquire().await;

            match self.with_timeout(channel.api.list(credential.access_token(), request)).await {
                Ok(response) => return Ok(response),
                Err(CallError::Abort(err)) => {
                    if err.is_authentication() {
                        channel.tokens.invalidate();
                    }
                    return Err(err);
                }
                Err(CallError::Record(err)) if err.is_retryable() && !retried => {
                    debug!(resource = %request.resource, error = %err.message, "List failed, retrying once");
                    retried = true;
                    self.clock.sleep(self.config.retry_backoff).await;
                }
                Err(CallError::Record(err)) => {
                    let message = format!("listing {}: {}", request.resource, err.message);
                    return Err(match err.kind {
                        RecordErrorKind::Transport => FinSyncError::Transport(message),
                        RecordErrorKind::Validation | RecordErrorKind::Conflict => {
                            FinSyncError::Validation(message)
                        }
                    });
                }
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, CallError>>,
    ) -> std::result::Result<T, CallError> {
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CallError::Record(RecordError::transport(format!(
                "timed out after {} ms",
                self.config.request_timeout.as_millis()
            )))),
        }
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FinSyncError::Cancelled),
        result = operation => result,
    }
}
