//! In-memory implementations of the core ports.
//!
//! Each fake records how it was called so tests can assert on traffic as
//! well as on results.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use finsync_common::auth::TokenSet;
use finsync_core::auth::ports::{
    AccessTokenSource, AuthorizationFlow, AuthorizationGrant, AuthorizationRequest,
    CredentialStore, OAuthClient, TokenEndpoint,
};
use finsync_core::sync::ports::{FormatAdapter, ProviderApi, TransactionLedger};
use finsync_core::vat::ports::TaxAuthorityApi;
use finsync_core::SubmissionPayload;
use finsync_domain::{
    CallError, Credential, DateRange, DecodedBatch, Direction, FinSyncError, ListRequest, Money,
    ProviderId, ProviderResponse, ProviderTransaction, RemoteSubmissionStatus, Result,
    SubmissionReceipt, Transaction, VatRate,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Credential store backed by a map, counting writes and clears.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<ProviderId, Credential>>,
    pub writes: AtomicUsize,
    pub clears: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn with(credential: Credential) -> Self {
        let store = Self::default();
        store.entries.lock().insert(credential.provider_id(), credential);
        store
    }

    pub fn stored(&self, provider: ProviderId) -> Option<Credential> {
        self.entries.lock().get(&provider).cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, provider: ProviderId) -> Result<Option<Credential>> {
        Ok(self.stored(provider))
    }

    async fn set(&self, credential: &Credential) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().insert(credential.provider_id(), credential.clone());
        Ok(())
    }

    async fn clear(&self, provider: ProviderId) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().remove(&provider);
        Ok(())
    }
}

/// Token endpoint answering from queued responses.
///
/// Refresh calls wait `latency` first so concurrent callers overlap.
pub struct ScriptedTokenEndpoint {
    exchanges: Mutex<VecDeque<Result<TokenSet>>>,
    refreshes: Mutex<VecDeque<Result<TokenSet>>>,
    latency: Duration,
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub verifiers: Mutex<Vec<String>>,
}

impl ScriptedTokenEndpoint {
    pub fn new() -> Self {
        Self {
            exchanges: Mutex::new(VecDeque::new()),
            refreshes: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            verifiers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn on_exchange(self, result: Result<TokenSet>) -> Self {
        self.exchanges.lock().push_back(result);
        self
    }

    pub fn on_refresh(self, result: Result<TokenSet>) -> Self {
        self.refreshes.lock().push_back(result);
        self
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for ScriptedTokenEndpoint {
    async fn exchange_code(
        &self,
        client: &OAuthClient,
        _code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.verifiers.lock().push(code_verifier.to_string());
        let next = self.exchanges.lock().pop_front();
        next.unwrap_or_else(|| Err(FinSyncError::auth(client.provider_id, "no scripted exchange")))
    }

    async fn refresh(&self, client: &OAuthClient, _refresh_token: &str) -> Result<TokenSet> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.refreshes.lock().pop_front();
        next.unwrap_or_else(|| Err(FinSyncError::auth(client.provider_id, "no scripted refresh")))
    }
}

pub fn token_set(access: &str, refresh: Option<&str>, expires_at: DateTime<Utc>) -> TokenSet {
    TokenSet {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        token_type: "Bearer".into(),
        expires_at,
        scope: None,
    }
}

/// Authorization flow that approves immediately.
///
/// Echoes the request's `state` unless `forged_state` is set.
#[derive(Default)]
pub struct InstantFlow {
    pub forged_state: Option<String>,
    pub requests: Mutex<Vec<AuthorizationRequest>>,
}

impl InstantFlow {
    pub fn forging(state: &str) -> Self {
        Self { forged_state: Some(state.to_string()), ..Self::default() }
    }
}

#[async_trait]
impl AuthorizationFlow for InstantFlow {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationGrant> {
        self.requests.lock().push(request.clone());
        Ok(AuthorizationGrant {
            code: "auth-code".into(),
            state: self.forged_state.clone().unwrap_or_else(|| request.state.clone()),
        })
    }
}

/// Token source handing out a fixed credential.
pub struct StaticTokenSource {
    provider: ProviderId,
    credential: Credential,
    failure: Mutex<Option<FinSyncError>>,
    pub ensure_calls: AtomicUsize,
    pub invalidations: AtomicUsize,
}

impl StaticTokenSource {
    pub fn new(credential: Credential) -> Self {
        Self {
            provider: credential.provider_id(),
            credential,
            failure: Mutex::new(None),
            ensure_calls: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        }
    }

    pub fn failing(self, err: FinSyncError) -> Self {
        *self.failure.lock() = Some(err);
        self
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    async fn ensure_valid(&self) -> Result<Credential> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        Ok(self.credential.clone())
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Minimal adapter with a flat JSON shape.
///
/// Pages are `{"items": [...], "has_more": bool}`; records carry the amount
/// in cents under `amount`.
pub struct FlatAdapter {
    pub provider: ProviderId,
}

impl FormatAdapter for FlatAdapter {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn to_wire(&self, transaction: &Transaction) -> ProviderTransaction {
        ProviderTransaction {
            provider_id: self.provider,
            transaction_id: transaction.id.clone(),
            reference: transaction.reference.clone(),
            resource: "transactions".into(),
            body: json!({
                "id": transaction.id,
                "date": transaction.date.to_string(),
                "reference": transaction.reference,
                "amount": transaction.amount.cents(),
                "direction": transaction.direction.to_string(),
                "vat": transaction.vat_amount.map(|v| v.cents()),
            }),
        }
    }

    fn from_wire(&self, response: &ProviderResponse) -> DecodedBatch {
        let mut batch = DecodedBatch::default();
        let items = response.body["items"].as_array().cloned().unwrap_or_default();
        for item in items {
            match decode(&item) {
                Some(transaction) => batch.transactions.push(transaction),
                None => batch.dropped += 1,
            }
        }
        batch
    }

    fn list_request(&self, range: &DateRange, page: u32) -> ListRequest {
        ListRequest {
            resource: "transactions".into(),
            query: vec![
                ("from".into(), range.start.to_string()),
                ("to".into(), range.end.to_string()),
                ("page".into(), page.to_string()),
            ],
        }
    }

    fn has_more(&self, response: &ProviderResponse, _page: u32) -> bool {
        response.body["has_more"].as_bool().unwrap_or(false)
    }

    fn envelope(&self, bodies: Vec<Value>) -> ProviderResponse {
        ProviderResponse::new(json!({ "items": bodies, "has_more": false }))
    }
}

fn decode(item: &Value) -> Option<Transaction> {
    let id = item["id"].as_str()?.to_string();
    let date: NaiveDate = item["date"].as_str()?.parse().ok()?;
    Some(Transaction {
        id,
        date,
        description: String::new(),
        amount: Money::from_cents(item["amount"].as_i64()?),
        direction: item["direction"].as_str()?.parse().ok()?,
        category: "sales".into(),
        account: "bank".into(),
        reference: item["reference"].as_str()?.to_string(),
        vat_amount: item["vat"].as_i64().map(Money::from_cents),
        vat_rate: VatRate::STANDARD,
    })
}

pub fn wire_record(id: &str, date: &str, cents: i64) -> Value {
    json!({
        "id": id,
        "date": date,
        "reference": format!("REF-{id}"),
        "amount": cents,
        "direction": Direction::Income.to_string(),
    })
}

/// Provider API replaying scripted outcomes per reference.
///
/// References with no script succeed. List pages are served by index.
#[derive(Default)]
pub struct ScriptedProviderApi {
    outcomes: Mutex<HashMap<String, VecDeque<std::result::Result<(), CallError>>>>,
    pages: Mutex<VecDeque<std::result::Result<ProviderResponse, CallError>>>,
    pub created: Mutex<Vec<String>>,
    pub attempts: Mutex<Vec<String>>,
    pub list_calls: AtomicUsize,
}

impl ScriptedProviderApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(self, reference: &str, outcome: std::result::Result<(), CallError>) -> Self {
        self.outcomes.lock().entry(reference.to_string()).or_default().push_back(outcome);
        self
    }

    pub fn with_page(self, page: std::result::Result<ProviderResponse, CallError>) -> Self {
        self.pages.lock().push_back(page);
        self
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl ProviderApi for ScriptedProviderApi {
    async fn create(
        &self,
        _access_token: &str,
        record: &ProviderTransaction,
    ) -> std::result::Result<(), CallError> {
        self.attempts.lock().push(record.reference.clone());
        let scripted = self.outcomes.lock().get_mut(&record.reference).and_then(VecDeque::pop_front);
        let outcome = scripted.unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.created.lock().push(record.reference.clone());
        }
        outcome
    }

    async fn list(
        &self,
        _access_token: &str,
        _request: &ListRequest,
    ) -> std::result::Result<ProviderResponse, CallError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.pages.lock().pop_front();
        next.unwrap_or_else(|| Ok(ProviderResponse::new(json!({ "items": [], "has_more": false }))))
    }
}

/// Ledger held in memory.
#[derive(Default)]
pub struct MemoryLedger {
    pub entries: Mutex<Vec<Transaction>>,
}

impl MemoryLedger {
    pub fn seeded(transactions: Vec<Transaction>) -> Self {
        Self { entries: Mutex::new(transactions) }
    }
}

#[async_trait]
impl TransactionLedger for MemoryLedger {
    async fn read(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|t| t.date >= start && t.date <= end)
            .cloned()
            .collect())
    }

    async fn append(&self, transactions: &[Transaction]) -> Result<()> {
        self.entries.lock().extend_from_slice(transactions);
        Ok(())
    }
}

/// Tax authority answering from queued results.
#[derive(Default)]
pub struct ScriptedTaxAuthority {
    filings: Mutex<VecDeque<Result<SubmissionReceipt>>>,
    statuses: Mutex<VecDeque<Result<RemoteSubmissionStatus>>>,
    pub payloads: Mutex<Vec<SubmissionPayload>>,
}

impl ScriptedTaxAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_file(self, result: Result<SubmissionReceipt>) -> Self {
        self.filings.lock().push_back(result);
        self
    }

    pub fn on_status(self, result: Result<RemoteSubmissionStatus>) -> Self {
        self.statuses.lock().push_back(result);
        self
    }

    pub fn filings(&self) -> usize {
        self.payloads.lock().len()
    }
}

#[async_trait]
impl TaxAuthorityApi for ScriptedTaxAuthority {
    async fn file_return(
        &self,
        _access_token: &str,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt> {
        self.payloads.lock().push(payload.clone());
        let next = self.filings.lock().pop_front();
        next.unwrap_or_else(|| Err(FinSyncError::Transport("no scripted filing".into())))
    }

    async fn fetch_status(
        &self,
        _access_token: &str,
        _submission_id: &str,
    ) -> Result<RemoteSubmissionStatus> {
        let next = self.statuses.lock().pop_front();
        next.unwrap_or(Ok(RemoteSubmissionStatus::Pending))
    }
}
