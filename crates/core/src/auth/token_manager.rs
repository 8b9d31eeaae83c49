//! Per-provider OAuth token lifecycle
//!
//! ```text
//! Unauthenticated ──authenticate──► Authorizing ──► Authenticated
//!        ▲                              │                │ expiring / invalidated
//!        └──────── failure ◄────────────┴─── Refreshing ◄┘
//! ```
//!
//! At most one authorize or refresh runs per provider. The operation runs on
//! its own task and is shared through [`futures::future::Shared`]: concurrent
//! callers await the same result, and dropping a caller never cancels it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use finsync_common::auth::{validate_state, PkceChallenge, TokenSet};
use finsync_common::time::Clock;
use finsync_domain::constants::DEFAULT_REFRESH_MARGIN_SECS;
use finsync_domain::{
    Credential, FinSyncError, ProviderId, ProviderProfile, ProviderSettings, Result, TokenState,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::ports::{
    AccessTokenSource, AuthorizationFlow, AuthorizationRequest, CredentialStore, OAuthClient,
    TokenEndpoint,
};

/// Tuning for a [`TokenManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenManagerConfig {
    /// Refresh when the access token expires within this margin
    pub refresh_margin: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self { refresh_margin: Duration::from_secs(DEFAULT_REFRESH_MARGIN_SECS) }
    }
}

/// Collaborators shared by every provider's token manager
#[derive(Clone)]
pub struct AuthPorts {
    pub store: Arc<dyn CredentialStore>,
    pub endpoint: Arc<dyn TokenEndpoint>,
    pub flow: Arc<dyn AuthorizationFlow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Authorize,
    Refresh,
}

type SharedCredential = Shared<BoxFuture<'static, Result<Credential>>>;

struct InFlight {
    operation: Operation,
    future: SharedCredential,
}

#[derive(Default)]
struct Inner {
    state: TokenState,
    credential: Option<Credential>,
    /// Set after the provider rejected the held access token
    stale: bool,
    /// Bumped by every new operation and by logout; stale tasks do not apply
    generation: u64,
    in_flight: Option<InFlight>,
}

/// Handle a running operation uses to check it has not been superseded
#[derive(Clone)]
struct Generation {
    inner: Arc<Mutex<Inner>>,
    value: u64,
}

impl Generation {
    fn is_current(&self) -> bool {
        self.inner.lock().generation == self.value
    }
}

struct Context {
    provider: ProviderId,
    client: OAuthClient,
    authorize_url: String,
    scope: String,
    ports: AuthPorts,
    clock: Arc<dyn Clock>,
    config: TokenManagerConfig,
}

impl Context {
    fn margin(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.refresh_margin)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS as i64))
    }

    fn credential_from(&self, tokens: TokenSet) -> Result<Credential> {
        Credential::authenticated(
            self.provider,
            tokens.access_token,
            tokens.refresh_token,
            tokens.expires_at,
        )
    }

    async fn persist(&self, generation: &Generation, credential: &Credential) -> Result<()> {
        if !generation.is_current() {
            debug!(provider = %self.provider, "Token operation superseded, not persisting");
            return Err(FinSyncError::Cancelled);
        }
        self.ports.store.set(credential).await
    }
}

/// Transport problems while talking to the authorization server still mean
/// the caller is not authenticated.
fn escalate(provider: ProviderId, err: FinSyncError) -> FinSyncError {
    match err {
        FinSyncError::Authentication { .. } | FinSyncError::Cancelled => err,
        other => FinSyncError::auth(provider, other.to_string()),
    }
}

/// OAuth state machine for one provider
pub struct TokenManager {
    ctx: Arc<Context>,
    inner: Arc<Mutex<Inner>>,
}

impl TokenManager {
    pub fn new(
        profile: &ProviderProfile,
        settings: &ProviderSettings,
        ports: AuthPorts,
        clock: Arc<dyn Clock>,
        config: TokenManagerConfig,
    ) -> Result<Self> {
        settings.validate(profile.provider_id)?;

        let client = OAuthClient {
            provider_id: profile.provider_id,
            token_url: profile.token_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
        };

        Ok(Self {
            ctx: Arc::new(Context {
                provider: profile.provider_id,
                client,
                authorize_url: profile.authorize_url.clone(),
                scope: profile.scope.clone(),
                ports,
                clock,
                config,
            }),
            inner: Arc::new(Mutex::new(Inner::default())),
        })
    }

    pub fn provider(&self) -> ProviderId {
        self.ctx.provider
    }

    pub fn state(&self) -> TokenState {
        self.inner.lock().state
    }

    /// Credential currently held in memory
    pub fn credential(&self) -> Option<Credential> {
        self.inner.lock().credential.clone()
    }

    /// Run the authorization-code flow and store the resulting credential.
    ///
    /// Joins an authorization already in progress. A refresh in progress is
    /// awaited first, then a new authorization starts.
    pub async fn authenticate(&self) -> Result<Credential> {
        loop {
            let (future, joined_refresh) = {
                let mut inner = self.inner.lock();
                let existing =
                    inner.in_flight.as_ref().map(|f| (f.operation, f.future.clone()));
                match existing {
                    Some((Operation::Authorize, future)) => (future, false),
                    Some((Operation::Refresh, future)) => (future, true),
                    None => {
                        inner.credential = None;
                        inner.stale = false;
                        let ctx = Arc::clone(&self.ctx);
                        let future = self.start(&mut inner, Operation::Authorize, move |generation| {
                            authorize(ctx, generation)
                        });
                        (future, false)
                    }
                }
            };

            let result = future.await;
            if !joined_refresh {
                return result;
            }
        }
    }

    /// Return a credential valid for at least the refresh margin.
    ///
    /// Restores from the credential store when nothing is held in memory and
    /// refreshes when the held token is expiring or was invalidated.
    pub async fn ensure_valid(&self) -> Result<Credential> {
        let future = {
            let mut inner = self.inner.lock();
            let joined = inner.in_flight.as_ref().map(|f| f.future.clone());
            if let Some(future) = joined {
                future
            } else {
                let now = self.ctx.clock.utc_now();
                if let Some(credential) = &inner.credential {
                    if !inner.stale && !credential.is_expiring(now, self.ctx.margin()) {
                        return Ok(credential.clone());
                    }
                }

                let current = inner.credential.take();
                let force = std::mem::take(&mut inner.stale);
                let ctx = Arc::clone(&self.ctx);
                self.start(&mut inner, Operation::Refresh, move |generation| {
                    refresh(ctx, generation, current, force)
                })
            }
        };

        future.await
    }

    /// Forget the credential locally and in the store.
    pub async fn logout(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.in_flight = None;
            inner.credential = None;
            inner.stale = false;
            inner.state = TokenState::Unauthenticated;
        }
        self.ctx.ports.store.clear(self.ctx.provider).await?;
        info!(provider = %self.ctx.provider, "Logged out");
        Ok(())
    }

    fn start<F, Fut>(&self, inner: &mut Inner, operation: Operation, task: F) -> SharedCredential
    where
        F: FnOnce(Generation) -> Fut,
        Fut: Future<Output = Result<Credential>> + Send + 'static,
    {
        inner.generation += 1;
        let generation = Generation { inner: Arc::clone(&self.inner), value: inner.generation };
        inner.state = match operation {
            Operation::Authorize => TokenState::Authorizing,
            Operation::Refresh => TokenState::Refreshing,
        };

        let settle = generation.clone();
        let work = task(generation);
        let handle = tokio::spawn(async move {
            let result = work.await;
            let mut inner = settle.inner.lock();
            if inner.generation == settle.value {
                inner.in_flight = None;
                match &result {
                    Ok(credential) => {
                        inner.credential = Some(credential.clone());
                        inner.state = TokenState::Authenticated;
                    }
                    Err(_) => {
                        inner.credential = None;
                        inner.state = TokenState::Unauthenticated;
                    }
                }
            }
            result
        });

        let provider = self.ctx.provider;
        let future = async move {
            handle.await.unwrap_or_else(|e| {
                Err(FinSyncError::Internal(format!("token task for {provider} failed: {e}")))
            })
        }
        .boxed()
        .shared();

        inner.in_flight = Some(InFlight { operation, future: future.clone() });
        future
    }
}

#[async_trait::async_trait]
impl AccessTokenSource for TokenManager {
    fn provider(&self) -> ProviderId {
        self.ctx.provider
    }

    async fn ensure_valid(&self) -> Result<Credential> {
        TokenManager::ensure_valid(self).await
    }

    fn invalidate(&self) {
        let mut inner = self.inner.lock();
        if inner.credential.is_some() {
            debug!(provider = %self.ctx.provider, "Access token invalidated");
            inner.stale = true;
        }
    }
}

async fn authorize(ctx: Arc<Context>, generation: Generation) -> Result<Credential> {
    let provider = ctx.provider;
    let pkce = PkceChallenge::generate();
    let request = AuthorizationRequest {
        provider_id: provider,
        authorize_url: ctx.authorize_url.clone(),
        client_id: ctx.client.client_id.clone(),
        redirect_uri: ctx.client.redirect_uri.clone(),
        scope: ctx.scope.clone(),
        state: pkce.state.clone(),
        code_challenge: pkce.code_challenge.clone(),
    };

    info!(provider = %provider, "Starting authorization");
    let grant = ctx.ports.flow.authorize(&request).await.map_err(|e| escalate(provider, e))?;

    if !validate_state(&request.state, &grant.state) {
        warn!(provider = %provider, "Authorization callback state mismatch");
        return Err(FinSyncError::auth(provider, "authorization state mismatch"));
    }
    if grant.code.trim().is_empty() {
        return Err(FinSyncError::auth(provider, "authorization returned no code"));
    }

    let tokens = ctx
        .ports
        .endpoint
        .exchange_code(&ctx.client, &grant.code, &pkce.code_verifier)
        .await
        .map_err(|e| {
            warn!(provider = %provider, error = %e, "Authorization code exchange failed");
            escalate(provider, e)
        })?;

    let credential = ctx.credential_from(tokens)?;
    ctx.persist(&generation, &credential).await?;

    info!(
        provider = %provider,
        expires_at = %credential.expires_at(),
        "Authenticated"
    );
    Ok(credential)
}

async fn refresh(
    ctx: Arc<Context>,
    generation: Generation,
    current: Option<Credential>,
    force: bool,
) -> Result<Credential> {
    let provider = ctx.provider;

    let current = match current {
        Some(credential) => credential,
        None => match ctx.ports.store.get(provider).await? {
            Some(stored) if stored.provider_id() == provider => {
                stored.validate()?;
                debug!(provider = %provider, "Restored credential from store");
                stored
            }
            Some(_) => {
                return Err(FinSyncError::Storage(format!(
                    "stored credential for {provider} belongs to another provider"
                )))
            }
            None => return Err(FinSyncError::auth(provider, "not connected")),
        },
    };

    if !force && !current.is_expiring(ctx.clock.utc_now(), ctx.margin()) {
        return Ok(current);
    }

    let Some(refresh_token) = current.refresh_token() else {
        return Err(FinSyncError::auth(provider, "access token expired and no refresh token was issued"));
    };

    debug!(provider = %provider, forced = force, "Refreshing access token");
    let tokens = match ctx.ports.endpoint.refresh(&ctx.client, refresh_token).await {
        Ok(tokens) => tokens,
        Err(err) => {
            warn!(provider = %provider, error = %err, "Token refresh failed");
            // A rejected grant will never refresh again; keep the stored
            // credential only when the server could not be reached.
            if err.is_authentication() {
                if let Err(clear_err) = ctx.ports.store.clear(provider).await {
                    warn!(provider = %provider, error = %clear_err, "Failed to clear revoked credential");
                }
            }
            return Err(escalate(provider, err));
        }
    };

    let credential = ctx.credential_from(tokens.or_refresh_token(Some(refresh_token)))?;
    ctx.persist(&generation, &credential).await?;

    info!(provider = %provider, expires_at = %credential.expires_at(), "Access token refreshed");
    Ok(credential)
}
