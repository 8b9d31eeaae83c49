//! Port interfaces for provider authentication

use async_trait::async_trait;
use finsync_common::auth::TokenSet;
use finsync_domain::{Credential, FinSyncError, ProviderId, Result};
use url::Url;

/// Scoped persistence of one credential per provider
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored credential, if any
    async fn get(&self, provider: ProviderId) -> Result<Option<Credential>>;

    /// Replace the stored credential
    async fn set(&self, credential: &Credential) -> Result<()>;

    /// Remove the stored credential (no-op when absent)
    async fn clear(&self, provider: ProviderId) -> Result<()>;
}

/// Everything the user agent needs to start an authorization-code flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub provider_id: ProviderId,
    pub authorize_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    /// Anti-replay value the callback must echo back
    pub state: String,
    pub code_challenge: String,
}

impl AuthorizationRequest {
    /// Full authorize URL with the query parameters appended
    pub fn url(&self) -> Result<Url> {
        Url::parse_with_params(
            &self.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.scope.as_str()),
                ("state", self.state.as_str()),
                ("code_challenge", self.code_challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| {
            FinSyncError::Config(format!(
                "invalid authorize URL for {}: {e}",
                self.provider_id.display_name()
            ))
        })
    }
}

/// Authorization code and the `state` the provider sent back with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub state: String,
}

/// External user-agent step of the authorization-code flow
///
/// Implementations open a browser, listen on a loopback redirect, or (in
/// tests) answer immediately.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationGrant>;
}

/// OAuth client identity used at the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClient {
    pub provider_id: ProviderId,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("provider_id", &self.provider_id)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Provider token endpoint
///
/// A rejected grant is reported as `FinSyncError::Authentication`; network
/// problems as `Transport`/`Timeout`. The token manager escalates the latter
/// to authentication failures.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(
        &self,
        client: &OAuthClient,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet>;

    async fn refresh(&self, client: &OAuthClient, refresh_token: &str) -> Result<TokenSet>;
}

/// Source of a currently valid credential for one provider
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Valid credential, refreshing first when close to expiry
    async fn ensure_valid(&self) -> Result<Credential>;

    /// Mark the held access token as unusable (for example after a 401)
    fn invalidate(&self);
}
