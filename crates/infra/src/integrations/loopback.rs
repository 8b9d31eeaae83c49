//! Loopback redirect receiver for the authorization-code flow
//!
//! Binds the host/port of the configured redirect URI, hands the authorize URL
//! to an opener (a browser launcher in the host application) and waits for
//! the provider to redirect back with `code` and `state`. The `state` is
//! checked by the token manager, not here.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use finsync_core::{AuthorizationFlow, AuthorizationGrant, AuthorizationRequest};
use finsync_domain::{FinSyncError, ProviderId, Result};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use url::Url;

/// Default time the user has to finish signing in.
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);

type Opener = Arc<dyn Fn(&Url) -> Result<()> + Send + Sync>;
type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<HashMap<String, String>>>>>;

/// [`AuthorizationFlow`] that receives the redirect on a local HTTP listener.
pub struct LoopbackAuthorizationFlow {
    timeout: Duration,
    opener: Opener,
}

impl Default for LoopbackAuthorizationFlow {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHORIZATION_TIMEOUT)
    }
}

impl LoopbackAuthorizationFlow {
    /// Flow that only logs the authorize URL; pair with [`Self::with_opener`]
    /// to launch a browser.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            opener: Arc::new(|url: &Url| {
                info!(%url, "open this URL to authorize");
                Ok(())
            }),
        }
    }

    pub fn with_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&Url) -> Result<()> + Send + Sync + 'static,
    {
        self.opener = Arc::new(opener);
        self
    }
}

#[async_trait]
impl AuthorizationFlow for LoopbackAuthorizationFlow {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationGrant> {
        let provider = request.provider_id;
        let (addr, callback_path) = loopback_target(provider, &request.redirect_uri)?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            FinSyncError::Transport(format!("failed to bind OAuth loopback listener on {addr}: {e}"))
        })?;

        let (callback_tx, callback_rx) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(callback_tx)));
        let app = Router::new().route(
            &callback_path,
            get(move |query: Query<HashMap<String, String>>| handle_callback(query, slot.clone())),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
                error!(error = %err, "OAuth loopback listener failed");
            }
        });

        let outcome = match (self.opener)(&request.url()?) {
            Ok(()) => tokio::time::timeout(self.timeout, callback_rx).await,
            Err(err) => {
                let _ = shutdown_tx.send(());
                let _ = server.await;
                return Err(err);
            }
        };

        let _ = shutdown_tx.send(());
        if let Err(err) = server.await {
            warn!(error = %err, "OAuth loopback listener did not shut down cleanly");
        }

        let params = match outcome {
            Ok(Ok(params)) => params,
            Ok(Err(_)) => {
                return Err(FinSyncError::Internal("OAuth loopback listener stopped early".into()))
            }
            Err(_) => {
                return Err(FinSyncError::auth(
                    provider,
                    format!("no authorization received within {}s", self.timeout.as_secs()),
                ))
            }
        };

        grant_from_params(provider, params)
    }
}

fn loopback_target(provider: ProviderId, redirect_uri: &str) -> Result<(SocketAddr, String)> {
    let url = Url::parse(redirect_uri).map_err(|e| {
        FinSyncError::Config(format!("{provider}: invalid redirect_uri {redirect_uri}: {e}"))
    })?;

    let ip: IpAddr = match url.host_str() {
        Some("localhost") | Some("127.0.0.1") => [127, 0, 0, 1].into(),
        Some("[::1]") => Ipv6Addr::LOCALHOST.into(),
        _ => {
            return Err(FinSyncError::Config(format!(
                "{provider}: redirect_uri {redirect_uri} is not a loopback address"
            )))
        }
    };
    let port = url.port_or_known_default().unwrap_or(80);

    Ok((SocketAddr::new(ip, port), url.path().to_string()))
}

fn grant_from_params(
    provider: ProviderId,
    mut params: HashMap<String, String>,
) -> Result<AuthorizationGrant> {
    if let Some(error) = params.remove("error") {
        let detail = params.remove("error_description").unwrap_or_default();
        return Err(FinSyncError::auth(provider, format!("authorization denied: {error} {detail}")));
    }

    match (params.remove("code"), params.remove("state")) {
        (Some(code), Some(state)) if !code.is_empty() => Ok(AuthorizationGrant { code, state }),
        _ => Err(FinSyncError::auth(provider, "authorization callback missing code or state")),
    }
}

async fn handle_callback(
    Query(params): Query<HashMap<String, String>>,
    slot: CallbackSlot,
) -> Html<&'static str> {
    let accepted = params.contains_key("code") && !params.contains_key("error");

    if let Some(sender) = slot.lock().take() {
        let _ = sender.send(params);
    }

    if accepted {
        Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window.</p></body>
</html>"#,
        )
    } else {
        Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>Return to the application and try again.</p></body>
</html>"#,
        )
    }
}
