//! OAuth 2.0 token endpoint over HTTP
//!
//! Posts `application/x-www-form-urlencoded` grants with the client id and
//! secret in the body and normalizes the JSON reply into a [`TokenSet`].

use std::sync::Arc;

use async_trait::async_trait;
use finsync_common::auth::{OAuthErrorBody, TokenResponse, TokenSet};
use finsync_common::time::Clock;
use finsync_core::{OAuthClient, TokenEndpoint};
use finsync_domain::constants::DEFAULT_TOKEN_LIFETIME_SECS;
use finsync_domain::{FinSyncError, Result};
use reqwest::{header, Method, StatusCode};
use tracing::{debug, instrument, warn};

use crate::errors::{error_for_status, InfraError};
use crate::http::HttpClient;

/// [`TokenEndpoint`] backed by [`HttpClient`].
pub struct HttpTokenEndpoint {
    http: HttpClient,
    clock: Arc<dyn Clock>,
}

impl HttpTokenEndpoint {
    pub fn new(http: HttpClient, clock: Arc<dyn Clock>) -> Self {
        Self { http, clock }
    }

    async fn post_grant(&self, client: &OAuthClient, form: &[(&str, &str)]) -> Result<TokenSet> {
        let request = self
            .http
            .request(Method::POST, client.token_url.as_str())
            .header(header::ACCEPT, "application/json")
            .form(form);

        let response = self.http.send(request).await?;
        let status = response.status();
        let received_at = self.clock.utc_now();
        let body = response.text().await.map_err(|e| FinSyncError::from(InfraError::from(e)))?;

        if !status.is_success() {
            return Err(grant_error(client, status, &body));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            FinSyncError::auth(client.provider_id, format!("unreadable token response: {e}"))
        })?;
        debug!(provider = %client.provider_id, "token endpoint issued tokens");

        Ok(TokenSet::from_response(parsed, received_at, DEFAULT_TOKEN_LIFETIME_SECS))
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    #[instrument(skip_all, fields(provider = %client.provider_id))]
    async fn exchange_code(
        &self,
        client: &OAuthClient,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet> {
        self.post_grant(
            client,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", client.redirect_uri.as_str()),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("code_verifier", code_verifier),
            ],
        )
        .await
    }

    #[instrument(skip_all, fields(provider = %client.provider_id))]
    async fn refresh(&self, client: &OAuthClient, refresh_token: &str) -> Result<TokenSet> {
        self.post_grant(
            client,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ],
        )
        .await
    }
}

/// 4xx from the token endpoint rejects the grant; anything else is transient.
fn grant_error(client: &OAuthClient, status: StatusCode, body: &str) -> FinSyncError {
    if status.is_client_error() {
        let message = match serde_json::from_str::<OAuthErrorBody>(body) {
            Ok(oauth) => format!("HTTP {}: {oauth}", status.as_u16()),
            Err(_) => format!("HTTP {}", status.as_u16()),
        };
        warn!(provider = %client.provider_id, %status, "token endpoint rejected grant");
        return FinSyncError::auth(client.provider_id, message);
    }
    error_for_status(client.provider_id, status, body)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use finsync_common::time::MockClock;
    use finsync_domain::ProviderId;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> OAuthClient {
        OAuthClient {
            provider_id: ProviderId::Xero,
            token_url: format!("{}/connect/token", server.uri()),
            client_id: "client-123".into(),
            client_secret: "secret-456".into(),
            redirect_uri: "http://127.0.0.1:8765/callback".into(),
        }
    }

    fn endpoint() -> (HttpTokenEndpoint, chrono::DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();
        let http = HttpClient::builder().max_attempts(1).build().unwrap();
        (HttpTokenEndpoint::new(http, Arc::new(MockClock::starting_at(now))), now)
    }

    #[tokio::test]
    async fn exchange_posts_form_and_normalizes_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier=verifier-abc"))
            .and(body_string_contains("client_secret=secret-456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "token_type": "Bearer",
                "expires_in": 1800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (endpoint, now) = endpoint();
        let tokens = endpoint.exchange_code(&client(&server), "code-1", "verifier-abc").await.unwrap();

        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(tokens.expires_at, now + ChronoDuration::seconds(1800));
    }

    #[tokio::test]
    async fn unauthorized_exchange_is_an_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "unknown client"
            })))
            .mount(&server)
            .await;

        let (endpoint, _) = endpoint();
        let err = endpoint.exchange_code(&client(&server), "code-1", "verifier").await.unwrap_err();

        assert!(err.is_authentication());
        assert!(err.to_string().contains("invalid_client"));
    }

    #[tokio::test]
    async fn refresh_sends_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-2",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let (endpoint, now) = endpoint();
        let tokens = endpoint.refresh(&client(&server), "old-refresh").await.unwrap();

        assert_eq!(tokens.access_token, "access-2");
        assert!(tokens.refresh_token.is_none());
        assert_eq!(tokens.expires_at, now + ChronoDuration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let (endpoint, _) = endpoint();
        let err = endpoint.refresh(&client(&server), "old-refresh").await.unwrap_err();

        assert!(matches!(err, FinSyncError::Transport(_)));
    }
}
