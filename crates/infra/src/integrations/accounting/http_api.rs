//! REST transport shared by every accounting provider

use async_trait::async_trait;
use finsync_core::ProviderApi;
use finsync_domain::{
    CallError, ListRequest, ProviderId, ProviderResponse, ProviderTransaction, RecordError,
};
use reqwest::{header, Method, RequestBuilder};
use tracing::{debug, instrument};

use crate::errors::{call_error_for_status, call_error_for_transport};
use crate::http::HttpClient;

/// How a provider learns which organisation a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    None,
    /// Extra request header, e.g. `Xero-tenant-id`
    Header(String, String),
    /// Path segment inserted before the resource, e.g. a QuickBooks realm
    PathPrefix(String),
    /// Query parameter added to every call, e.g. Zoho's `organization_id`
    Query(String, String),
}

impl TenantScope {
    /// Scope for `provider` given the configured tenant id.
    pub fn for_provider(provider: ProviderId, tenant_id: Option<&str>) -> Self {
        let Some(tenant) = tenant_id.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::None;
        };
        match provider {
            ProviderId::Xero => Self::Header("Xero-tenant-id".into(), tenant.into()),
            ProviderId::QuickBooks => Self::PathPrefix(tenant.into()),
            ProviderId::ZohoBooks => Self::Query("organization_id".into(), tenant.into()),
            ProviderId::Sage | ProviderId::Sars => Self::None,
        }
    }
}

/// [`ProviderApi`] over JSON REST with bearer authentication.
pub struct HttpProviderApi {
    provider: ProviderId,
    base_url: String,
    http: HttpClient,
    tenant: TenantScope,
}

impl HttpProviderApi {
    pub fn new(
        provider: ProviderId,
        base_url: impl Into<String>,
        http: HttpClient,
        tenant: TenantScope,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { provider, base_url, http, tenant }
    }

    fn url(&self, resource: &str) -> String {
        let resource = resource.trim_start_matches('/');
        match &self.tenant {
            TenantScope::PathPrefix(prefix) => format!("{}/{prefix}/{resource}", self.base_url),
            _ => format!("{}/{resource}", self.base_url),
        }
    }

    fn authorized(&self, method: Method, resource: &str, access_token: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, self.url(resource))
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json");

        match &self.tenant {
            TenantScope::Header(name, value) => builder.header(name.as_str(), value.as_str()),
            TenantScope::Query(name, value) => builder.query(&[(name.as_str(), value.as_str())]),
            TenantScope::None | TenantScope::PathPrefix(_) => builder,
        }
    }
}

#[async_trait]
impl ProviderApi for HttpProviderApi {
    #[instrument(skip_all, fields(provider = %self.provider, reference = %record.reference))]
    async fn create(&self, access_token: &str, record: &ProviderTransaction) -> Result<(), CallError> {
        let request =
            self.authorized(Method::POST, &record.resource, access_token).json(&record.body);

        let response = self
            .http
            .send(request)
            .await
            .map_err(|err| CallError::Record(RecordError::transport(err.to_string())))?;
        let status = response.status();
        if status.is_success() {
            debug!(%status, "provider accepted record");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(call_error_for_status(self.provider, status, &body))
    }

    #[instrument(skip_all, fields(provider = %self.provider, resource = %request.resource))]
    async fn list(
        &self,
        access_token: &str,
        request: &ListRequest,
    ) -> Result<ProviderResponse, CallError> {
        let builder =
            self.authorized(Method::GET, &request.resource, access_token).query(&request.query);

        let response = self
            .http
            .send(builder)
            .await
            .map_err(|err| CallError::Record(RecordError::transport(err.to_string())))?;
        let status = response.status();
        let body = response.text().await.map_err(call_error_for_transport)?;
        if !status.is_success() {
            return Err(call_error_for_status(self.provider, status, &body));
        }

        serde_json::from_str(&body).map(ProviderResponse::new).map_err(|err| {
            CallError::Record(RecordError::transport(format!("unreadable list page: {err}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use finsync_domain::RecordErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client() -> HttpClient {
        HttpClient::builder()
            .timeout(Duration::from_secs(5))
            .base_backoff(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    fn record() -> ProviderTransaction {
        ProviderTransaction {
            provider_id: ProviderId::Xero,
            transaction_id: "tx-1".into(),
            reference: "INV-1".into(),
            resource: "BankTransactions".into(),
            body: json!({ "Reference": "INV-1" }),
        }
    }

    #[tokio::test]
    async fn create_sends_bearer_token_and_tenant_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api.xro/2.0/BankTransactions"))
            .and(header("authorization", "Bearer token-1"))
            .and(header("xero-tenant-id", "org-9"))
            .and(body_json(json!({ "Reference": "INV-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Status": "OK" })))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpProviderApi::new(
            ProviderId::Xero,
            format!("{}/api.xro/2.0/", server.uri()),
            client(),
            TenantScope::for_provider(ProviderId::Xero, Some("org-9")),
        );

        api.create("token-1", &record()).await.unwrap();
    }

    #[tokio::test]
    async fn create_classifies_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate reference"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let api = HttpProviderApi::new(ProviderId::Xero, server.uri(), client(), TenantScope::None);

        match api.create("token", &record()).await.unwrap_err() {
            CallError::Record(err) => {
                assert_eq!(err.kind, RecordErrorKind::Conflict);
                assert!(err.message.contains("duplicate reference"));
            }
            other => panic!("expected record error, got {other:?}"),
        }
        match api.create("token", &record()).await.unwrap_err() {
            CallError::Abort(err) => assert!(err.is_authentication()),
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_scopes_by_realm_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/company/realm-1/query"))
            .and(query_param("query", "SELECT * FROM JournalEntry"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "QueryResponse": {} })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/books/v3/banktransactions"))
            .and(query_param("organization_id", "777"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0 })))
            .mount(&server)
            .await;

        let quickbooks = HttpProviderApi::new(
            ProviderId::QuickBooks,
            format!("{}/v3/company", server.uri()),
            client(),
            TenantScope::for_provider(ProviderId::QuickBooks, Some("realm-1")),
        );
        let zoho = HttpProviderApi::new(
            ProviderId::ZohoBooks,
            format!("{}/books/v3", server.uri()),
            client(),
            TenantScope::for_provider(ProviderId::ZohoBooks, Some("777")),
        );

        let qb_page = quickbooks
            .list(
                "t",
                &ListRequest {
                    resource: "query".into(),
                    query: vec![("query".into(), "SELECT * FROM JournalEntry".into())],
                },
            )
            .await
            .unwrap();
        assert!(qb_page.body.get("QueryResponse").is_some());

        let zoho_page = zoho
            .list(
                "t",
                &ListRequest {
                    resource: "banktransactions".into(),
                    query: vec![("page".into(), "2".into())],
                },
            )
            .await
            .unwrap();
        assert_eq!(zoho_page.body["code"], 0);
    }

    #[tokio::test]
    async fn unreadable_page_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let api = HttpProviderApi::new(ProviderId::Sage, server.uri(), client(), TenantScope::None);
        let request = ListRequest { resource: "other_payments".into(), query: Vec::new() };

        match api.list("t", &request).await.unwrap_err() {
            CallError::Record(err) => assert_eq!(err.kind, RecordErrorKind::Transport),
            other => panic!("expected record error, got {other:?}"),
        }
    }

    #[test]
    fn blank_tenant_means_no_scope() {
        assert_eq!(TenantScope::for_provider(ProviderId::Xero, Some("  ")), TenantScope::None);
        assert_eq!(TenantScope::for_provider(ProviderId::Sage, Some("abc")), TenantScope::None);
    }
}
