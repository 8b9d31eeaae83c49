//! SARS eFiling VAT201 client

use async_trait::async_trait;
use finsync_core::{SubmissionPayload, TaxAuthorityApi};
use finsync_domain::{
    FinSyncError, Money, ProviderId, RemoteSubmissionStatus, Result, SubmissionReceipt,
};
use reqwest::{header, Method, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::errors::{error_for_status, InfraError};
use crate::http::HttpClient;

const RETURNS_PATH: &str = "vat/returns";

/// [`TaxAuthorityApi`] for the eFiling REST gateway.
pub struct HttpTaxAuthority {
    base_url: String,
    http: HttpClient,
}

impl HttpTaxAuthority {
    pub fn new(base_url: impl Into<String>, http: HttpClient) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }
}

#[async_trait]
impl TaxAuthorityApi for HttpTaxAuthority {
    #[instrument(skip_all, fields(period = %payload.period))]
    async fn file_return(
        &self,
        access_token: &str,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt> {
        let request = self
            .http
            .request(Method::POST, format!("{}/{RETURNS_PATH}", self.base_url))
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .json(&WireReturn::from(payload));

        let response = self.http.send(request).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| FinSyncError::from(InfraError::from(e)))?;
        if !status.is_success() {
            return Err(authority_error(status, &body));
        }

        let receipt: SubmissionReceipt = serde_json::from_str(&body)
            .map_err(|e| FinSyncError::Transport(format!("unreadable filing receipt: {e}")))?;
        info!(submission_id = %receipt.submission_id, "return accepted for processing");
        Ok(receipt)
    }

    #[instrument(skip(self, access_token))]
    async fn fetch_status(
        &self,
        access_token: &str,
        submission_id: &str,
    ) -> Result<RemoteSubmissionStatus> {
        let url = format!(
            "{}/{RETURNS_PATH}/{}/status",
            self.base_url,
            urlencoding::encode(submission_id)
        );
        let request = self
            .http
            .request(Method::GET, url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json");

        let response = self.http.send(request).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| FinSyncError::from(InfraError::from(e)))?;
        if !status.is_success() {
            return Err(authority_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| FinSyncError::Transport(format!("unreadable submission status: {e}")))
    }
}

/// Rejections carry a human readable reason that is surfaced verbatim.
fn authority_error(status: StatusCode, body: &str) -> FinSyncError {
    if status.is_client_error() && !matches!(status.as_u16(), 401 | 403 | 429) {
        if let Ok(rejection) = serde_json::from_str::<Rejection>(body) {
            if let Some(reason) = rejection.reason.or(rejection.message) {
                return FinSyncError::Validation(reason);
            }
        }
    }
    error_for_status(ProviderId::Sars, status, body)
}

#[derive(Debug, Deserialize)]
struct Rejection {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireReturn<'a> {
    tax_identifier: &'a str,
    period: String,
    #[serde(with = "rust_decimal::serde::str")]
    vat_collected: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    vat_paid: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    vat_owing: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    sales: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    purchases: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    zero_rated: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    exempt: Decimal,
    submission_reference: &'a str,
    digital_signature: &'a str,
}

impl<'a> From<&'a SubmissionPayload> for WireReturn<'a> {
    fn from(payload: &'a SubmissionPayload) -> Self {
        let amount = |money: Money| Decimal::new(money.cents(), 2);
        Self {
            tax_identifier: &payload.tax_identifier,
            period: payload.period.to_string(),
            vat_collected: amount(payload.vat_collected),
            vat_paid: amount(payload.vat_paid),
            vat_owing: amount(payload.vat_owing),
            sales: amount(payload.sales),
            purchases: amount(payload.purchases),
            zero_rated: amount(payload.zero_rated),
            exempt: amount(payload.exempt),
            submission_reference: &payload.submission_reference,
            digital_signature: &payload.digital_signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use finsync_domain::VatPeriod;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn authority(server: &MockServer) -> HttpTaxAuthority {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(5))
            .base_backoff(Duration::from_millis(1))
            .build()
            .unwrap();
        HttpTaxAuthority::new(format!("{}/efiling/v1/", server.uri()), http)
    }

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            tax_identifier: "4123456789".into(),
            period: VatPeriod::new(2024, 3).unwrap(),
            vat_collected: Money::from_cents(29_900),
            vat_paid: Money::from_cents(3_250),
            vat_owing: Money::from_cents(26_650),
            sales: Money::from_cents(230_000),
            purchases: Money::from_cents(25_000),
            zero_rated: Money::zero(),
            exempt: Money::zero(),
            submission_reference: "local-1".into(),
            digital_signature: "ab12".into(),
        }
    }

    #[tokio::test]
    async fn files_return_with_decimal_amounts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/efiling/v1/vat/returns"))
            .and(header("authorization", "Bearer sars-token"))
            .and(body_partial_json(json!({
                "tax_identifier": "4123456789",
                "period": "2024-03",
                "vat_collected": "299.00",
                "vat_owing": "266.50",
                "digital_signature": "ab12",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "submission_id": "SARS-77",
                "reference_number": "VAT201-0001",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = authority(&server).file_return("sars-token", &payload()).await.unwrap();

        assert_eq!(receipt.submission_id, "SARS-77");
        assert_eq!(receipt.reference_number, "VAT201-0001");
    }

    #[tokio::test]
    async fn rejection_reason_is_surfaced_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "reason": "Period 2024-03 already filed",
            })))
            .mount(&server)
            .await;

        let err = authority(&server).file_return("t", &payload()).await.unwrap_err();

        assert_eq!(err, FinSyncError::Validation("Period 2024-03 already filed".into()));
    }

    #[tokio::test]
    async fn expired_token_is_an_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = authority(&server).file_return("t", &payload()).await.unwrap_err();

        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn status_is_fetched_by_encoded_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/efiling/v1/vat/returns/SARS%2077/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "accepted",
                "reference_number": "VAT201-FINAL",
            })))
            .mount(&server)
            .await;

        let status = authority(&server).fetch_status("t", "SARS 77").await.unwrap();

        assert_eq!(
            status,
            RemoteSubmissionStatus::Accepted { reference_number: Some("VAT201-FINAL".into()) }
        );
    }
}
