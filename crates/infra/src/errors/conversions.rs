//! Conversions from external infrastructure errors into domain errors.

use finsync_domain::{CallError, FinSyncError, ProviderId, RecordError};
use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use reqwest::StatusCode;

/// Longest slice of a response body quoted in an error message.
const MAX_QUOTED_BODY: usize = 200;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub FinSyncError);

impl From<InfraError> for FinSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FinSyncError> for InfraError {
    fn from(value: FinSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoFinSyncError {
    fn into_finsync(self) -> FinSyncError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → FinSyncError */
/* -------------------------------------------------------------------------- */

impl IntoFinSyncError for KeyringError {
    fn into_finsync(self) -> FinSyncError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => FinSyncError::Storage("keychain entry not found".into()),
            BadEncoding(_) => {
                FinSyncError::Storage("credential in keychain is not valid UTF-8".into())
            }
            TooLong(name, limit) => FinSyncError::Storage(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => {
                FinSyncError::Storage(format!("keychain attribute '{attr}' is invalid: {reason}"))
            }
            PlatformFailure(err) => FinSyncError::Storage(format!("keychain platform error: {err}")),
            NoStorageAccess(err) => {
                FinSyncError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => FinSyncError::Storage(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_finsync())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → FinSyncError */
/* -------------------------------------------------------------------------- */

impl IntoFinSyncError for HttpError {
    fn into_finsync(self) -> FinSyncError {
        if self.is_timeout() {
            return FinSyncError::Transport("HTTP request timed out".into());
        }

        if self.is_connect() {
            return FinSyncError::Transport("HTTP connection failure".into());
        }

        if self.is_decode() {
            return FinSyncError::Transport(format!("malformed HTTP response body: {self}"));
        }

        if let Some(status) = self.status() {
            let message = status_line(status);
            return match status.as_u16() {
                429 | 500..=599 => FinSyncError::Transport(message),
                _ => FinSyncError::Validation(message),
            };
        }

        FinSyncError::Transport(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_finsync())
    }
}

/* -------------------------------------------------------------------------- */
/* serde / toml → FinSyncError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(FinSyncError::Validation(format!("malformed JSON: {value}")))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(FinSyncError::Config(format!("invalid TOML: {}", value.message())))
    }
}

/* -------------------------------------------------------------------------- */
/* HTTP status → domain outcome */
/* -------------------------------------------------------------------------- */

/// Whole-operation error for a non-success response from `provider`.
///
/// 401/403 mean the bearer token is no longer accepted; 429 and 5xx are
/// transient; remaining 4xx are rejections of the request itself.
pub fn error_for_status(provider: ProviderId, status: StatusCode, body: &str) -> FinSyncError {
    let message = describe(status, body);
    match status.as_u16() {
        401 | 403 => FinSyncError::auth(provider, message),
        429 => FinSyncError::RateLimitExceeded(message),
        500..=599 => FinSyncError::Transport(message),
        _ => FinSyncError::Validation(message),
    }
}

/// Per-record outcome for a non-success response to a record call.
///
/// Only a rejected token aborts the batch; everything else stays with the
/// record that caused it.
pub fn call_error_for_status(provider: ProviderId, status: StatusCode, body: &str) -> CallError {
    let message = describe(status, body);
    match status.as_u16() {
        401 | 403 => CallError::Abort(FinSyncError::auth(provider, message)),
        409 => CallError::Record(RecordError::conflict(message)),
        429 | 500..=599 => CallError::Record(RecordError::transport(message)),
        _ => CallError::Record(RecordError::validation(message)),
    }
}

/// Failure to get any response for a record call.
pub fn call_error_for_transport(err: HttpError) -> CallError {
    CallError::Record(RecordError::transport(InfraError::from(err).0.to_string()))
}

fn status_line(status: StatusCode) -> String {
    format!("HTTP {} {}", status.as_u16(), status.canonical_reason().unwrap_or("unknown status"))
}

fn describe(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status_line(status);
    }
    let quoted: String = body.chars().take(MAX_QUOTED_BODY).collect();
    format!("{}: {quoted}", status_line(status))
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
