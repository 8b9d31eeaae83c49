//! Port interfaces for VAT filing

use async_trait::async_trait;
use finsync_domain::{RemoteSubmissionStatus, Result, SubmissionReceipt};
use uuid::Uuid;

use super::submission::SubmissionPayload;

/// VAT endpoints of the tax authority
///
/// A 401 is reported as `FinSyncError::Authentication`; a rejected body as
/// `Validation` carrying the authority's reason verbatim.
#[async_trait]
pub trait TaxAuthorityApi: Send + Sync {
    async fn file_return(
        &self,
        access_token: &str,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt>;

    async fn fetch_status(
        &self,
        access_token: &str,
        submission_id: &str,
    ) -> Result<RemoteSubmissionStatus>;
}

/// Source of local submission identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Time-ordered UUID v7 identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> String {
        Uuid::now_v7().to_string()
    }
}
