//! Domain types and models

pub mod credential;
pub mod money;
pub mod provider;
pub mod sync;
pub mod transaction;
pub mod vat;

pub use credential::{Credential, TokenState};
pub use money::{Money, MoneyParseError, TaxRate};
pub use provider::{ProviderId, ProviderProfile, ProviderProfiles, RateLimit};
pub use sync::{
    DecodedBatch, ListRequest, ProviderResponse, ProviderTransaction, PullResult, SyncRecordError,
    SyncResult,
};
pub use transaction::{DateRange, Direction, Transaction, VatRate};
pub use vat::{
    RemoteSubmissionStatus, Submission, SubmissionReceipt, SubmissionStatus, VatPeriod, VatReturn,
};
