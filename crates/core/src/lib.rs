//! # FinSync Core
//!
//! Pure orchestration layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for stores, token endpoints, provider
//!   APIs and the tax authority
//! - The per-provider token lifecycle manager
//! - The synchronization engine
//! - VAT aggregation, signing and submission
//!
//! ## Architecture Principles
//! - Only depends on `finsync-common` and `finsync-domain`
//! - No HTTP, keychain or filesystem code
//! - All external dependencies via traits
//! - Time is read through an injected `Clock`

pub mod auth;
pub mod sync;
pub mod vat;

// Re-export specific items to avoid ambiguity
pub use auth::ports::{
    AccessTokenSource, AuthorizationFlow, AuthorizationGrant, AuthorizationRequest,
    CredentialStore, OAuthClient, TokenEndpoint,
};
pub use auth::{AuthPorts, TokenManager, TokenManagerConfig};
pub use sync::ports::{FormatAdapter, ProviderApi, TransactionLedger};
pub use sync::{ProviderChannel, ProviderRegistry, SyncConfig, SyncEngine};
pub use vat::ports::{IdGenerator, TaxAuthorityApi, UuidV7Generator};
pub use vat::{
    calculate_vat, sign_return, signing_payload, verify_signature, SubmissionBuilder,
    SubmissionPayload, SubmissionService,
};
