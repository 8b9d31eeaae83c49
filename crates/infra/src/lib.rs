//! # FinSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - Configuration loading and built-in provider profiles
//! - Keychain and in-memory credential stores
//! - HTTP clients for the OAuth token endpoints, the accounting providers and
//!   the tax authority
//! - Per-provider format adapters
//! - The loopback authorization flow
//! - Tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `finsync-core`
//! - Depends on `finsync-common`, `finsync-domain` and `finsync-core`
//! - Contains all "impure" code (network, keychain, filesystem)

pub mod config;
pub mod context;
pub mod credentials;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;

// Re-export commonly used items
pub use context::{ContextBuilder, FinSyncContext};
pub use credentials::{InMemoryCredentialStore, KeychainCredentialStore};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use integrations::accounting::{adapter_for, HttpProviderApi, TenantScope};
pub use integrations::{HttpTaxAuthority, HttpTokenEndpoint, LoopbackAuthorizationFlow};
pub use observability::{init_tracing, LogFormat};
