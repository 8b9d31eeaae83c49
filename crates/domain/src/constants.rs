//! Application constants
//!
//! Centralized location for domain-level defaults. Most values here can be
//! overridden through [`crate::FinSyncConfig`].

// Token lifecycle
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

// Network
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

// Pagination
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PULL_PAGES: u32 = 500;

// VAT
/// South African standard VAT rate (15%) in basis points.
pub const STANDARD_VAT_RATE_BPS: u32 = 1500;
pub const SIGNATURE_FIELD_SEPARATOR: &str = "|";
