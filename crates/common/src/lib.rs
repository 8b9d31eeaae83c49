//! Modular common utilities shared across FinSync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: OAuth helpers (anti-replay state, PKCE, token responses)
//! - `runtime`: async infrastructure (clock abstraction, rate limiting)
//! - `observability`: tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod time;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use auth::{generate_state, validate_state, OAuthErrorBody, TokenResponse, TokenSet};
#[cfg(feature = "runtime")]
pub use resilience::{RateLimitError, SlidingWindowLimiter, WindowLimit};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock};
