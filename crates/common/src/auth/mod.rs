//! OAuth 2.0 building blocks shared by the token manager and its HTTP client
//!
//! - [`pkce`]: anti-replay `state` and S256 PKCE values
//! - [`types`]: token endpoint responses and the normalized [`TokenSet`]
//!
//! The lifecycle itself (authorize, refresh, single-flight) lives in
//! `finsync-core`; the HTTP exchange lives in `finsync-infra`.

pub mod pkce;
pub mod types;

pub use pkce::{code_challenge, generate_code_verifier, generate_state, validate_state, PkceChallenge};
pub use types::{OAuthErrorBody, TokenResponse, TokenSet, MAX_TOKEN_LIFETIME_SECS};
