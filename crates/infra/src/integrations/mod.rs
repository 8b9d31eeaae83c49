//! External service integrations

pub mod accounting;
pub mod loopback;
pub mod oauth;
pub mod sars;

pub use loopback::LoopbackAuthorizationFlow;
pub use oauth::HttpTokenEndpoint;
pub use sars::HttpTaxAuthority;
