//! Provider authentication: ports and the per-provider token manager

pub mod ports;
pub mod token_manager;

pub use token_manager::{AuthPorts, TokenManager, TokenManagerConfig};
