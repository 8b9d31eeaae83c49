//! Configuration loading and management
//!
//! [`loader`] reads [`FinSyncConfig`](finsync_domain::FinSyncConfig) from the
//! environment or a file; [`profiles`] merges it with the built-in endpoint
//! defaults into the provider registry.

pub mod loader;
pub mod profiles;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths, ConfigError};
pub use profiles::{build_profiles, default_profile};
