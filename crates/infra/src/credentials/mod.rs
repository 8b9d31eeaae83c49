//! [`CredentialStore`](finsync_core::CredentialStore) implementations

pub mod keychain;
pub mod memory;

pub use keychain::KeychainCredentialStore;
pub use memory::InMemoryCredentialStore;
