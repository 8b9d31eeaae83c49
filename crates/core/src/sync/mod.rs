//! Push/pull synchronization against accounting providers

pub mod engine;
pub mod ports;
pub mod registry;

pub use engine::{SyncConfig, SyncEngine};
pub use registry::{ProviderChannel, ProviderLimiter, ProviderRegistry};
