//! # FinSync Domain
//!
//! Business domain types for the financial synchronization core.
//!
//! This crate contains:
//! - Money, transaction, credential and VAT types
//! - Provider identities and profiles
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other FinSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
