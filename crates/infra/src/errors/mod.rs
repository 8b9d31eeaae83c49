//! Infrastructure error conversions

pub mod conversions;

pub use conversions::{call_error_for_status, call_error_for_transport, error_for_status, InfraError};
