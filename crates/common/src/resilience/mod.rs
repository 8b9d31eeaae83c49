//! Resilience patterns for outbound calls
//!
//! Each remote provider declares request ceilings. [`SlidingWindowLimiter`]
//! enforces them by delaying callers; it never drops a call. Retry policy for
//! individual calls lives with the caller (the sync engine retries transport
//! failures once), so this module only covers admission.

pub mod rate_limiter;

pub use rate_limiter::{RateLimitError, SlidingWindowLimiter, WindowLimit};
