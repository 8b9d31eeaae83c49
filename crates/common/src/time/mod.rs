//! Time abstraction for testability
//!
//! Rate limiting and token expiry both read the clock, and the limiter also
//! waits on it. Routing every read and every wait through [`Clock`] lets
//! tests substitute [`MockClock`], which jumps virtual time forward instead of
//! sleeping.
//!
//! # Examples
//!
//! ```
//! # tokio_test::block_on(async {
//! use std::time::Duration;
//!
//! use finsync_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//!
//! // Returns immediately; the clock is advanced by the requested duration
//! clock.sleep(Duration::from_secs(60)).await;
//!
//! assert_eq!(clock.now().duration_since(start), Duration::from_secs(60));
//! # });
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Trait for time operations to enable testing
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current wall clock time in UTC
    fn utc_now(&self) -> DateTime<Utc>;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Real system clock implementation
///
/// Monotonic readings come from tokio's clock so paused-time tests
/// (`#[tokio::test(start_paused = true)]`) observe the same timeline as
/// `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        (**self).utc_now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same timeline. `sleep` advances the timeline by the
/// requested duration and yields once, so waiting code makes progress without
/// real time passing.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    base_utc: DateTime<Utc>,
    elapsed: Arc<Mutex<Duration>>,
    slept: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock anchored at the current real time
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a mock clock whose wall time starts at `base_utc`
    pub fn starting_at(base_utc: DateTime<Utc>) -> Self {
        Self {
            start: Instant::now(),
            base_utc,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            slept: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock without counting it as sleep
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the clock by whole seconds
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Total virtual time since creation
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }

    /// Total virtual time spent inside [`Clock::sleep`]
    #[must_use]
    pub fn total_slept(&self) -> Duration {
        *self.slept.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = *self.elapsed.lock();
        self.base_utc + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero())
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
        *self.slept.lock() += duration;
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_clock_sleep_advances_both_timelines() {
        let base = Utc::now();
        let clock = MockClock::starting_at(base);
        let start = clock.now();

        clock.sleep(Duration::from_secs(30)).await;
        clock.advance_secs(5);

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(35));
        assert_eq!(clock.utc_now(), base + chrono::Duration::seconds(35));
        assert_eq!(clock.total_slept(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn clones_share_time() {
        let clock = MockClock::new();
        let other = clock.clone();
        other.advance(Duration::from_millis(250));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn system_clock_follows_paused_tokio_time() {
        let clock = SystemClock;
        let start = clock.now();
        clock.sleep(Duration::from_secs(120)).await;
        assert!(clock.now().duration_since(start) >= Duration::from_secs(120));
    }
}
