//! Sliding-window rate limiting for outbound provider calls
//!
//! A limiter holds one or more windows (for example 60 calls per minute and
//! 1000 per hour). A call is admitted only when every window has room for it;
//! otherwise the caller waits on the limiter's [`Clock`] until the oldest
//! blocking call leaves its window. Calls are never dropped.
//!
//! Waiters hold the history lock while they sleep, so callers are admitted in
//! arrival order (tokio's mutex is fair).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::time::{Clock, SystemClock};

/// Errors raised when a limiter is misconfigured
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("rate limiter '{0}' has no windows")]
    NoWindows(String),

    #[error("rate limiter '{name}' allows zero calls per {window:?}")]
    ZeroCapacity { name: String, window: Duration },

    #[error("rate limiter '{0}' has a zero-length window")]
    ZeroWindow(String),
}

/// Ceiling of `max_calls` within any `window`-long span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    pub max_calls: u32,
    pub window: Duration,
}

impl WindowLimit {
    pub const fn new(max_calls: u32, window: Duration) -> Self {
        Self { max_calls, window }
    }

    pub const fn per_minute(max_calls: u32) -> Self {
        Self::new(max_calls, Duration::from_secs(60))
    }

    pub const fn per_hour(max_calls: u32) -> Self {
        Self::new(max_calls, Duration::from_secs(3600))
    }
}

/// Mutex-guarded sliding-window limiter
///
/// # Examples
///
/// ```rust
/// # tokio_test::block_on(async {
/// use finsync_common::resilience::{SlidingWindowLimiter, WindowLimit};
/// use finsync_common::time::MockClock;
///
/// let clock = MockClock::new();
/// let limiter = SlidingWindowLimiter::with_clock(
///     "xero",
///     vec![WindowLimit::per_minute(2)],
///     clock.clone(),
/// )
/// .unwrap();
///
/// limiter.acquire().await;
/// limiter.acquire().await;
/// // Third call waits a full window on the mock clock
/// let waited = limiter.acquire().await;
/// assert_eq!(waited.as_secs(), 60);
/// # });
/// ```
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    name: String,
    limits: Vec<WindowLimit>,
    longest: Duration,
    history: Mutex<VecDeque<Instant>>,
    clock: C,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Limiter on the system clock with per-minute and per-hour ceilings
    pub fn per_minute_and_hour(
        name: impl Into<String>,
        per_minute: u32,
        per_hour: u32,
    ) -> Result<Self, RateLimitError> {
        Self::with_clock(
            name,
            vec![WindowLimit::per_minute(per_minute), WindowLimit::per_hour(per_hour)],
            SystemClock,
        )
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Create a limiter with a custom clock
    pub fn with_clock(
        name: impl Into<String>,
        limits: Vec<WindowLimit>,
        clock: C,
    ) -> Result<Self, RateLimitError> {
        let name = name.into();
        if limits.is_empty() {
            return Err(RateLimitError::NoWindows(name));
        }
        for limit in &limits {
            if limit.window.is_zero() {
                return Err(RateLimitError::ZeroWindow(name));
            }
            if limit.max_calls == 0 {
                return Err(RateLimitError::ZeroCapacity { name, window: limit.window });
            }
        }
        let longest = limits.iter().map(|l| l.window).max().unwrap_or_default();

        Ok(Self { name, limits, longest, history: Mutex::new(VecDeque::new()), clock })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limits(&self) -> &[WindowLimit] {
        &self.limits
    }

    /// Wait until a call is admitted, then record it.
    ///
    /// Returns how long the caller was delayed.
    pub async fn acquire(&self) -> Duration {
        let mut history = self.history.lock().await;
        let mut waited = Duration::ZERO;

        loop {
            let now = self.clock.now();
            self.prune(&mut history, now);

            match self.delay_needed(&history, now) {
                None => {
                    history.push_back(now);
                    if !waited.is_zero() {
                        debug!(
                            limiter = %self.name,
                            waited_ms = waited.as_millis() as u64,
                            "Rate limiter admitted delayed call"
                        );
                    }
                    return waited;
                }
                Some(delay) => {
                    debug!(
                        limiter = %self.name,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limit reached, delaying call"
                    );
                    self.clock.sleep(delay).await;
                    waited += delay;
                }
            }
        }
    }

    /// Record a call if one is admissible right now.
    ///
    /// Returns `Err(retry_after)` without recording when a window is full.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut history = self.history.lock().await;
        let now = self.clock.now();
        self.prune(&mut history, now);

        match self.delay_needed(&history, now) {
            None => {
                history.push_back(now);
                Ok(())
            }
            Some(delay) => Err(delay),
        }
    }

    /// Calls still admissible right now across every window.
    pub async fn available(&self) -> u32 {
        let mut history = self.history.lock().await;
        let now = self.clock.now();
        self.prune(&mut history, now);

        self.limits
            .iter()
            .map(|limit| {
                let used = Self::in_window(&history, now, limit.window) as u32;
                limit.max_calls.saturating_sub(used)
            })
            .min()
            .unwrap_or(0)
    }

    /// Forget every recorded call.
    pub async fn reset(&self) {
        self.history.lock().await.clear();
    }

    fn prune(&self, history: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = history.front() {
            if now.duration_since(*oldest) >= self.longest {
                history.pop_front();
            } else {
                break;
            }
        }
    }

    fn in_window(history: &VecDeque<Instant>, now: Instant, window: Duration) -> usize {
        history.iter().rev().take_while(|at| now.duration_since(**at) < window).count()
    }

    /// Longest wait any full window imposes, or `None` when all have room.
    fn delay_needed(&self, history: &VecDeque<Instant>, now: Instant) -> Option<Duration> {
        let mut delay: Option<Duration> = None;

        for limit in &self.limits {
            let max_calls = limit.max_calls as usize;
            if Self::in_window(history, now, limit.window) < max_calls {
                continue;
            }
            // The call `max_calls` positions from the newest must leave the window.
            let blocking = history[history.len() - max_calls];
            let wait = (blocking + limit.window).saturating_duration_since(now);
            delay = Some(delay.map_or(wait, |d| d.max(wait)));
        }

        delay
    }
}

impl<C: Clock> std::fmt::Debug for SlidingWindowLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("name", &self.name)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MockClock;

    fn limiter(clock: &MockClock, limits: Vec<WindowLimit>) -> SlidingWindowLimiter<MockClock> {
        SlidingWindowLimiter::with_clock("test", limits, clock.clone()).unwrap()
    }

    #[test]
    fn rejects_invalid_configuration() {
        let clock = MockClock::new();
        assert!(matches!(
            SlidingWindowLimiter::with_clock("x", vec![], clock.clone()),
            Err(RateLimitError::NoWindows(_))
        ));
        assert!(matches!(
            SlidingWindowLimiter::with_clock("x", vec![WindowLimit::per_minute(0)], clock.clone()),
            Err(RateLimitError::ZeroCapacity { .. })
        ));
        assert!(matches!(
            SlidingWindowLimiter::with_clock("x", vec![WindowLimit::new(1, Duration::ZERO)], clock),
            Err(RateLimitError::ZeroWindow(_))
        ));
    }

    #[tokio::test]
    async fn admits_up_to_ceiling_without_waiting() {
        let clock = MockClock::new();
        let limiter = limiter(&clock, vec![WindowLimit::per_minute(3)]);

        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert_eq!(limiter.available().await, 0);
        assert_eq!(limiter.try_acquire().await, Err(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn slides_rather_than_resetting() {
        let clock = MockClock::new();
        let limiter = limiter(&clock, vec![WindowLimit::per_minute(2)]);

        limiter.acquire().await;
        clock.advance_secs(40);
        limiter.acquire().await;

        // First call leaves the window 20s later; the second stays in it
        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::from_secs(20));
        assert_eq!(limiter.available().await, 0);
    }

    #[tokio::test]
    async fn hourly_window_dominates_when_tighter() {
        let clock = MockClock::new();
        let limiter = limiter(&clock, vec![WindowLimit::per_minute(10), WindowLimit::per_hour(2)]);

        limiter.acquire().await;
        limiter.acquire().await;
        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let clock = MockClock::new();
        let limiter = limiter(&clock, vec![WindowLimit::per_minute(1)]);
        limiter.acquire().await;
        limiter.reset().await;
        assert!(limiter.try_acquire().await.is_ok());
    }
}
