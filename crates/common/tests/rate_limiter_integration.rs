//! Integration tests for the sliding-window rate limiter
//!
//! Exercises the limiter under concurrency and checks that the ceiling holds
//! in every window, on both the mock clock and paused tokio time.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::time::{Duration, Instant};

use finsync_common::resilience::{SlidingWindowLimiter, WindowLimit};
use finsync_common::time::{Clock, MockClock, SystemClock};
use tokio::sync::Mutex;

/// Count the admissions that fall inside `[t, t + window)` for every
/// admission `t`, returning the maximum seen.
fn max_in_any_window(admitted: &[Instant], window: Duration) -> usize {
    admitted
        .iter()
        .map(|start| {
            admitted
                .iter()
                .filter(|at| **at >= *start && at.duration_since(*start) < window)
                .count()
        })
        .max()
        .unwrap_or(0)
}

/// Validates that five calls at two per minute take at least two windows.
///
/// Assertions:
/// - The fifth call is admitted no earlier than 120s after the first.
/// - No 60s span contains more than two admissions.
#[tokio::test]
async fn test_five_calls_at_two_per_minute_span_two_windows() {
    let clock = MockClock::new();
    let limiter =
        SlidingWindowLimiter::with_clock("sage", vec![WindowLimit::per_minute(2)], clock.clone())
            .expect("valid limiter");

    let mut admitted = Vec::new();
    for _ in 0..5 {
        limiter.acquire().await;
        admitted.push(clock.now());
    }

    let span = admitted[4].duration_since(admitted[0]);
    assert!(span >= Duration::from_secs(120), "span was {span:?}");
    assert!(max_in_any_window(&admitted, Duration::from_secs(60)) <= 2);
}

/// Validates arrival-order admission when callers contend.
///
/// Assertions:
/// - Tasks spawned in order 0..6 are admitted in that order.
/// - The ceiling of three per minute holds across all admissions.
#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_admitted_in_arrival_order() {
    let limiter = Arc::new(
        SlidingWindowLimiter::with_clock("xero", vec![WindowLimit::per_minute(3)], SystemClock)
            .expect("valid limiter"),
    );
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..6 {
        let limiter = Arc::clone(&limiter);
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            limiter.acquire().await;
            order.lock().await.push((i, SystemClock.now()));
        }));
        // Let each task reach the limiter before spawning the next
        tokio::task::yield_now().await;
    }
    for handle in handles {
        handle.await.expect("task completed");
    }

    let order = order.lock().await;
    let ids: Vec<_> = order.iter().map(|(i, _)| *i).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);

    let times: Vec<_> = order.iter().map(|(_, at)| *at).collect();
    assert!(max_in_any_window(&times, Duration::from_secs(60)) <= 3);
}

/// Validates the per-minute and per-hour ceilings together.
///
/// Assertions:
/// - With 5/minute and 7/hour, the eighth call waits for the hour window.
#[tokio::test]
async fn test_minute_and_hour_ceilings_combine() {
    let clock = MockClock::new();
    let limiter = SlidingWindowLimiter::with_clock(
        "quickbooks",
        vec![WindowLimit::per_minute(5), WindowLimit::per_hour(7)],
        clock.clone(),
    )
    .expect("valid limiter");

    let start = clock.now();
    for _ in 0..7 {
        limiter.acquire().await;
    }
    assert_eq!(limiter.available().await, 0);

    limiter.acquire().await;
    assert!(clock.now().duration_since(start) >= Duration::from_secs(3600));
}
