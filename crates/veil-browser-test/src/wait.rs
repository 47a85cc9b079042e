//! Wait strategies: bounded condition polls and named settle delays.
//!
//! The harness suspends in exactly three ways. A *condition poll* checks a
//! predicate at a fixed interval until it holds or a deadline passes. An
//! *attempt-counted poll* runs a fixed number of tries at a fixed interval,
//! which is how new-window detection is bounded. A *settle* is a plain
//! fixed-duration sleep standing in for an asynchronous completion the
//! tested surface gives us no way to observe (OAuth popup teardown, the
//! extension's decryption cycle). Settles are deliberate: keep them named
//! constants at the call site, never inline magic sleeps.

use crate::error::{BrowserError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::trace;

/// Default timeout for condition polls (10 seconds, matching the element
/// waits the extension popup needs in practice).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default poll interval for checking conditions (250ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for condition polls.
#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    /// Maximum time to wait for the condition.
    pub timeout: Duration,

    /// How often to check if the condition is satisfied.
    pub poll_interval: Duration,
}

impl WaitConfig {
    /// Creates a new wait configuration.
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Creates a config with a custom timeout and the default poll interval.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

/// Waits for a condition to become true, with timeout.
///
/// The condition is re-evaluated every `poll_interval` until it returns
/// true or `timeout` elapses, at which point `WaitTimeout` is raised with
/// the given description so the failing step is nameable in reports.
pub async fn wait_for<F, Fut>(condition: F, config: WaitConfig, description: &str) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();

    loop {
        if condition().await {
            return Ok(());
        }

        if start.elapsed() >= config.timeout {
            return Err(BrowserError::WaitTimeout {
                condition: description.to_string(),
                timeout: config.timeout,
            });
        }

        sleep(config.poll_interval).await;
    }
}

/// Waits for a condition that returns `Result<bool>`.
///
/// Errors from the condition are treated as "not yet": element queries
/// routinely fail transiently while a page is mid-render, and the deadline
/// still bounds the whole wait.
pub async fn wait_for_result<F, Fut>(
    condition: F,
    config: WaitConfig,
    description: &str,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();

    loop {
        match condition().await {
            Ok(true) => return Ok(()),
            Ok(false) | Err(_) => {}
        }

        if start.elapsed() >= config.timeout {
            return Err(BrowserError::WaitTimeout {
                condition: description.to_string(),
                timeout: config.timeout,
            });
        }

        sleep(config.poll_interval).await;
    }
}

/// Runs `check` up to `max_attempts` times at a fixed `interval`, returning
/// the first `Some` value produced.
///
/// This is the bounded attempt-counted loop used for new-window detection:
/// the engine exposes window existence only as a snapshot list, so we
/// re-snapshot a fixed number of times rather than polling open-endedly.
/// Returns `None` when all attempts are exhausted; the caller decides which
/// typed error that means.
pub async fn poll_attempts<T, F, Fut>(
    max_attempts: u32,
    interval: Duration,
    check: F,
) -> Option<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=max_attempts {
        if let Some(value) = check().await {
            trace!(attempt, "poll_attempts satisfied");
            return Some(value);
        }
        if attempt < max_attempts {
            sleep(interval).await;
        }
    }
    None
}

/// Sleeps for a fixed settle duration, logging what is being waited out.
///
/// Use only where no observable completion signal exists. Callers pass a
/// named constant, not an ad-hoc literal.
pub async fn settle(duration: Duration, reason: &str) {
    trace!(?duration, reason, "settle wait");
    sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn wait_for_succeeds_immediately() {
        let result = wait_for(|| async { true }, WaitConfig::default(), "test condition").await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_for_succeeds_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = wait_for(
            move || {
                let c = counter_clone.clone();
                async move {
                    let count = c.fetch_add(1, Ordering::SeqCst);
                    count >= 3
                }
            },
            WaitConfig::new(Duration::from_secs(5), Duration::from_millis(10)),
            "counter >= 3",
        )
        .await;

        assert!(result.is_ok());
        assert!(counter.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn wait_for_times_out_with_description() {
        let result = wait_for(
            || async { false },
            WaitConfig::new(Duration::from_millis(100), Duration::from_millis(10)),
            "impossible condition",
        )
        .await;

        match result {
            Err(BrowserError::WaitTimeout { condition, .. }) => {
                assert_eq!(condition, "impossible condition");
            }
            other => panic!("expected WaitTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_for_result_treats_errors_as_not_yet() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = wait_for_result(
            move || {
                let c = counter_clone.clone();
                async move {
                    let count = c.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(BrowserError::ScriptExecutionFailed("transient".into()))
                    } else {
                        Ok(true)
                    }
                }
            },
            WaitConfig::new(Duration::from_secs(5), Duration::from_millis(10)),
            "recovers after transient errors",
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn poll_attempts_respects_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Option<()> = poll_attempts(3, Duration::from_millis(1), move || {
            let c = counter_clone.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                None
            }
        })
        .await;

        assert!(result.is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_attempts_returns_first_hit() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = poll_attempts(10, Duration::from_millis(1), move || {
            let c = counter_clone.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                (n >= 2).then_some(n)
            }
        })
        .await;

        assert_eq!(result, Some(2));
    }
}
