//! Generic condition polling for switchover workflows.
//!
//! [`wait_for_condition`] repeatedly evaluates a probe until it reports
//! completion or the timeout elapses. A timeout is reported as `Ok(false)`,
//! not as an error: callers decide whether an incomplete wait is fatal.
//! Errors returned by the probe itself are propagated unchanged; polling
//! cadence is this module's concern, fault tolerance of the probe is not.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a single probe evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Whether the awaited condition holds
    pub done: bool,
    /// Human-readable detail for logs (may be empty)
    pub detail: String,
}

impl Progress {
    /// The condition holds
    pub fn done(detail: impl Into<String>) -> Self {
        Self {
            done: true,
            detail: detail.into(),
        }
    }

    /// The condition does not hold yet
    pub fn pending(detail: impl Into<String>) -> Self {
        Self {
            done: false,
            detail: detail.into(),
        }
    }
}

/// Polling cadence and budget for [`wait_for_condition`]
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOptions {
    /// Total time budget
    pub timeout: Duration,
    /// Sleep between polls at the normal cadence
    pub interval: Duration,
    /// Sleep between polls during the fast phase
    pub fast_interval: Option<Duration>,
    /// How long the fast phase lasts (`None` or zero = for the whole wait)
    pub fast_timeout: Option<Duration>,
    /// Probe one last time after the timeout and accept a late success
    pub allow_success_after_timeout: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            interval: Duration::from_secs(30),
            fast_interval: None,
            fast_timeout: None,
            allow_success_after_timeout: false,
        }
    }
}

impl WaitOptions {
    /// Poll every `interval` for at most `timeout`
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            ..Default::default()
        }
    }

    /// Poll every `fast_interval` while elapsed time is below `fast_timeout`
    pub fn with_fast_polling(mut self, fast_interval: Duration, fast_timeout: Option<Duration>) -> Self {
        self.fast_interval = Some(fast_interval);
        self.fast_timeout = fast_timeout;
        self
    }

    /// Accept a success observed by one extra probe after the timeout
    pub fn allow_success_after_timeout(mut self) -> Self {
        self.allow_success_after_timeout = true;
        self
    }

    /// Sleep to use after a pending probe, given the time elapsed so far
    pub fn sleep_interval(&self, elapsed: Duration) -> Duration {
        match self.fast_interval {
            Some(fast) if !fast.is_zero() => match self.fast_timeout {
                Some(limit) if !limit.is_zero() && elapsed >= limit => self.interval,
                _ => fast,
            },
            _ => self.interval,
        }
    }
}

fn log_complete(description: &str, detail: &str) {
    if detail.is_empty() {
        info!("{} complete", description);
    } else {
        info!("{} complete: {}", description, detail);
    }
}

fn log_pending(description: &str, detail: &str, elapsed: Duration) {
    let elapsed = elapsed.as_secs();
    if detail.is_empty() {
        debug!(elapsed_secs = elapsed, "{} in progress", description);
    } else {
        debug!(elapsed_secs = elapsed, "{} in progress: {}", description, detail);
    }
}

/// Poll `probe` until it reports done or `options.timeout` elapses.
///
/// Returns `Ok(true)` on completion and `Ok(false)` on timeout. The first
/// probe error aborts the wait and is returned as-is.
pub async fn wait_for_condition<F, Fut, E>(
    description: &str,
    options: &WaitOptions,
    mut probe: F,
) -> Result<bool, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Progress, E>>,
{
    let start = Instant::now();
    info!(
        timeout_secs = options.timeout.as_secs(),
        "Waiting for {}", description
    );

    while start.elapsed() < options.timeout {
        let progress = probe().await?;
        if progress.done {
            log_complete(description, &progress.detail);
            return Ok(true);
        }

        let elapsed = start.elapsed();
        log_pending(description, &progress.detail, elapsed);
        tokio::time::sleep(options.sleep_interval(elapsed)).await;
    }

    if options.allow_success_after_timeout {
        let progress = probe().await?;
        if progress.done {
            log_complete(description, &progress.detail);
            return Ok(true);
        }
        log_pending(description, &progress.detail, start.elapsed());
    }

    warn!(
        timeout_secs = options.timeout.as_secs(),
        "{} not complete after timeout", description
    );
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn test_returns_true_when_probe_completes() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let done = wait_for_condition(
            "restore",
            &WaitOptions::new(Duration::from_secs(60), Duration::from_secs(5)),
            || {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(if n >= 2 {
                        Progress::done("Finished")
                    } else {
                        Progress::pending("Running")
                    })
                }
            },
        )
        .await
        .unwrap();

        assert!(done);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_false_without_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let done = wait_for_condition(
            "clusters",
            &WaitOptions::new(Duration::from_secs(10), Duration::from_secs(3)),
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Progress::pending(""))
                }
            },
        )
        .await
        .unwrap();

        assert!(!done);
        // Polls at t=0, 3, 6, 9
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_success_accepted_after_timeout() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let options =
            WaitOptions::new(Duration::from_secs(10), Duration::from_secs(3)).allow_success_after_timeout();
        let done = wait_for_condition("clusters", &options, || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(if n == 4 {
                    Progress::done("late")
                } else {
                    Progress::pending("")
                })
            }
        })
        .await
        .unwrap();

        assert!(done);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_polling_backs_off_to_normal_interval() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let start = Instant::now();

        let options = WaitOptions::new(Duration::from_secs(30), Duration::from_secs(10))
            .with_fast_polling(Duration::from_secs(2), Some(Duration::from_secs(4)));
        let done = wait_for_condition("fast", &options, || {
            let s = s.clone();
            async move {
                s.lock().unwrap().push(start.elapsed().as_secs());
                Ok::<_, Infallible>(Progress::pending(""))
            }
        })
        .await
        .unwrap();

        assert!(!done);
        assert_eq!(*seen.lock().unwrap(), vec![0, 2, 4, 14, 24]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_propagates() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = wait_for_condition(
            "restore",
            &WaitOptions::new(Duration::from_secs(60), Duration::from_secs(5)),
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<Progress, _>("restore FinishedWithErrors")
                }
            },
        )
        .await;

        assert_eq!(result, Err("restore FinishedWithErrors"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sleep_interval_rules() {
        let always_fast = WaitOptions::new(Duration::from_secs(60), Duration::from_secs(30))
            .with_fast_polling(Duration::from_secs(5), None);
        assert_eq!(always_fast.sleep_interval(Duration::from_secs(500)), Duration::from_secs(5));

        let zero_limit = WaitOptions::new(Duration::from_secs(60), Duration::from_secs(30))
            .with_fast_polling(Duration::from_secs(5), Some(Duration::ZERO));
        assert_eq!(zero_limit.sleep_interval(Duration::from_secs(500)), Duration::from_secs(5));

        let plain = WaitOptions::new(Duration::from_secs(60), Duration::from_secs(30));
        assert_eq!(plain.sleep_interval(Duration::ZERO), Duration::from_secs(30));
    }
}
