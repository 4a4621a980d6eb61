//! Reliability layer: failure classification and bounded retry with backoff.
//!
//! [`is_retryable`] is the single decision point for whether a control-plane
//! failure is worth another attempt. [`retry_with_backoff`] consults it
//! through the [`Retryable`] trait, so a non-retryable failure is returned
//! after the first attempt while transient ones are retried with exponential
//! backoff and jitter.
//!
//! # Example
//!
//! ```ignore
//! use switchover_common::retry::{retry_with_backoff, RetryConfig};
//!
//! let restore = retry_with_backoff(
//!     &RetryConfig::cluster_api(),
//!     "get restore",
//!     || transport.get(&target),
//! ).await?;
//! ```

use std::io;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::transport::TransportError;

/// Total attempts (1 initial + 4 retries) for every cluster API call
pub const CLUSTER_API_MAX_ATTEMPTS: u32 = 5;

/// API status codes that indicate an overloaded or temporarily broken server
const RETRYABLE_STATUS_CODES: [u16; 4] = [429, 500, 503, 504];

/// Decide whether a control-plane failure is worth re-attempting.
///
/// - API status 429/500/503/504 are retryable; every other status is not.
/// - Timeouts, connection failures and protocol/malformed-response errors are retryable.
/// - OS-level errors are retryable only when they carry a network error code
///   (refused, reset, aborted, timed out, unreachable). Non-network codes and
///   errors without any code fail fast.
/// - Everything else is not retryable.
pub fn is_retryable(err: &TransportError) -> bool {
    match err {
        TransportError::Api { status, .. } => RETRYABLE_STATUS_CODES.contains(status),
        TransportError::Timeout(_) | TransportError::Connection(_) | TransportError::Protocol(_) => {
            true
        }
        TransportError::Io(e) => e.raw_os_error().is_some() && is_network_error_kind(e.kind()),
        TransportError::Other(_) => false,
    }
}

/// Error kinds produced by network-level OS error codes
pub(crate) fn is_network_error_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::TimedOut
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::NetworkDown
            | io::ErrorKind::HostUnreachable
    )
}

/// Errors that know whether the failed operation may be retried
pub trait Retryable {
    /// Whether another attempt could succeed
    fn is_retryable(&self) -> bool;
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        is_retryable(self)
    }
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Configuration for operations that may fail transiently.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::cluster_api()
    }
}

impl RetryConfig {
    /// Policy used for every call to a hub: 5 attempts, 1s doubling to 10s
    pub fn cluster_api() -> Self {
        Self {
            max_attempts: CLUSTER_API_MAX_ATTEMPTS,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Self::cluster_api()
        }
    }
}

/// Execute an async operation, retrying retryable failures with exponential
/// backoff and jitter.
///
/// A failure whose [`Retryable::is_retryable`] is false is returned
/// immediately. Retryable failures are re-attempted until `max_attempts` is
/// reached, after which the last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() {
                    debug!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed with non-retryable error"
                    );
                    return Err(e);
                }

                if config.max_attempts > 0 && attempt >= config.max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                // Add jitter: 0.5x to 1.5x of the delay
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = jittered_delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(jittered_delay).await;

                // Exponential backoff, capped at max_delay
                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}
