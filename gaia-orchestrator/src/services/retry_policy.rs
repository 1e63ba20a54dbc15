//! Retry and pacing policy for remote calls
//!
//! [`RetryPolicy`] decides which failures are transient and how long to back
//! off; the transient status set is configuration, not a hidden constant.
//! [`PacingGate`] enforces a minimum interval between consecutive requests
//! made through one client.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use gaia_common::config::RetryConfig;

use super::clickup_client::{AttemptError, ClientError};

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Retry classification and exponential backoff schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    transient_statuses: BTreeSet<u16>,
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        transient_statuses: impl IntoIterator<Item = u16>,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            transient_statuses: transient_statuses.into_iter().collect(),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.base_delay(),
            config.transient_statuses.iter().copied(),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_transient(&self, status: u16) -> bool {
        self.transient_statuses.contains(&status)
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Run `attempt_fn` until it succeeds, fails permanently, or retries are
    /// exhausted.
    ///
    /// Transient statuses and transport errors are retried; any other status
    /// fails immediately as [`ClientError::Rejected`]. Exhaustion yields
    /// [`ClientError::Unavailable`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match err {
                AttemptError::Status { status, body } if !self.is_transient(status) => {
                    tracing::error!(operation, status, body = %body, "Remote rejected request");
                    return Err(ClientError::Rejected { status, body });
                }
                AttemptError::Decode(message) => return Err(ClientError::Decode(message)),
                transient => {
                    if attempt >= self.max_retries {
                        tracing::error!(
                            operation,
                            attempts = attempt + 1,
                            error = %transient,
                            "Remote unavailable, retries exhausted"
                        );
                        return Err(ClientError::Unavailable {
                            status: transient.status(),
                            attempts: attempt + 1,
                            message: transient.to_string(),
                        });
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %transient,
                        "Transient remote failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Minimum-interval gate between successive requests
pub struct PacingGate {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl PacingGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait if necessary so calls are at least `min_interval` apart
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Pacing: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}
