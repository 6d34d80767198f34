//! Bounded exponential backoff around a single upstream call.
//!
//! The executor is stateless: it never sees session data, it only re-invokes
//! the call it was handed while the failure stays transient.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chat_types::{config::RetryConfig, ChatError, Result};
use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Retry configuration resolved into durations.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Extra random delay, as a fraction of the backoff step
    pub jitter_ratio: f64,
    pub retryable: fn(&ChatError) -> bool,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter_ratio", &self.jitter_ratio)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio,
            retryable: ChatError::is_transient,
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt` (1-based), without jitter.
    /// `min(max_delay, base_delay * 2^(attempt - 2))`; zero for the first attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (attempt - 2).min(31);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff plus `unit * jitter_ratio` of itself, clamped to `max_delay`.
    /// `unit` is expected in `[0, 1)`.
    pub fn jittered(&self, attempt: u32, unit: f64) -> Duration {
        let step = self.backoff(attempt);
        let extra = step.mul_f64(self.jitter_ratio * unit.clamp(0.0, 1.0));
        (step + extra).min(self.max_delay)
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let unit: f64 = rand::thread_rng().gen();
        self.jittered(attempt, unit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_cancellable(&CancellationToken::new(), call).await
    }

    /// Run `call` until it succeeds, fails terminally, or the attempt budget
    /// is spent. Cancelling `cancel` abandons the in-flight attempt or the
    /// pending backoff and returns `Cancelled` without another attempt.
    pub async fn execute_cancellable<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                outcome = call() => outcome,
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("Upstream recovered on attempt {}", attempt);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !(self.policy.retryable)(&err) {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                log::warn!("Upstream still failing after {} attempts: {}", attempt, err);
                return Err(ChatError::UpstreamExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            attempt += 1;
            let delay = self.policy.next_delay(attempt);
            log::warn!(
                "Transient upstream failure ({}), attempt {}/{} in {}ms",
                err,
                attempt,
                self.policy.max_attempts,
                delay.as_millis()
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
