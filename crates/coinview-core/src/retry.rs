//! Bounded retry of network fetches.

use std::future::Future;
use std::time::Duration;

use crate::error::NetworkError;

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Fixed { delay: Duration },
    /// `base * factor^retry`, capped at `max`, optionally jittered by +/- 50%.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scaled = base.as_secs_f64() * factor.powi(retry as i32);
                let capped = Duration::from_secs_f64(scaled.min(max.as_secs_f64()));
                if !jitter {
                    return capped;
                }

                let spread = capped.as_millis() as u64 / 2;
                let offset = fastrand::u64(0..=spread * 2);
                Duration::from_millis((capped.as_millis() as u64 + offset).saturating_sub(spread))
            }
        }
    }
}

/// Which failures trigger another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryMode {
    /// Retry only transient failures (see [`NetworkError::is_retryable`]),
    /// waiting per the backoff.
    #[default]
    Classified,
    /// Retry every failure immediately, ignoring the backoff.
    Uniform,
}

/// Attempt budget and policy for one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first; `0` behaves like `1`.
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub mode: RetryMode,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            mode: RetryMode::Classified,
        }
    }
}

impl RetryConfig {
    /// Repeat every failure with no delay.
    pub fn uniform(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::None,
            mode: RetryMode::Uniform,
        }
    }

    /// Retry transient failures after a fixed delay.
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed { delay },
            mode: RetryMode::Classified,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::None,
            mode: RetryMode::Classified,
        }
    }

    pub fn should_retry(&self, error: &NetworkError) -> bool {
        match self.mode {
            RetryMode::Uniform => true,
            RetryMode::Classified => error.is_retryable(),
        }
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        match self.mode {
            RetryMode::Uniform => Duration::ZERO,
            RetryMode::Classified => self.backoff.delay(retry),
        }
    }

    /// Run `operation` until it succeeds, a failure is not retryable, or the
    /// attempt budget is spent. The last failure is returned.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, NetworkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NetworkError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if attempt >= attempts || !self.should_retry(&error) {
                return Err(error);
            }

            let delay = self.delay_for_retry(attempt - 1);
            tracing::debug!(
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                code = error.code(),
                "retrying fetch"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
