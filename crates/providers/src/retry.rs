//! Bounded exponential backoff around a model provider.
//!
//! [`complete_with_retry`] re-issues a failed [`Provider`] call while the
//! error carries a retryable HTTP status code and attempts remain. The n-th
//! retry waits `initial_delay * exp_base^(n-1)`, capped at `max_delay`.
//! Once the budget is spent the caller gets
//! [`ProviderError::ExhaustedRetries`] wrapping the last error.

use std::time::Duration;
use tandem_config::RetryConfig;
use tandem_core::error::ProviderError;
use tandem_core::event::{DomainEvent, EventBus};
use tandem_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tracing::{debug, warn};

/// When and how long to back off between model calls.
///
/// ```
/// use tandem_providers::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default()
///     .with_max_attempts(3)
///     .with_initial_delay(Duration::from_millis(100));
///
/// assert_eq!(policy.delay_for_retry(1), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_retry(2), Duration::from_millis(700));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first call)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,

    /// Multiplier applied per retry
    pub exp_base: f64,

    /// Status codes that are worth another attempt
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    /// 5 attempts, 1s initial delay, 7x growth, 60s cap, retrying 429/500/503/504.
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.attempts.max(1),
            initial_delay: secs(config.initial_delay_secs),
            max_delay: secs(config.max_delay_secs),
            exp_base: config.exp_base,
            retryable_status_codes: config.http_status_codes.clone(),
        }
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_exp_base(mut self, exp_base: f64) -> Self {
        self.exp_base = exp_base;
        self
    }

    /// Delay before the given retry (1-based: retry 1 follows the first failure).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let raw = self.initial_delay.as_secs_f64() * self.exp_base.powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        if raw.is_finite() {
            secs(raw.min(cap))
        } else {
            self.max_delay
        }
    }

    /// Whether `error` is worth another attempt under this policy.
    pub fn should_retry(&self, error: &ProviderError) -> bool {
        error.is_retryable(&self.retryable_status_codes)
    }
}

/// Call `provider` under `policy`, publishing a `ModelCallRetried` event on
/// `events` before every backoff sleep.
pub async fn complete_with_retry(
    provider: &dyn Provider,
    policy: &RetryPolicy,
    request: ProviderRequest,
    events: Option<&EventBus>,
) -> std::result::Result<ProviderResponse, ProviderError> {
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let error = match provider.complete(request.clone()).await {
            Ok(response) => {
                if attempt > 1 {
                    debug!(
                        provider = %provider.name(),
                        attempt,
                        "Model call succeeded after retry"
                    );
                }
                return Ok(response);
            }
            Err(e) => e,
        };

        if !policy.should_retry(&error) {
            return Err(error);
        }

        if attempt >= policy.max_attempts {
            warn!(
                provider = %provider.name(),
                attempts = attempt,
                error = %error,
                "Model call failed, retries exhausted"
            );
            return Err(ProviderError::ExhaustedRetries {
                attempts: attempt,
                last_error: Box::new(error),
            });
        }

        let delay = policy.delay_for_retry(attempt);
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        warn!(
            provider = %provider.name(),
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms,
            error = %error,
            "Model call failed, backing off"
        );

        if let Some(events) = events {
            events.publish(DomainEvent::ModelCallRetried {
                provider: provider.name().to_string(),
                attempt,
                status_code: error.status_code(),
                delay_ms,
                timestamp: chrono::Utc::now(),
            });
        }

        tokio::time::sleep(delay).await;
    }
}
