// src/provider/retry.rs — Retry with exponential backoff for model calls
//
// Retries: rate limits (429), server errors (5xx), timeouts, connection resets.
// Does NOT retry: bad request (400), auth errors (401, 403), parse failures.

use std::time::Duration;

use super::{ChatRequest, ChatResponse, ModelProvider};
use crate::infra::config::RetrySettings;
use crate::infra::errors::EvoError;

const MAX_RETRIES: u32 = 3;
const MIN_DELAY_MS: f64 = 100.0;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            backoff_factor: s.backoff_factor,
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter_fraction: s.jitter_fraction,
        }
    }
}

impl RetryConfig {
    /// Same backoff curve, different budget. Agents carry their own retry budget.
    pub fn with_max_retries(&self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self.clone()
        }
    }

    /// Calculate the delay for a given retry attempt (0-indexed).
    fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        // If the server told us how long to wait, use that (with a small buffer).
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay + Duration::from_millis(100);
        }

        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.jitter_fraction);
        let floor = MIN_DELAY_MS.min(self.initial_delay.as_millis() as f64);
        let final_ms = (capped_ms * jitter).max(floor);

        Duration::from_millis(final_ms as u64)
    }
}

/// A failed call after the retry budget was spent (or a non-retriable error).
#[derive(Debug)]
pub struct RetryFailure {
    pub attempts: u32,
    pub error: EvoError,
}

/// Determine if an error should be retried.
fn should_retry(error: &EvoError) -> bool {
    error.is_retriable()
}

/// Extract rate-limit retry delay from the error, if available.
fn rate_limit_delay(error: &EvoError) -> Option<Duration> {
    match error {
        EvoError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in tests.
/// Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

/// Call the provider, retrying transient failures with exponential backoff.
pub async fn chat_with_retry(
    provider: &dyn ModelProvider,
    request: ChatRequest,
    config: &RetryConfig,
) -> Result<ChatResponse, RetryFailure> {
    let mut attempt = 0;
    loop {
        match provider.chat(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                if !should_retry(&e) || attempt >= config.max_retries {
                    return Err(RetryFailure {
                        attempts: attempt + 1,
                        error: e,
                    });
                }

                let delay = config.delay_for_attempt(attempt, rate_limit_delay(&e));
                tracing::warn!(
                    provider = provider.id(),
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after error: {}",
                    e
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
