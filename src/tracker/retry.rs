//! Bounded exponential backoff for tracker calls

use log::warn;
use std::future::Future;
use std::time::Duration;

use super::TrackerError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy with no waiting, for tests
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 2.0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_delay < self.initial_delay {
            return Err("Max delay must be greater than or equal to initial delay".to_string());
        }
        if self.multiplier < 1.0 {
            return Err("Multiplier must be at least 1.0".to_string());
        }
        Ok(())
    }

    /// Wait before retry number `retry` (0-based). A server-provided
    /// retry-after takes precedence over the computed backoff.
    pub fn delay_for(&self, retry: u32, error: &TrackerError) -> Duration {
        if let TrackerError::RateLimited { retry_after: Some(wait) } = error {
            return *wait;
        }
        let factor = self.multiplier.powi(retry.min(32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Run `operation` until it succeeds, fails fatally, or retries run out
    pub async fn run<T, F, Fut>(&self, description: &str, mut operation: F) -> Result<T, TrackerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TrackerError>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if retry >= self.max_retries => {
                    return Err(TrackerError::RetriesExhausted {
                        attempts: retry + 1,
                        last: Box::new(e),
                    })
                }
                Err(e) => {
                    let delay = self.delay_for(retry, &e);
                    warn!(
                        "{} failed ({}), retry {} of {} in {:?}",
                        description,
                        e,
                        retry + 1,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }
}
