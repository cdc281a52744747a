use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::models::university::FetchResult;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Details of a retry about to happen, handed to the retry hook.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// Number of the attempt that is about to start (2 for the first retry).
    pub attempt: u32,
    pub delay: Duration,
    pub error: FetchError,
}

/// Bounded exponential-backoff retry around one lookup.
///
/// Holds no mutable state, so one policy is shared by every concurrent fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    pub async fn execute<F, Fut>(&self, operation: F) -> FetchResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult>,
    {
        self.execute_with_hook(operation, |_| async {}).await
    }

    /// Runs `operation` until it succeeds or the attempt budget is spent.
    ///
    /// `on_retry` is awaited before each backoff sleep. After the last failed
    /// attempt the failure is returned wrapped in `RetryExhausted`, with the
    /// final cause kept intact.
    pub async fn execute_with_hook<F, Fut, H, HFut>(&self, mut operation: F, mut on_retry: H) -> FetchResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult>,
        H: FnMut(RetryAttempt) -> HFut,
        HFut: Future<Output = ()>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            let (country, error) = match operation().await {
                success @ FetchResult::Success { .. } => {
                    if attempt > 1 {
                        info!("Lookup for {} succeeded on attempt {}", success.country(), attempt);
                    }
                    return success;
                }
                FetchResult::Failure { country, error } => (country, error),
            };

            if attempt >= max_attempts {
                warn!(
                    "Lookup for {} failed on final attempt {} ({})",
                    country, attempt, error
                );
                return FetchResult::Failure {
                    country,
                    error: FetchError::RetryExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    },
                };
            }

            let delay = self.backoff_delay(attempt);
            warn!(
                "Lookup for {} failed on attempt {} ({}), retrying in {:?}",
                country, attempt, error, delay
            );

            attempt += 1;
            on_retry(RetryAttempt { attempt, delay, error }).await;
            sleep(delay).await;
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = calculate_backoff_delay(attempt, &self.config);
        if self.config.jitter {
            add_jitter(delay)
        } else {
            delay
        }
    }
}

fn calculate_backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let delay_secs = config.base_delay.as_secs_f64()
        * config.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

    Duration::from_secs_f64(delay_secs.min(config.max_delay.as_secs_f64()))
}

/// Full jitter: uniform between zero and the computed delay.
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}
