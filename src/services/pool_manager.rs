use serde::Serialize;
use tokio::sync::{AcquireError, Semaphore, SemaphorePermit};
use tracing::debug;

/// Process-wide cap on in-flight provider requests.
///
/// A permit is held for one attempt only, never across a backoff sleep.
pub struct FetchPool {
    semaphore: Semaphore,
    max_fetches: usize,
}

impl FetchPool {
    pub fn new(max_concurrent_fetches: usize) -> Self {
        debug!("Initializing fetch pool with {} slots", max_concurrent_fetches);

        Self {
            semaphore: Semaphore::new(max_concurrent_fetches),
            max_fetches: max_concurrent_fetches,
        }
    }

    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, AcquireError> {
        debug!("Acquiring fetch permit. Available: {}", self.semaphore.available_permits());
        self.semaphore.acquire().await
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.semaphore.available_permits();
        PoolStats {
            available,
            active: self.max_fetches.saturating_sub(available),
            total: self.max_fetches,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PoolStats {
    pub available: usize,
    pub active: usize,
    pub total: usize,
}

impl PoolStats {
    pub fn is_saturated(&self) -> bool {
        self.available == 0
    }
}
