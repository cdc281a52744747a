use crate::services::JobStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

/// Periodically drops finished jobs older than the retention window.
#[derive(Clone)]
pub struct RetentionService {
    job_store: Arc<JobStore>,
    retention: Duration,
    cleanup_interval: Duration,
}

impl RetentionService {
    pub fn new(job_store: Arc<JobStore>, retention: Duration, cleanup_interval: Duration) -> Self {
        Self {
            job_store,
            retention,
            cleanup_interval,
        }
    }

    pub async fn start_background_cleanup(&self) {
        let mut interval = interval(self.cleanup_interval);

        info!(
            "Starting retention cleanup: keeping finished jobs for {:?}, sweeping every {:?}",
            self.retention, self.cleanup_interval
        );

        loop {
            interval.tick().await;
            self.run_cleanup().await;
        }
    }

    /// One sweep. Returns the number of jobs removed.
    pub async fn run_cleanup(&self) -> usize {
        let removed = self.job_store.purge_expired(self.retention).await;

        if removed.is_empty() {
            debug!("No expired jobs found");
        } else {
            info!("Removed {} expired jobs", removed.len());
        }
        removed.len()
    }
}
