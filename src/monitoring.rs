use crate::services::job_store::JobStats;
use crate::services::pool_manager::PoolStats;
use crate::services::{FetchPool, JobStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: i64,
    pub jobs: JobStats,
    pub fetch_pool: PoolStats,
}

pub struct HealthChecker {
    start_time: DateTime<Utc>,
    job_store: Arc<JobStore>,
    fetch_pool: Arc<FetchPool>,
}

impl HealthChecker {
    pub fn new(job_store: Arc<JobStore>, fetch_pool: Arc<FetchPool>) -> Self {
        Self {
            start_time: Utc::now(),
            job_store,
            fetch_pool,
        }
    }

    /// "degraded" while every fetch slot is busy, "healthy" otherwise.
    pub async fn get_health_status(&self) -> HealthStatus {
        let now = Utc::now();
        let fetch_pool = self.fetch_pool.stats();
        let status = if fetch_pool.is_saturated() { "degraded" } else { "healthy" };

        HealthStatus {
            status: status.to_string(),
            timestamp: now,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: (now - self.start_time).num_seconds(),
            jobs: self.job_store.stats().await,
            fetch_pool,
        }
    }
}
