use crate::error::{AppError, AppResult, FetchError};
use crate::models::job::{Job, JobKind};
use crate::models::university::{merge_results, AggregateResponse, CountryBatch, FetchResult};
use crate::services::fetcher::Fetcher;
use crate::services::job_store::JobStore;
use crate::services::pool_manager::FetchPool;
use crate::services::retry::{RetryAttempt, RetryPolicy};
use crate::counter_inc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Runs lookups concurrently and reports progress into the [`JobStore`].
///
/// Cloning is cheap; spawned jobs carry their own clone.
#[derive(Clone)]
pub struct TaskExecutor {
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
    store: Arc<JobStore>,
    pool: Arc<FetchPool>,
}

impl TaskExecutor {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        retry: RetryPolicy,
        store: Arc<JobStore>,
        pool: Arc<FetchPool>,
    ) -> Self {
        Self {
            fetcher,
            retry,
            store,
            pool,
        }
    }

    /// Fetches every country concurrently without creating any job.
    #[instrument(skip(self, batch), fields(countries = batch.len()))]
    pub async fn run_sync(&self, batch: &CountryBatch) -> AggregateResponse {
        let mut fetches = Vec::with_capacity(batch.len());
        for country in batch.countries() {
            fetches.push(self.fetch_with_retry(country));
        }

        merge_results(join_all(fetches).await)
    }

    /// Fetches the countries one after another, in request order.
    #[instrument(skip(self, batch), fields(countries = batch.len()))]
    pub async fn run_sequential(&self, batch: &CountryBatch) -> AggregateResponse {
        let mut results = Vec::with_capacity(batch.len());
        for country in batch.countries() {
            results.push(self.fetch_with_retry(country).await);
        }

        merge_results(results)
    }

    /// Creates one job for the whole batch and runs it in the background.
    /// Returns as soon as the job exists.
    pub async fn spawn_batch(&self, batch: &CountryBatch) -> String {
        let job_id = self.store.create(JobKind::Batch, batch.countries().to_vec()).await;

        let executor = self.clone();
        let background_id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = executor.run_job(&background_id).await {
                error!("Batch job {} did not complete: {}", background_id, e);
            }
        });

        info!("Dispatched batch job {} for {} countries", job_id, batch.len());
        job_id
    }

    /// One job per country, all dispatched at once; waits for every job to
    /// finish and merges their results. A failing country never stops the
    /// others.
    #[instrument(skip(self, batch), fields(countries = batch.len()))]
    pub async fn run_fan_out(&self, batch: &CountryBatch) -> AppResult<AggregateResponse> {
        let mut handles = Vec::with_capacity(batch.len());
        for country in batch.countries() {
            let job_id = self.store.create(JobKind::FanOut, vec![country.clone()]).await;
            let executor = self.clone();
            let task_id = job_id.clone();
            let handle = tokio::spawn(async move { executor.run_job(&task_id).await });
            handles.push((job_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        let (job_ids, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (job_id, joined) in job_ids.iter().zip(join_all(handles).await) {
            let job = joined
                .map_err(|e| AppError::Internal(format!("Fan-out job {job_id} aborted: {e}")))??;
            results.extend(job.results.into_values());
        }

        Ok(merge_results(results))
    }

    /// Drives a stored job from PENDING to its terminal state.
    #[instrument(skip(self))]
    pub async fn run_job(&self, job_id: &str) -> AppResult<Job> {
        let job = self.store.get(job_id).await?;
        self.store.mark_running(job_id).await?;

        let mut fetches = Vec::with_capacity(job.countries.len());
        for country in &job.countries {
            fetches.push(self.fetch_and_record(job_id, country));
        }
        join_all(fetches).await;

        let outcome = self.store.get(job_id).await?.outcome_from_results();
        self.store.finalize(job_id, outcome).await
    }

    async fn fetch_with_retry(&self, country: &str) -> FetchResult {
        self.retry.execute(move || self.fetch_once(country)).await
    }

    async fn fetch_and_record(&self, job_id: &str, country: &str) {
        let result = self.fetch_for_job(job_id, country).await;
        if let Err(e) = self.store.record_partial(job_id, result).await {
            warn!("Could not record result for {} on job {}: {}", country, job_id, e);
        }
    }

    async fn fetch_for_job(&self, job_id: &str, country: &str) -> FetchResult {
        self.retry
            .execute_with_hook(
                move || async move {
                    // Moves RETRY back to RUNNING as the next attempt starts.
                    if let Err(e) = self.store.mark_running(job_id).await {
                        warn!("Could not mark job {} running: {}", job_id, e);
                    }
                    self.fetch_once(country).await
                },
                move |retry: RetryAttempt| async move {
                    debug!(
                        "Job {} retrying {} (attempt {}) in {:?} after {}",
                        job_id, country, retry.attempt, retry.delay, retry.error.kind()
                    );
                    counter_inc!("fetch_retries_total");
                    if let Err(e) = self.store.mark_retry(job_id, country).await {
                        warn!("Could not mark retry for {} on job {}: {}", country, job_id, e);
                    }
                },
            )
            .await
    }

    async fn fetch_once(&self, country: &str) -> FetchResult {
        let _permit = match self.pool.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return FetchResult::Failure {
                    country: country.to_string(),
                    error: FetchError::NetworkError {
                        message: format!("Fetch pool closed: {e}"),
                    },
                };
            }
        };

        counter_inc!("fetch_attempts_total");
        let result = self.fetcher.fetch(country).await;
        if let FetchResult::Failure { error, .. } = &result {
            counter_inc!("fetch_failures_total", "kind" => error.kind());
        }
        result
    }
}
