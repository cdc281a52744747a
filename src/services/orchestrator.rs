use crate::config::QueueConfig;
use crate::error::AppResult;
use crate::models::job::Job;
use crate::models::university::{AggregateResponse, CountryBatch};
use crate::services::executor::TaskExecutor;
use crate::services::job_store::JobStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Submission and status entry points wired to the HTTP layer.
pub struct Orchestrator {
    executor: TaskExecutor,
    store: Arc<JobStore>,
    limits: QueueConfig,
}

impl Orchestrator {
    pub fn new(executor: TaskExecutor, store: Arc<JobStore>, limits: QueueConfig) -> Self {
        Self {
            executor,
            store,
            limits,
        }
    }

    pub fn batch(&self, countries: Vec<String>) -> AppResult<CountryBatch> {
        CountryBatch::new(countries, &self.limits)
    }

    /// Blocks until every country has resolved. No job is recorded.
    pub async fn submit_sync(&self, batch: &CountryBatch) -> AggregateResponse {
        info!("Running synchronous lookup for {} countries", batch.len());
        self.executor.run_sync(batch).await
    }

    /// Same result shape as [`Orchestrator::submit_sync`], fetched one
    /// country at a time.
    pub async fn submit_sequential(&self, batch: &CountryBatch) -> AggregateResponse {
        info!("Running sequential lookup for {} countries", batch.len());
        self.executor.run_sequential(batch).await
    }

    /// Starts a background batch job and hands back its id.
    pub async fn submit_async(&self, batch: &CountryBatch) -> String {
        self.executor.spawn_batch(batch).await
    }

    /// Fans the batch out into one job per country and waits for all of them.
    pub async fn submit_parallel(&self, batch: &CountryBatch) -> AppResult<AggregateResponse> {
        info!("Fanning out {} countries into parallel jobs", batch.len());
        self.executor.run_fan_out(batch).await
    }

    pub async fn status(&self, job_id: &str) -> AppResult<Job> {
        let job = self.store.get(job_id).await?;
        debug!("Job {} status: {}", job_id, job.status);
        Ok(job)
    }

    pub async fn delete(&self, job_id: &str) -> AppResult<()> {
        self.store.delete(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::job::JobStatus;
    use crate::models::university::CountryOutcome;
    use crate::services::pool_manager::FetchPool;
    use crate::services::retry::RetryPolicy;
    use crate::services::test_support::{fast_retry, queue_limits, records, Script, ScriptedFetcher};
    use std::time::Duration;

    fn orchestrator(fetcher: Arc<ScriptedFetcher>, max_attempts: u32) -> Orchestrator {
        let store = Arc::new(JobStore::new());
        let executor = TaskExecutor::new(
            fetcher,
            RetryPolicy::new(fast_retry(max_attempts)),
            store.clone(),
            Arc::new(FetchPool::new(8)),
        );
        Orchestrator::new(executor, store, queue_limits())
    }

    async fn poll_until_terminal(orchestrator: &Orchestrator, job_id: &str) -> Job {
        for _ in 0..500 {
            let job = orchestrator.status(job_id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never finished");
    }

    #[tokio::test]
    async fn sync_lookup_returns_provider_records() {
        let turkey = records("Turkey", &["Bogazici", "METU", "Bilkent"]);
        let fetcher = Arc::new(ScriptedFetcher::new().with("turkey", Script::Succeed(turkey.clone())));
        let orchestrator = orchestrator(fetcher, 5);

        let batch = orchestrator.batch(vec!["turkey".into()]).unwrap();
        let result = orchestrator.submit_sync(&batch).await;

        assert_eq!(result.len(), 1);
        assert_eq!(result["turkey"], CountryOutcome::Records(turkey));
    }

    #[tokio::test]
    async fn parallel_lookup_surfaces_exhausted_country() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with("turkey", Script::Succeed(records("Turkey", &["METU"])))
                .with("australia", Script::Succeed(records("Australia", &["ANU", "UNSW"])))
                .with("india", Script::AlwaysFail),
        );
        let orchestrator = orchestrator(fetcher.clone(), 5);

        let batch = orchestrator
            .batch(vec!["turkey".into(), "india".into(), "australia".into()])
            .unwrap();
        let result = orchestrator.submit_parallel(&batch).await.unwrap();

        assert!(matches!(&result["turkey"], CountryOutcome::Records(r) if r.len() == 1));
        assert!(matches!(&result["australia"], CountryOutcome::Records(r) if r.len() == 2));
        assert!(matches!(&result["india"], CountryOutcome::Failed { .. }));
        assert_eq!(fetcher.calls_for("india"), 5);

        let stats = orchestrator.store.stats().await;
        assert_eq!(stats.failure, 1);
        assert_eq!(stats.success, 2);
    }

    #[tokio::test]
    async fn async_submission_returns_before_fetch_completes() {
        let turkey = records("Turkey", &["Bogazici"]);
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with("turkey", Script::Succeed(turkey.clone()))
                .gated(),
        );
        let orchestrator = orchestrator(fetcher.clone(), 5);

        let batch = orchestrator.batch(vec!["turkey".into()]).unwrap();
        let job_id = orchestrator.submit_async(&batch).await;

        let early = orchestrator.status(&job_id).await.unwrap();
        assert!(matches!(early.status, JobStatus::Pending | JobStatus::Running));
        assert!(early.results.is_empty());

        fetcher.release(1);
        let job = poll_until_terminal(&orchestrator, &job_id).await;
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.aggregate()["turkey"], CountryOutcome::Records(turkey));
    }

    #[tokio::test]
    async fn polling_a_finished_job_is_stable() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let orchestrator = orchestrator(fetcher, 1);

        let batch = orchestrator.batch(vec!["turkey".into()]).unwrap();
        let job_id = orchestrator.submit_async(&batch).await;
        let first = poll_until_terminal(&orchestrator, &job_id).await;

        for _ in 0..3 {
            assert_eq!(orchestrator.status(&job_id).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let orchestrator = orchestrator(Arc::new(ScriptedFetcher::new()), 1);
        assert!(matches!(
            orchestrator.status("no-such-job").await,
            Err(AppError::NotFound(_))
        ));
    }
}
