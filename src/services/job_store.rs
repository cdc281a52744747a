use crate::counter_inc;
use crate::error::{AppError, AppResult};
use crate::models::job::{Job, JobKind, JobOutcome, JobStatus};
use crate::models::university::FetchResult;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// In-memory registry of jobs.
///
/// The map lock is only held long enough to find a job; each job has its own
/// mutex, so writers to different jobs never contend and every read of a job
/// observes the last completed write to it. Writes to a job that has reached
/// SUCCESS or FAILURE are rejected with `AppError::Conflict`.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Arc<Mutex<Job>>>>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct JobStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub retry: usize,
    pub success: usize,
    pub failure: usize,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, kind: JobKind, countries: Vec<String>) -> String {
        let job = Job::new(kind, countries);
        let job_id = job.id.clone();

        self.jobs
            .write()
            .await
            .insert(job_id.clone(), Arc::new(Mutex::new(job)));

        counter_inc!("jobs_created_total", "kind" => format!("{kind:?}").to_lowercase());
        debug!("Created job {} ({:?})", job_id, kind);
        job_id
    }

    /// Snapshot of a job.
    pub async fn get(&self, job_id: &str) -> AppResult<Job> {
        let job = self.lookup(job_id).await?;
        let job = job.lock().await;
        Ok(job.clone())
    }

    pub async fn mark_running(&self, job_id: &str) -> AppResult<()> {
        self.update(job_id, |job| {
            if job.status != JobStatus::Running {
                job.update_status(JobStatus::Running);
            }
            Ok(())
        })
        .await
    }

    pub async fn mark_retry(&self, job_id: &str, country: &str) -> AppResult<()> {
        self.update(job_id, |job| {
            if job.status == JobStatus::Pending {
                return Err(AppError::Conflict(format!(
                    "Job {} has not started, cannot retry",
                    job.id
                )));
            }
            ensure_member(job, country)?;
            job.record_retry(country);
            job.update_status(JobStatus::Retry);
            Ok(())
        })
        .await
    }

    pub async fn record_partial(&self, job_id: &str, result: FetchResult) -> AppResult<()> {
        self.update(job_id, |job| {
            ensure_member(job, result.country())?;
            job.record_result(result);
            Ok(())
        })
        .await
    }

    /// Moves a job to its terminal state. Every requested country must
    /// already have a recorded result, and `outcome` must agree with them:
    /// SUCCESS only when every country succeeded.
    pub async fn finalize(&self, job_id: &str, outcome: JobOutcome) -> AppResult<Job> {
        let job = self
            .update(job_id, |job| {
                if !job.all_results_in() {
                    return Err(AppError::Conflict(format!(
                        "Job {} still has outstanding countries",
                        job.id
                    )));
                }
                let recorded = job.outcome_from_results();
                if outcome != recorded {
                    return Err(AppError::Conflict(format!(
                        "Job {} cannot finish as {:?}, its results say {:?}",
                        job.id, outcome, recorded
                    )));
                }
                job.update_status(outcome.into());
                Ok(job.clone())
            })
            .await?;

        counter_inc!("jobs_finalized_total", "status" => job.status);
        info!("Job {} finished with status {}", job.id, job.status);
        Ok(job)
    }

    /// Removes a terminal job.
    pub async fn delete(&self, job_id: &str) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| AppError::job_not_found(job_id))?;

        let status = job.lock().await.status;
        if !status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Job {job_id} is {status}, only finished jobs can be deleted"
            )));
        }

        jobs.remove(job_id);
        info!("Deleted job {}", job_id);
        Ok(())
    }

    /// Drops terminal jobs that finished more than `retention` ago and returns
    /// their ids. Jobs still in flight are never touched.
    pub async fn purge_expired(&self, retention: Duration) -> Vec<String> {
        let Some(cutoff) = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            return Vec::new();
        };

        let mut jobs = self.jobs.write().await;
        let expired: Vec<String> = jobs
            .iter()
            .filter_map(|(id, job)| {
                // A locked job is being written, so it is not finished.
                let job = job.try_lock().ok()?;
                match job.finished_at {
                    Some(finished) if job.status.is_terminal() && finished <= cutoff => Some(id.clone()),
                    _ => None,
                }
            })
            .collect();

        for id in &expired {
            jobs.remove(id);
        }
        expired
    }

    pub async fn stats(&self) -> JobStats {
        let handles: Vec<_> = self.jobs.read().await.values().cloned().collect();

        let mut stats = JobStats {
            total: handles.len(),
            ..JobStats::default()
        };
        for handle in handles {
            match handle.lock().await.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Retry => stats.retry += 1,
                JobStatus::Success => stats.success += 1,
                JobStatus::Failure => stats.failure += 1,
            }
        }
        stats
    }

    async fn lookup(&self, job_id: &str) -> AppResult<Arc<Mutex<Job>>> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| AppError::job_not_found(job_id))
    }

    async fn update<T, F>(&self, job_id: &str, apply: F) -> AppResult<T>
    where
        F: FnOnce(&mut Job) -> AppResult<T>,
    {
        let handle = self.lookup(job_id).await?;
        let mut job = handle.lock().await;
        if job.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Job {} is already {}",
                job.id, job.status
            )));
        }
        apply(&mut job)
    }
}

fn ensure_member(job: &Job, country: &str) -> AppResult<()> {
    if job.countries.iter().any(|c| c == country) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Country '{}' is not part of job {}",
            country, job.id
        )))
    }
}
