use crate::models::university::{merge_results, AggregateResponse, FetchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Retry,
    Success,
    Failure,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Retry => write!(f, "RETRY"),
            JobStatus::Success => write!(f, "SUCCESS"),
            JobStatus::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Terminal outcome handed to the store when a job finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure,
}

impl From<JobOutcome> for JobStatus {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Success => JobStatus::Success,
            JobOutcome::Failure => JobStatus::Failure,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// One job covering every country of a batch.
    Batch,
    /// One single-country job of a parallel fan-out group.
    FanOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub countries: Vec<String>,
    pub results: BTreeMap<String, FetchResult>,
    /// Retry attempts started so far, per country.
    /// Retries per country; absent when the first attempt settled it.
    pub retries: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(kind: JobKind, countries: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            status: JobStatus::Pending,
            countries,
            results: BTreeMap::new(),
            retries: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn update_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
        if status.is_terminal() {
            self.finished_at = Some(self.updated_at);
        }
    }

    pub fn record_result(&mut self, result: FetchResult) {
        self.results.insert(result.country().to_string(), result);
        self.updated_at = Utc::now();
    }

    /// Counts one more retry for `country`.
    pub fn record_retry(&mut self, country: &str) {
        *self.retries.entry(country.to_string()).or_insert(0) += 1;
        self.updated_at = Utc::now();
    }

    /// True once every requested country has a recorded outcome.
    pub fn all_results_in(&self) -> bool {
        self.countries.iter().all(|c| self.results.contains_key(c))
    }

    pub fn outcome_from_results(&self) -> JobOutcome {
        if self.results.values().all(FetchResult::is_success) {
            JobOutcome::Success
        } else {
            JobOutcome::Failure
        }
    }

    pub fn aggregate(&self) -> AggregateResponse {
        merge_results(self.results.values().cloned())
    }
}
