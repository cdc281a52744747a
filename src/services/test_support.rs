//! In-memory provider stand-ins shared by the executor, orchestrator and route tests.

use crate::config::{QueueConfig, RetryConfig};
use crate::error::FetchError;
use crate::models::university::{FetchResult, UniversityRecord};
use crate::services::fetcher::Fetcher;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub enum Script {
    Succeed(Vec<UniversityRecord>),
    AlwaysFail,
    /// Fail the first `n` calls, then succeed.
    FailTimes(u32, Vec<UniversityRecord>),
}

/// Fetcher answering from a per-country script.
///
/// Countries without a script succeed with an empty list. When built with
/// `gated`, each call waits for a permit from `release` before answering.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: HashMap<String, Script>,
    calls: Mutex<HashMap<String, u32>>,
    total_calls: AtomicU32,
    gate: Option<Semaphore>,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, country: &str, script: Script) -> Self {
        self.scripts.insert(country.to_string(), script);
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls_for(&self, country: &str) -> u32 {
        self.calls.lock().unwrap().get(country).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, country: &str) -> FetchResult {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(country.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let failure = || FetchResult::Failure {
            country: country.to_string(),
            error: FetchError::ProviderError {
                status: 503,
                message: format!("{country} unavailable (call {call})"),
            },
        };
        let success = |records: &Vec<UniversityRecord>| FetchResult::Success {
            country: country.to_string(),
            records: records.clone(),
        };

        match self.scripts.get(country) {
            None => success(&Vec::new()),
            Some(Script::Succeed(records)) => success(records),
            Some(Script::AlwaysFail) => failure(),
            Some(Script::FailTimes(n, _)) if call <= *n => failure(),
            Some(Script::FailTimes(_, records)) => success(records),
        }
    }
}

pub fn records(country: &str, names: &[&str]) -> Vec<UniversityRecord> {
    names
        .iter()
        .map(|name| UniversityRecord {
            country: Some(country.to_string()),
            name: Some(name.to_string()),
            web_pages: vec![format!("https://{}.example.edu/", name.to_lowercase().replace(' ', "-"))],
            alpha_two_code: None,
            domains: vec![],
        })
        .collect()
}

pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

pub fn queue_limits() -> QueueConfig {
    QueueConfig {
        max_concurrent_fetches: 8,
        max_batch_size: 10,
        max_country_length: 100,
    }
}
