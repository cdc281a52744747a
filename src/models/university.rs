use crate::config::QueueConfig;
use crate::error::{AppError, AppResult, FetchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of the university directory, as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversityRecord {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub web_pages: Vec<String>,
    #[serde(default)]
    pub alpha_two_code: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
}

/// Request body for the batch endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CountryRequest {
    pub countries: Vec<String>,
}

/// A validated set of country names.
///
/// Names are trimmed and duplicates collapsed while keeping first-seen order,
/// so every consumer sees exactly one entry per distinct country.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryBatch {
    countries: Vec<String>,
}

impl CountryBatch {
    pub fn new(raw: Vec<String>, limits: &QueueConfig) -> AppResult<Self> {
        if raw.is_empty() {
            return Err(AppError::BadRequest("countries must not be empty".to_string()));
        }
        if raw.len() > limits.max_batch_size {
            return Err(AppError::BadRequest(format!(
                "too many countries: {} (max: {})",
                raw.len(),
                limits.max_batch_size
            )));
        }

        let mut countries: Vec<String> = Vec::with_capacity(raw.len());
        for name in raw {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::BadRequest("country names must not be blank".to_string()));
            }
            if name.contains('\0') {
                return Err(AppError::BadRequest("country name contains null bytes".to_string()));
            }
            let length = name.chars().count();
            if length > limits.max_country_length {
                return Err(AppError::BadRequest(format!(
                    "country name too long: {} characters (max: {})",
                    length,
                    limits.max_country_length
                )));
            }
            if !countries.iter().any(|c| c == name) {
                countries.push(name.to_string());
            }
        }

        Ok(Self { countries })
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }
}

/// Outcome of one lookup for one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchResult {
    Success {
        country: String,
        records: Vec<UniversityRecord>,
    },
    Failure {
        country: String,
        error: FetchError,
    },
}

impl FetchResult {
    pub fn country(&self) -> &str {
        match self {
            FetchResult::Success { country, .. } | FetchResult::Failure { country, .. } => country,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }
}

/// What the caller sees for one country: the record list, or a failure marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountryOutcome {
    Records(Vec<UniversityRecord>),
    Failed { error: FetchError },
}

impl From<FetchResult> for CountryOutcome {
    fn from(result: FetchResult) -> Self {
        match result {
            FetchResult::Success { records, .. } => CountryOutcome::Records(records),
            FetchResult::Failure { error, .. } => CountryOutcome::Failed { error },
        }
    }
}

/// Country → outcome, one entry per distinct requested country.
pub type AggregateResponse = BTreeMap<String, CountryOutcome>;

pub fn merge_results<I>(results: I) -> AggregateResponse
where
    I: IntoIterator<Item = FetchResult>,
{
    results
        .into_iter()
        .map(|result| (result.country().to_string(), CountryOutcome::from(result)))
        .collect()
}
