use crate::config::ProviderConfig;
use crate::error::FetchError;
use crate::models::university::{FetchResult, UniversityRecord};
use crate::{counter_inc, histogram_record};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Single-attempt lookup of one country's universities.
///
/// Implementations never retry and never panic on provider trouble: every
/// failure comes back as [`FetchResult::Failure`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, country: &str) -> FetchResult;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpFetcher {
    pub fn new(config: ProviderConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::NetworkError {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    /// Appends the search path to the base URL, keeping any path prefix the
    /// base already has (`https://host/api` + `/search` is `/api/search`).
    fn search_url(&self) -> Result<url::Url, FetchError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::NetworkError {
                message: format!("Provider URL {} cannot carry a path", self.config.base_url),
            })?
            .pop_if_empty()
            .extend(self.config.search_path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    async fn lookup(&self, country: &str) -> Result<Vec<UniversityRecord>, FetchError> {
        let url = self.search_url()?;
        let response = self
            .client
            .get(url)
            .query(&[("country", country)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::ProviderError {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        let body = response.text().await?;
        parse_records(&body, self.config.strict_parsing).await
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, country: &str) -> FetchResult {
        let start = Instant::now();
        let result = self.lookup(country).await;
        histogram_record!("fetch_duration_ms", start.elapsed().as_millis() as f64);

        match result {
            Ok(records) => {
                debug!("Fetched {} universities for {}", records.len(), country);
                FetchResult::Success {
                    country: country.to_string(),
                    records,
                }
            }
            Err(error) => {
                warn!("Lookup for {} failed: {}", country, error);
                FetchResult::Failure {
                    country: country.to_string(),
                    error,
                }
            }
        }
    }
}

/// Parses a provider payload, keeping provider order.
///
/// The payload itself must be a JSON array. A single record that does not fit
/// the schema is dropped in lenient mode and fails the lookup in strict mode.
async fn parse_records(body: &str, strict: bool) -> Result<Vec<UniversityRecord>, FetchError> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let mut records = Vec::with_capacity(raw.len());

    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<UniversityRecord>(value) {
            Ok(record) => records.push(record),
            Err(e) if strict => {
                return Err(FetchError::DecodeError {
                    message: format!("record {index}: {e}"),
                });
            }
            Err(e) => {
                warn!("Dropping malformed record {}: {}", index, e);
                counter_inc!("records_dropped_total");
            }
        }
    }

    Ok(records)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_config(server: &MockServer, strict_parsing: bool) -> ProviderConfig {
        ProviderConfig {
            base_url: url::Url::parse(&server.uri()).unwrap(),
            search_path: "/search".to_string(),
            request_timeout: Duration::from_secs(5),
            strict_parsing,
        }
    }

    fn turkey_payload() -> serde_json::Value {
        serde_json::json!([
            {"country": "Turkey", "name": "Bogazici University", "web_pages": ["http://www.boun.edu.tr/"], "alpha_two_code": "TR", "domains": ["boun.edu.tr"]},
            {"country": "Turkey", "name": "Ankara University", "web_pages": [], "alpha_two_code": "TR", "domains": []},
            {"country": "Turkey", "name": "Hacettepe University", "alpha_two_code": "TR"}
        ])
    }

    #[tokio::test]
    async fn fetch_parses_records_in_provider_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("country", "turkey"))
            .respond_with(ResponseTemplate::new(200).set_body_json(turkey_payload()))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(provider_config(&server, false)).unwrap();
        match fetcher.fetch("turkey").await {
            FetchResult::Success { country, records } => {
                assert_eq!(country, "turkey");
                let names: Vec<_> = records.iter().filter_map(|r| r.name.as_deref()).collect();
                assert_eq!(names, ["Bogazici University", "Ankara University", "Hacettepe University"]);
                assert_eq!(records[0].domains, ["boun.edu.tr"]);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn base_url_path_prefix_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .and(query_param("country", "turkey"))
            .respond_with(ResponseTemplate::new(200).set_body_json(turkey_payload()))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            base_url: url::Url::parse(&format!("{}/api/v1", server.uri())).unwrap(),
            ..provider_config(&server, false)
        };
        let fetcher = HttpFetcher::new(config).unwrap();

        assert!(fetcher.fetch("turkey").await.is_success());
    }

    #[tokio::test]
    async fn search_url_joins_path_segments() {
        let fetcher = |base: &str, search_path: &str| {
            HttpFetcher::new(ProviderConfig {
                base_url: url::Url::parse(base).unwrap(),
                search_path: search_path.to_string(),
                request_timeout: Duration::from_secs(1),
                strict_parsing: false,
            })
            .unwrap()
        };

        let cases = [
            ("https://example.com/api", "/search", "https://example.com/api/search"),
            ("https://example.com/api/", "search", "https://example.com/api/search"),
            ("http://universities.hipolabs.com", "/search", "http://universities.hipolabs.com/search"),
        ];
        for (base, search_path, expected) in cases {
            assert_eq!(fetcher(base, search_path).search_url().unwrap().as_str(), expected);
        }
    }

    #[tokio::test]
    async fn non_success_status_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(provider_config(&server, false)).unwrap();
        match fetcher.fetch("india").await {
            FetchResult::Failure { country, error } => {
                assert_eq!(country, "india");
                assert_eq!(
                    error,
                    FetchError::ProviderError { status: 503, message: "maintenance".to_string() }
                );
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_array_payload_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(provider_config(&server, false)).unwrap();
        let result = fetcher.fetch("turkey").await;
        assert!(matches!(
            result,
            FetchResult::Failure { error: FetchError::DecodeError { .. }, .. }
        ));
    }

    #[tokio::test]
    async fn unreachable_provider_is_network_error() {
        let config = ProviderConfig {
            base_url: url::Url::parse("http://127.0.0.1:1").unwrap(),
            search_path: "/search".to_string(),
            request_timeout: Duration::from_secs(2),
            strict_parsing: false,
        };

        let fetcher = HttpFetcher::new(config).unwrap();
        let result = fetcher.fetch("turkey").await;
        assert!(matches!(
            result,
            FetchResult::Failure { error: FetchError::NetworkError { .. }, .. }
        ));
    }

    #[tokio::test]
    async fn malformed_record_handling_depends_on_strictness() {
        let body = r#"[{"name": "Good University"}, {"name": 42}, {"name": "Another"}]"#;

        let lenient = parse_records(body, false).await.unwrap();
        assert_eq!(lenient.len(), 2);
        assert_eq!(lenient[1].name.as_deref(), Some("Another"));

        let strict = parse_records(body, true).await;
        assert!(matches!(strict, Err(FetchError::DecodeError { .. })));
    }
}
