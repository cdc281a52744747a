use std::time::Duration;
use tracing::warn;
use url::Url;

const DEFAULT_PROVIDER_URL: &str = "http://universities.hipolabs.com";

#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub retry: RetryConfig,
    pub queue: QueueConfig,
    pub retention: RetentionConfig,
    pub default_countries: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub client_timeout: Duration,
    pub keep_alive: Duration,
    pub max_payload_size: usize,
}

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub base_url: Url,
    pub search_path: String,
    pub request_timeout: Duration,
    /// Reject the whole response when any record fails to parse, instead of
    /// dropping the bad record.
    pub strict_parsing: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(600),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub max_concurrent_fetches: usize,
    pub max_batch_size: usize,
    pub max_country_length: usize,
}

#[derive(Clone, Debug)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub retention: Duration,
    pub cleanup_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let parse_env_var = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let parse_env_number = |key: &str, default: u64| -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let parse_env_bool = |key: &str, default: bool| -> bool {
            std::env::var(key)
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(default)
        };

        Config {
            server: ServerConfig {
                host: parse_env_var("UNIJOBS_HOST", "0.0.0.0"),
                port: parse_env_number("UNIJOBS_PORT", 8080) as u16,
                client_timeout: Duration::from_secs(parse_env_number("UNIJOBS_CLIENT_TIMEOUT", 120)),
                keep_alive: Duration::from_secs(parse_env_number("UNIJOBS_KEEP_ALIVE", 75)),
                max_payload_size: parse_env_number("UNIJOBS_MAX_PAYLOAD", 64 * 1024) as usize,
            },
            provider: ProviderConfig {
                base_url: parse_provider_url(&parse_env_var("UNIJOBS_PROVIDER_URL", DEFAULT_PROVIDER_URL)),
                search_path: parse_env_var("UNIJOBS_PROVIDER_SEARCH_PATH", "/search"),
                request_timeout: Duration::from_secs(parse_env_number("UNIJOBS_PROVIDER_TIMEOUT", 30)),
                strict_parsing: parse_env_bool("UNIJOBS_STRICT_PARSING", false),
            },
            retry: RetryConfig {
                max_attempts: parse_env_number("UNIJOBS_RETRY_MAX_ATTEMPTS", 5).max(1) as u32,
                base_delay: Duration::from_millis(parse_env_number("UNIJOBS_RETRY_BASE_DELAY_MS", 1000)),
                max_delay: Duration::from_millis(parse_env_number("UNIJOBS_RETRY_MAX_DELAY_MS", 600_000)),
                backoff_multiplier: 2.0,
                jitter: parse_env_bool("UNIJOBS_RETRY_JITTER", true),
            },
            queue: QueueConfig {
                max_concurrent_fetches: parse_env_number("UNIJOBS_MAX_CONCURRENT_FETCHES", 16).max(1) as usize,
                max_batch_size: parse_env_number("UNIJOBS_MAX_BATCH_SIZE", 100) as usize,
                max_country_length: 100,
            },
            retention: RetentionConfig {
                enabled: parse_env_bool("UNIJOBS_RETENTION_ENABLED", true),
                retention: Duration::from_secs(parse_env_number("UNIJOBS_RETENTION_MINUTES", 60) * 60),
                cleanup_interval: Duration::from_secs(parse_env_number("UNIJOBS_CLEANUP_INTERVAL_SECS", 300).max(1)),
            },
            default_countries: parse_env_var("UNIJOBS_DEFAULT_COUNTRIES", "turkey,india,australia")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

fn parse_provider_url(raw: &str) -> Url {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        Ok(url) => {
            warn!("Unsupported provider URL scheme '{}', using {}", url.scheme(), DEFAULT_PROVIDER_URL);
            default_provider_url()
        }
        Err(e) => {
            warn!("Invalid provider URL '{}' ({}), using {}", raw, e, DEFAULT_PROVIDER_URL);
            default_provider_url()
        }
    }
}

fn default_provider_url() -> Url {
    Url::parse(DEFAULT_PROVIDER_URL).expect("default provider URL is valid")
}

pub fn load_config() -> Config {
    Config::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_defaults_allow_five_attempts() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.backoff_multiplier, 2.0);
    }

    #[test]
    fn provider_url_falls_back_on_garbage() {
        assert_eq!(parse_provider_url("not a url").as_str(), "http://universities.hipolabs.com/");
        assert_eq!(parse_provider_url("ftp://example.com").as_str(), "http://universities.hipolabs.com/");
        assert_eq!(parse_provider_url("https://example.com/api").as_str(), "https://example.com/api");
    }
}
