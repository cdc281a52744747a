use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::info;

type Labels = BTreeMap<String, String>;

const DURATION_BUCKETS_MS: [f64; 10] = [
    10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, f64::INFINITY,
];

#[derive(Debug, Clone, Serialize)]
pub struct Counter {
    pub value: u64,
    pub labels: Labels,
}

#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    pub buckets: Vec<(f64, u64)>, // (upper_bound, count)
    pub sum: f64,
    pub count: u64,
    pub labels: Labels,
}

/// Counters and histograms keyed by metric name plus label set.
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Counter>>,
    histograms: RwLock<HashMap<String, Histogram>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
        }
    }

    pub async fn increment_counter(&self, name: &str, labels: Labels) {
        let key = series_key(name, &labels);
        let mut counters = self.counters.write().await;
        counters
            .entry(key)
            .or_insert_with(|| Counter { value: 0, labels })
            .value += 1;
    }

    pub async fn record_histogram(&self, name: &str, value: f64, labels: Labels) {
        let key = series_key(name, &labels);
        let mut histograms = self.histograms.write().await;
        let histogram = histograms.entry(key).or_insert_with(|| Histogram {
            buckets: DURATION_BUCKETS_MS.iter().map(|b| (*b, 0)).collect(),
            sum: 0.0,
            count: 0,
            labels,
        });

        histogram.sum += value;
        histogram.count += 1;
        for (upper_bound, count) in &mut histogram.buckets {
            if value <= *upper_bound {
                *count += 1;
            }
        }
    }

    #[allow(dead_code)]
    pub async fn counter_value(&self, name: &str, labels: &Labels) -> u64 {
        let counters = self.counters.read().await;
        counters
            .get(&series_key(name, labels))
            .map(|c| c.value)
            .unwrap_or(0)
    }

    pub async fn get_prometheus_format(&self) -> String {
        let mut output = String::new();

        let counters = self.counters.read().await;
        let mut counter_keys: Vec<_> = counters.keys().collect();
        counter_keys.sort();
        for key in counter_keys {
            let counter = &counters[key];
            let name = metric_name(key);
            output.push_str(&format!("# TYPE {name} counter\n"));
            output.push_str(&format!("{}{{{}}} {}\n", name, format_labels(&counter.labels), counter.value));
        }

        let histograms = self.histograms.read().await;
        let mut histogram_keys: Vec<_> = histograms.keys().collect();
        histogram_keys.sort();
        for key in histogram_keys {
            let histogram = &histograms[key];
            let name = metric_name(key);
            let labels_str = format_labels(&histogram.labels);
            let label_prefix = if labels_str.is_empty() {
                String::new()
            } else {
                format!("{labels_str},")
            };

            output.push_str(&format!("# TYPE {name} histogram\n"));
            for (upper_bound, count) in &histogram.buckets {
                let bucket_label = if upper_bound.is_infinite() {
                    "+Inf".to_string()
                } else {
                    upper_bound.to_string()
                };
                output.push_str(&format!(
                    "{name}_bucket{{{label_prefix}le=\"{bucket_label}\"}} {count}\n"
                ));
            }
            output.push_str(&format!("{}_sum{{{}}} {}\n", name, labels_str, histogram.sum));
            output.push_str(&format!("{}_count{{{}}} {}\n", name, labels_str, histogram.count));
        }

        output
    }

    pub async fn get_json_format(&self) -> serde_json::Value {
        serde_json::json!({
            "counters": *self.counters.read().await,
            "histograms": *self.histograms.read().await,
            "timestamp": Utc::now()
        })
    }
}

fn series_key(name: &str, labels: &Labels) -> String {
    if labels.is_empty() {
        name.to_string()
    } else {
        format!("{name}{{{}}}", format_labels(labels))
    }
}

fn metric_name(key: &str) -> &str {
    key.split('{').next().unwrap_or(key)
}

fn format_labels(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(",")
}

static METRICS: std::sync::OnceLock<MetricsRegistry> = std::sync::OnceLock::new();

pub fn get_metrics() -> &'static MetricsRegistry {
    METRICS.get_or_init(|| {
        info!("Initializing global metrics registry");
        MetricsRegistry::new()
    })
}

#[macro_export]
macro_rules! counter_inc {
    ($name:expr) => {
        $crate::services::metrics::get_metrics().increment_counter($name, std::collections::BTreeMap::new()).await
    };
    ($name:expr, $($key:expr => $value:expr),*) => {
        {
            let mut labels = std::collections::BTreeMap::new();
            $(labels.insert($key.to_string(), $value.to_string());)*
            $crate::services::metrics::get_metrics().increment_counter($name, labels).await
        }
    };
}

#[macro_export]
macro_rules! histogram_record {
    ($name:expr, $value:expr) => {
        $crate::services::metrics::get_metrics().record_histogram($name, $value, std::collections::BTreeMap::new()).await
    };
    ($name:expr, $value:expr, $($key:expr => $val:expr),*) => {
        {
            let mut labels = std::collections::BTreeMap::new();
            $(labels.insert($key.to_string(), $val.to_string());)*
            $crate::services::metrics::get_metrics().record_histogram($name, $value, labels).await
        }
    };
}
