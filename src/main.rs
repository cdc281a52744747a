mod api;
mod config;
mod error;
mod middleware;
mod models;
mod monitoring;
mod services;

use crate::api::monitoring::{configure_monitoring_routes, MonitoringState};
use crate::api::routes::{configure_routes, AppState};
use crate::config::load_config;
use crate::middleware::RequestTracking;
use crate::monitoring::HealthChecker;
use crate::services::{FetchPool, HttpFetcher, JobStore, Orchestrator, RetentionService, RetryPolicy, TaskExecutor};
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    info!("Starting unijobs v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    let server_config = config.server.clone();

    info!("University provider: {}", config.provider.base_url);
    let fetcher = HttpFetcher::new(config.provider.clone())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let job_store = Arc::new(JobStore::new());
    let fetch_pool = Arc::new(FetchPool::new(config.queue.max_concurrent_fetches));
    let executor = TaskExecutor::new(
        Arc::new(fetcher),
        RetryPolicy::new(config.retry.clone()),
        job_store.clone(),
        fetch_pool.clone(),
    );

    info!(
        "Retry policy: {} attempts, base delay {:?}, max delay {:?}",
        config.retry.max_attempts, config.retry.base_delay, config.retry.max_delay
    );

    let app_state = Arc::new(AppState {
        orchestrator: Orchestrator::new(executor, job_store.clone(), config.queue.clone()),
        default_countries: config.default_countries.clone(),
    });

    let monitoring_state = Arc::new(MonitoringState {
        health_checker: HealthChecker::new(job_store.clone(), fetch_pool.clone()),
    });

    if config.retention.enabled {
        let retention_service = RetentionService::new(
            job_store.clone(),
            config.retention.retention,
            config.retention.cleanup_interval,
        );
        tokio::spawn(async move {
            retention_service.start_background_cleanup().await;
        });
    } else {
        info!("Retention service disabled, finished jobs are kept until deleted");
    }

    info!("Starting server on {}:{}", server_config.host, server_config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(RequestTracking)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(monitoring_state.clone()))
            .app_data(web::JsonConfig::default().limit(server_config.max_payload_size))
            .configure(configure_routes)
            .configure(configure_monitoring_routes)
    })
    .client_request_timeout(config.server.client_timeout)
    .keep_alive(config.server.keep_alive)
    .bind((config.server.host.clone(), config.server.port))?
    .run()
    .await
}

fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "unijobs=info,actix_web=info".to_string());
    let log_format = std::env::var("UNIJOBS_LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init();
    }
}
