use crate::error::AppResult;
use crate::monitoring::HealthChecker;
use crate::services::metrics;
use actix_web::{get, web, HttpResponse, Responder};
use std::sync::Arc;

pub struct MonitoringState {
    pub health_checker: HealthChecker,
}

pub fn configure_monitoring_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(readiness_check)
        .service(liveness_check)
        .service(metrics_endpoint)
        .service(metrics_prometheus);
}

#[get("/health")]
async fn health_check(data: web::Data<Arc<MonitoringState>>) -> AppResult<impl Responder> {
    // Degraded still answers 200: the service accepts work, it just queues it.
    Ok(web::Json(data.health_checker.get_health_status().await))
}

#[get("/health/ready")]
async fn readiness_check() -> AppResult<impl Responder> {
    Ok(web::Json(serde_json::json!({
        "status": "ready",
        "timestamp": chrono::Utc::now()
    })))
}

#[get("/health/live")]
async fn liveness_check() -> AppResult<impl Responder> {
    Ok(web::Json(serde_json::json!({
        "status": "alive",
        "timestamp": chrono::Utc::now()
    })))
}

#[get("/metrics")]
async fn metrics_endpoint() -> AppResult<impl Responder> {
    Ok(web::Json(metrics::get_metrics().get_json_format().await))
}

#[get("/metrics/prometheus")]
async fn metrics_prometheus() -> AppResult<impl Responder> {
    let body = metrics::get_metrics().get_prometheus_format().await;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(body))
}
