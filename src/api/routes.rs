use crate::error::AppResult;
use crate::models::job::{Job, JobKind, JobStatus};
use crate::models::university::{AggregateResponse, CountryRequest};
use crate::services::Orchestrator;
use actix_web::{delete, get, post, web, Responder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub default_countries: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct TaskCreatedResponse {
    pub task_id: String,
}

#[derive(Serialize, Debug)]
pub struct JobResponse {
    pub task_id: String,
    pub status: JobStatus,
    pub kind: JobKind,
    pub countries: Vec<String>,
    pub retries: BTreeMap<String, u32>,
    /// Outcomes recorded so far; complete once the job is terminal.
    pub result: AggregateResponse,
    pub created_at: String,
    pub updated_at: String,
    pub finished_at: Option<String>,
}

impl From<&Job> for JobResponse {
    fn from(job: &Job) -> Self {
        Self {
            task_id: job.id.clone(),
            status: job.status,
            kind: job.kind,
            countries: job.countries.clone(),
            retries: job.retries.clone(),
            result: job.aggregate(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            finished_at: job.finished_at.map(|t| t.to_rfc3339()),
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(default_universities)
        .service(default_universities_concurrent)
        .service(lookup_sync)
        .service(lookup_async)
        .service(get_task_status)
        .service(delete_task)
        .service(lookup_parallel);
}

#[get("/universities/")]
#[instrument(skip(data))]
async fn default_universities(data: web::Data<Arc<AppState>>) -> AppResult<impl Responder> {
    let batch = data.orchestrator.batch(data.default_countries.clone())?;
    Ok(web::Json(data.orchestrator.submit_sequential(&batch).await))
}

#[get("/universities/async")]
#[instrument(skip(data))]
async fn default_universities_concurrent(data: web::Data<Arc<AppState>>) -> AppResult<impl Responder> {
    let batch = data.orchestrator.batch(data.default_countries.clone())?;
    Ok(web::Json(data.orchestrator.submit_sync(&batch).await))
}

#[post("/universities_background/")]
#[instrument(skip(data, request))]
async fn lookup_sync(
    data: web::Data<Arc<AppState>>,
    request: web::Json<CountryRequest>,
) -> AppResult<impl Responder> {
    let batch = data.orchestrator.batch(request.into_inner().countries)?;
    Ok(web::Json(data.orchestrator.submit_sync(&batch).await))
}

#[post("/universities_background/async")]
#[instrument(skip(data, request))]
async fn lookup_async(
    data: web::Data<Arc<AppState>>,
    request: web::Json<CountryRequest>,
) -> AppResult<impl Responder> {
    let batch = data.orchestrator.batch(request.into_inner().countries)?;
    let task_id = data.orchestrator.submit_async(&batch).await;

    info!("Accepted background lookup {} for {} countries", task_id, batch.len());
    Ok(web::Json(TaskCreatedResponse { task_id }))
}

#[get("/universities_background/task/{task_id}")]
#[instrument(skip(data), fields(task_id = %task_id))]
async fn get_task_status(
    data: web::Data<Arc<AppState>>,
    task_id: web::Path<String>,
) -> AppResult<impl Responder> {
    let job = data.orchestrator.status(task_id.as_str()).await?;

    debug!("Task {} status: {}", task_id, job.status);
    Ok(web::Json(JobResponse::from(&job)))
}

#[delete("/universities_background/task/{task_id}")]
#[instrument(skip(data), fields(task_id = %task_id))]
async fn delete_task(
    data: web::Data<Arc<AppState>>,
    task_id: web::Path<String>,
) -> AppResult<impl Responder> {
    data.orchestrator.delete(task_id.as_str()).await?;

    Ok(web::Json(serde_json::json!({
        "message": "Task deleted successfully",
        "task_id": task_id.as_str()
    })))
}

#[post("/universities_background/parallel")]
#[instrument(skip(data, request))]
async fn lookup_parallel(
    data: web::Data<Arc<AppState>>,
    request: web::Json<CountryRequest>,
) -> AppResult<impl Responder> {
    let batch = data.orchestrator.batch(request.into_inner().countries)?;
    Ok(web::Json(data.orchestrator.submit_parallel(&batch).await?))
}
