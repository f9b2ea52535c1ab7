use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::{
    Assignment, AssignmentRequest, CompletionReport, CompletionResponse, JobDoneResponse,
    JobSnapshot,
};
use std::time::SystemTime;
use tower_http::trace::TraceLayer;

use crate::completion::log_protocol_fault;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/job", get(get_job))
        .route("/api/v1/job/done", get(job_done))
        .route("/api/v1/tasks/next", post(assign_task))
        .route("/api/v1/tasks/complete", post(complete_task))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// Foto del job (fase, contadores, tabla de tareas)
async fn get_job(State(state): State<AppState>) -> Result<Json<JobSnapshot>, StatusCode> {
    let ledger = state.lock_ledger()?;
    Ok(Json(ledger.snapshot()))
}

// IsJobDone
async fn job_done(State(state): State<AppState>) -> Result<Json<JobDoneResponse>, StatusCode> {
    let ledger = state.lock_ledger()?;
    Ok(Json(JobDoneResponse {
        done: ledger.is_done(),
    }))
}

// Asigna la siguiente tarea (o Wait / AllDone)
async fn assign_task(
    State(state): State<AppState>,
    Json(req): Json<AssignmentRequest>,
) -> Result<Json<Assignment>, StatusCode> {
    let mut ledger = state.lock_ledger()?;
    let assignment = ledger.request_assignment(&req.worker_id, SystemTime::now());
    Ok(Json(assignment))
}

// Worker reporta que terminó un intento
async fn complete_task(
    State(state): State<AppState>,
    Json(req): Json<CompletionReport>,
) -> Result<Json<CompletionResponse>, (StatusCode, String)> {
    let mut ledger = state
        .lock_ledger()
        .map_err(|code| (code, "ledger no disponible".to_string()))?;

    match ledger.report_completion(&req) {
        Ok(status) => Ok(Json(CompletionResponse { status })),
        Err(e) => {
            log_protocol_fault(&req, &e);
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}
