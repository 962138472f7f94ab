// src/web/routes.rs

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::app::AppState;
use crate::core::errors::SubmitError;
use crate::core::models::{TaskId, TaskStatus};
use crate::core::scanner::ScanJob;
use crate::core::target::Target;
use crate::web::pages;

#[derive(Debug, Deserialize)]
pub struct ScanForm {
    #[serde(default)]
    target: String,
}

pub async fn index() -> Response {
    render(pages::index())
}

/// `POST /scan`: validates the target, queues the scan and redirects to
/// the polling page.
pub async fn start_scan(State(state): State<AppState>, Form(form): Form<ScanForm>) -> Response {
    let target = match Target::parse(&form.target) {
        Ok(target) => target,
        Err(e) => {
            info!(error = %e, "Rejected scan submission.");
            return (StatusCode::BAD_REQUEST, "Error: Invalid input provided.").into_response();
        }
    };

    let task_id = TaskId::new();
    match state.queue.submit(ScanJob { task_id, target: target.clone() }) {
        Ok(()) => {
            info!(task_id = %task_id, target = %target, kind = %target.kind(), "Scan queued.");
            Redirect::to(&format!("/results/{task_id}")).into_response()
        }
        Err(SubmitError::QueueFull) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Error: Scan queue is full, try again later.",
        )
            .into_response(),
        Err(SubmitError::Closed) => {
            error!("Scan submitted while the worker pool is shut down.");
            (StatusCode::SERVICE_UNAVAILABLE, "Error: Server is shutting down.").into_response()
        }
    }
}

/// `GET /results/{taskId}`: the polling page. Never touches the store.
pub async fn results_page(Path(task_id): Path<String>) -> Response {
    render(pages::results(&task_id))
}

fn render(page: Result<String, minijinja::Error>) -> Response {
    match page {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Page template failed to render.");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error: Page could not be rendered.").into_response()
        }
    }
}

/// `GET /status/{taskId}`: `complete` with the data once published,
/// `pending` otherwise (including ids that were never issued).
pub async fn scan_status(State(state): State<AppState>, Path(task_id): Path<String>) -> Json<TaskStatus> {
    let Some(id) = TaskId::parse(&task_id) else {
        return Json(TaskStatus::Pending);
    };
    if !state.store.contains(&id).await {
        return Json(TaskStatus::Pending);
    }

    match state.store.get(&id).await {
        Ok(Some(data)) => Json(TaskStatus::Complete { data }),
        Ok(None) => Json(TaskStatus::Pending),
        Err(e) => {
            warn!(task_id = %id, error = %e, "Could not read result, reporting pending.");
            Json(TaskStatus::Pending)
        }
    }
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}
