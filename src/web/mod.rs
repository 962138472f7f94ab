// src/web/mod.rs

//! HTTP surface: submission, polling and the two HTML pages.

pub mod pages;
pub mod routes;

use axum::routing::{get, post};
use axum::Router;

use crate::app::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/scan", post(routes::start_scan))
        .route("/results/{task_id}", get(routes::results_page))
        .route("/status/{task_id}", get(routes::scan_status))
        .route("/healthz", get(routes::healthz))
        .with_state(state)
}
