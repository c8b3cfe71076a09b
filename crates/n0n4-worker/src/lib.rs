/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! HTTP trigger for the signing job runner.
//!
//! Any `POST`, or any request to `/trigger`, runs one batch and answers
//! `{"status":"ok","processed":n,...}` with the completed jobs split into
//! `signed`, `simulated` and `embedded`; a batch that cannot start answers `500`
//! with `{"error": "..."}`. Everything else, `/favicon.ico` included, gets a
//! plain-text liveness line.

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use n0n4::JobRunner;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const LIVENESS_MESSAGE: &str = "Worker is running. POST to / to trigger processing.";

#[derive(Clone)]
pub struct WorkerState {
    runner: Arc<JobRunner>,
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    status: &'static str,
    processed: usize,
    signed: usize,
    simulated: usize,
    embedded: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Builds the worker's router around `runner`.
pub fn router(runner: Arc<JobRunner>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(WorkerState { runner })
        .layer(TraceLayer::new_for_http())
}

/// Whether a request for `path` with `method` starts a batch.
pub fn triggers_batch(method: &Method, path: &str) -> bool {
    path != "/favicon.ico" && (method == Method::POST || path == "/trigger")
}

async fn dispatch(State(state): State<WorkerState>, method: Method, uri: Uri) -> Response {
    if !triggers_batch(&method, uri.path()) {
        return (StatusCode::OK, LIVENESS_MESSAGE).into_response();
    }

    info!(%method, path = uri.path(), "Batch triggered");
    match state.runner.run_batch().await {
        Ok(report) => {
            info!(
                fetched = report.fetched,
                completed = report.completed,
                failed = report.failed,
                skipped = report.skipped,
                "Batch finished"
            );
            Json(TriggerResponse {
                status: "ok",
                processed: report.processed(),
                signed: report.signed,
                simulated: report.simulated,
                embedded: report.embedded,
            })
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "Batch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Resolves when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
