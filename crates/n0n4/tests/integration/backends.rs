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

//! The hosted backlog and bucket clients against an in-process mock of the
//! REST gateway and the storage API.

use crate::fixtures::Workspace;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use n0n4::jobs::PostgrestJobStore;
use n0n4::signing::Protector;
use n0n4::storage::SupabaseObjectStore;
use n0n4::{JobRunner, JobStatus, JobStore, JobStoreError, ObjectStore, RunnerConfig, StorageError};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SERVICE_KEY: &str = "service-role-key";

#[derive(Default)]
struct Backend {
    rows: Mutex<Vec<Value>>,
    next_id: Mutex<i64>,
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
    unauthorized: Mutex<usize>,
}

type Shared = Arc<Backend>;

fn authorized(state: &Backend, headers: &HeaderMap) -> bool {
    let bearer = format!("Bearer {}", SERVICE_KEY);
    let ok = headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(bearer.as_str())
        && headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(SERVICE_KEY);
    if !ok {
        *state.unauthorized.lock().unwrap() += 1;
    }
    ok
}

/// Applies `column=eq.value` filters the way the gateway does.
fn matches(row: &Value, query: &HashMap<String, String>) -> bool {
    query.iter().all(|(column, filter)| match filter.strip_prefix("eq.") {
        Some(expected) => match &row[column] {
            Value::String(s) => s == expected,
            Value::Number(n) => n.to_string() == expected,
            _ => false,
        },
        None => true,
    })
}

async fn select_rows(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let limit = query
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(usize::MAX);
    let mut rows: Vec<Value> = state
        .rows
        .lock()
        .unwrap()
        .iter()
        .filter(|row| matches(row, &query))
        .cloned()
        .collect();
    if query
        .get("order")
        .is_some_and(|order| order.starts_with("created_at.asc"))
    {
        rows.sort_by(|a, b| {
            a["created_at"]
                .as_str()
                .unwrap_or_default()
                .cmp(b["created_at"].as_str().unwrap_or_default())
        });
    }
    rows.truncate(limit);
    Json(rows).into_response()
}

async fn update_rows(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(patch): Json<Map<String, Value>>,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut updated = Vec::new();
    for row in state.rows.lock().unwrap().iter_mut() {
        if matches(row, &query) {
            if let Some(fields) = row.as_object_mut() {
                fields.extend(patch.clone());
            }
            updated.push(row.clone());
        }
    }
    Json(updated).into_response()
}

async fn insert_row(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(mut row): Json<Map<String, Value>>,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let id = {
        let mut next = state.next_id.lock().unwrap();
        *next += 1;
        *next
    };
    row.insert("id".to_string(), json!(id));
    row.insert("created_at".to_string(), json!(chrono::Utc::now().to_rfc3339()));
    let row = Value::Object(row);
    state.rows.lock().unwrap().push(row.clone());
    (StatusCode::CREATED, Json(vec![row])).into_response()
}

async fn download_object(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.objects.lock().unwrap().get(&format!("{}/{}", bucket, key)) {
        Some((_, body)) => body.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "Object not found").into_response(),
    }
}

async fn upload_object(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((bucket, key)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state
        .objects
        .lock()
        .unwrap()
        .insert(format!("{}/{}", bucket, key), (content_type, body.to_vec()));
    Json(json!({ "Key": format!("{}/{}", bucket, key) })).into_response()
}

/// Serves the mock on an ephemeral port and returns its base URL.
async fn serve(state: Shared) -> String {
    let app = Router::new()
        .route(
            "/rest/v1/jobs",
            get(select_rows).patch(update_rows).post(insert_row),
        )
        .route(
            "/storage/v1/object/{bucket}/{*key}",
            get(download_object).post(upload_object),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn clients(base: &str) -> (Arc<PostgrestJobStore>, Arc<SupabaseObjectStore>) {
    let timeout = Duration::from_secs(5);
    (
        Arc::new(PostgrestJobStore::new(base, SERVICE_KEY, timeout).unwrap()),
        Arc::new(SupabaseObjectStore::new(base, SERVICE_KEY, "c2pa-files", timeout).unwrap()),
    )
}

fn put(state: &Backend, key: &str, body: &[u8]) {
    state.objects.lock().unwrap().insert(
        format!("c2pa-files/{}", key),
        ("application/octet-stream".to_string(), body.to_vec()),
    );
}

#[tokio::test]
async fn test_hosted_backends_end_to_end() {
    let state: Shared = Arc::default();
    let base = serve(state.clone()).await;
    let (jobs, objects) = clients(&base);
    let workspace = Workspace::new();

    put(&state, "uploads/u1/photo.png", b"png bytes");
    let good = jobs.enqueue("uploads/u1/photo.png", "ana@example.com").await.unwrap();
    let bad = jobs.enqueue("uploads/u1/gone.jpg", "ana@example.com").await.unwrap();
    assert_eq!(good.status, JobStatus::Pending);
    assert_eq!(good.id, "1");

    let runner = JobRunner::new(
        jobs.clone(),
        objects,
        Protector::new(workspace.missing_tool()),
        workspace.certificates(),
        RunnerConfig::builder().work_dir(workspace.work_dir()).build(),
    );
    let report = runner.run_batch().await.unwrap();
    assert_eq!((report.completed, report.failed), (1, 1));

    let good = jobs.get(&good.id).await.unwrap().unwrap();
    assert_eq!(good.status, JobStatus::Completed);
    assert_eq!(good.output_path.as_deref(), Some("signed/out_1_photo.png"));
    assert!(good.completed_at.is_some());

    let bad = jobs.get(&bad.id).await.unwrap().unwrap();
    assert_eq!(bad.status, JobStatus::Failed);
    assert!(bad.error.unwrap().contains("not found"));

    let uploaded = state
        .objects
        .lock()
        .unwrap()
        .get("c2pa-files/signed/out_1_photo.png")
        .cloned()
        .unwrap();
    assert_eq!(uploaded, ("image/png".to_string(), b"png bytes".to_vec()));
    assert_eq!(*state.unauthorized.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_unreadable_row_does_not_block_backlog() {
    let state: Shared = Arc::default();
    *state.next_id.lock().unwrap() = 3;
    state.rows.lock().unwrap().extend([
        json!({
            "id": 1,
            "input_path": "uploads/u1/broken.png",
            "user_email": null,
            "status": "PENDING",
            "created_at": "2025-03-01T09:00:00+00:00"
        }),
        json!({ "input_path": "uploads/u1/no-id.png", "status": "PENDING" }),
        json!({
            "id": 3,
            "input_path": "uploads/u1/photo.png",
            "user_email": "ana@example.com",
            "status": "PENDING",
            "created_at": "2025-03-01T10:00:00+00:00"
        }),
    ]);
    put(&state, "uploads/u1/photo.png", b"png bytes");

    let base = serve(state.clone()).await;
    let (jobs, objects) = clients(&base);

    let pending = jobs.fetch_pending(5).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "3");

    {
        let rows = state.rows.lock().unwrap();
        assert_eq!(rows[0]["status"], "FAILED");
        assert!(rows[0]["error"]
            .as_str()
            .unwrap()
            .starts_with("Unreadable job row"));
        assert_eq!(rows[1]["status"], "PENDING");
    }

    let workspace = Workspace::new();
    let runner = JobRunner::new(
        jobs.clone(),
        objects,
        Protector::new(workspace.missing_tool()),
        workspace.certificates(),
        RunnerConfig::builder().work_dir(workspace.work_dir()).build(),
    );
    let report = runner.run_batch().await.unwrap();
    assert_eq!((report.fetched, report.completed, report.failed), (1, 1, 0));

    let done = jobs.get("3").await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.output_path.as_deref(), Some("signed/out_3_photo.png"));
}

#[tokio::test]
async fn test_backlog_is_listed_oldest_first() {
    let state: Shared = Arc::default();
    state.rows.lock().unwrap().extend([
        json!({
            "id": 1,
            "input_path": "uploads/new.png",
            "user_email": "ana@example.com",
            "status": "PENDING",
            "created_at": "2025-03-02T08:00:00+00:00"
        }),
        json!({
            "id": 2,
            "input_path": "uploads/old.png",
            "user_email": "ana@example.com",
            "status": "PENDING",
            "created_at": "2025-03-01T08:00:00+00:00"
        }),
    ]);
    let base = serve(state).await;
    let (jobs, _) = clients(&base);

    let pending = jobs.fetch_pending(1).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].input_path, "uploads/old.png");
}

#[tokio::test]
async fn test_claim_and_transitions_are_conditional() {
    let state: Shared = Arc::default();
    let base = serve(state).await;
    let (jobs, _) = clients(&base);

    let job = jobs.enqueue("uploads/a.jpg", "ana@example.com").await.unwrap();

    assert!(matches!(
        jobs.mark_failed(&job.id, "too early").await,
        Err(JobStoreError::InvalidTransition { .. })
    ));
    assert!(jobs.claim(&job.id).await.unwrap());
    assert!(!jobs.claim(&job.id).await.unwrap());
    assert!(jobs.fetch_pending(5).await.unwrap().is_empty());

    jobs.mark_failed(&job.id, "boom").await.unwrap();
    let stored = jobs.get(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_wrong_key_is_reported() {
    let state: Shared = Arc::default();
    let base = serve(state.clone()).await;
    let timeout = Duration::from_secs(5);
    let jobs = PostgrestJobStore::new(&base, "wrong", timeout).unwrap();
    let objects = SupabaseObjectStore::new(&base, "wrong", "c2pa-files", timeout).unwrap();

    assert!(matches!(
        jobs.fetch_pending(5).await,
        Err(JobStoreError::Api { status: 401, .. })
    ));

    let dest = tempfile::tempdir().unwrap();
    assert!(matches!(
        objects.download("uploads/a.jpg", &dest.path().join("a.jpg")).await,
        Err(StorageError::Api { status: 401, .. })
    ));
}

#[tokio::test]
async fn test_download_of_missing_object() {
    let state: Shared = Arc::default();
    let base = serve(state).await;
    let (_, objects) = clients(&base);
    let dest = tempfile::tempdir().unwrap();

    let result = objects
        .download("uploads/none.jpg", &dest.path().join("none.jpg"))
        .await;
    assert!(matches!(result, Err(StorageError::NotFound(key)) if key == "uploads/none.jpg"));
}
