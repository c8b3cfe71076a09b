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

//! Backlog in a hosted Postgres database, reached through its PostgREST
//! gateway (`{project}/rest/v1/{table}`).
//!
//! Status transitions are conditional `PATCH` requests filtered on the
//! expected current status with `Prefer: return=representation`; an empty
//! representation means the row was not in the expected state.
//!
//! Listed rows are decoded one by one. A row that does not decode is moved
//! to `FAILED` when its id is readable and skipped otherwise, so it cannot
//! hold up the rest of the backlog.

use super::{JobStatus, JobStore, JobStoreError, SigningJob, JOBS_TABLE};
use crate::audit;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct PostgrestJobStore {
    client: Client,
    endpoint: Url,
    service_key: String,
}

impl PostgrestJobStore {
    /// Creates a store for `project_url` (e.g. `https://xyz.supabase.co`).
    pub fn new(
        project_url: &str,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, JobStoreError> {
        Self::with_table(project_url, service_key, JOBS_TABLE, timeout)
    }

    pub fn with_table(
        project_url: &str,
        service_key: impl Into<String>,
        table: &str,
        timeout: Duration,
    ) -> Result<Self, JobStoreError> {
        let service_key = service_key.into();
        if service_key.trim().is_empty() {
            return Err(JobStoreError::InvalidConfig("service key is empty".to_string()));
        }

        let base = Url::parse(project_url)
            .map_err(|e| JobStoreError::InvalidConfig(format!("{}: {}", project_url, e)))?;
        let endpoint = base
            .join(&format!("rest/v1/{}", table))
            .map_err(|e| JobStoreError::InvalidConfig(e.to_string()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            service_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Conditionally patches one row and returns the updated rows.
    async fn patch_where(
        &self,
        id: &str,
        expected: JobStatus,
        body: Value,
    ) -> Result<Vec<Value>, JobStoreError> {
        let request = self
            .client
            .patch(self.endpoint.clone())
            .query(&[
                ("id", format!("eq.{}", id)),
                ("status", format!("eq.{}", expected.as_str())),
            ])
            .header("Prefer", "return=representation")
            .json(&body);

        let response = self.authorized(request).send().await?;
        rows(response).await
    }

    async fn finish(&self, id: &str, to: JobStatus, body: Value) -> Result<(), JobStoreError> {
        let updated = self.patch_where(id, JobStatus::Processing, body).await?;
        if updated.is_empty() {
            return Err(JobStoreError::InvalidTransition {
                id: id.to_string(),
                expected: JobStatus::Processing,
                to,
            });
        }
        Ok(())
    }

    /// Fails a listed row that could not be decoded.
    async fn reject(&self, id: Option<String>, reason: &str) {
        audit::log_job_rejected(id.as_deref(), reason);
        let Some(id) = id else {
            return;
        };

        let body = json!({
            "status": JobStatus::Failed,
            "error": format!("Unreadable job row: {}", reason),
        });
        match self.patch_where(&id, JobStatus::Pending, body).await {
            Ok(updated) if updated.is_empty() => {
                debug!(job_id = %id, "Unreadable job already left PENDING")
            }
            Ok(_) => {}
            Err(e) => warn!(job_id = %id, error = %e, "Could not fail unreadable job"),
        }
    }
}

/// Identifier of a raw row, if it has a usable one.
fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn rows(response: Response) -> Result<Vec<Value>, JobStoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(JobStoreError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

async fn decode(response: Response) -> Result<Vec<SigningJob>, JobStoreError> {
    rows(response)
        .await?
        .into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| JobStoreError::Decode(e.to_string()))
        })
        .collect()
}

#[async_trait]
impl JobStore for PostgrestJobStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<SigningJob>, JobStoreError> {
        let request = self.client.get(self.endpoint.clone()).query(&[
            ("select", "*".to_string()),
            ("status", format!("eq.{}", JobStatus::Pending.as_str())),
            ("order", "created_at.asc,id.asc".to_string()),
            ("limit", limit.to_string()),
        ]);
        let listed = rows(self.authorized(request).send().await?).await?;

        let mut jobs = Vec::with_capacity(listed.len());
        for row in listed {
            let id = row_id(&row);
            match serde_json::from_value::<SigningJob>(row) {
                Ok(job) => jobs.push(job),
                Err(e) => self.reject(id, &e.to_string()).await,
            }
        }
        debug!(count = jobs.len(), "Fetched pending jobs");
        Ok(jobs)
    }

    async fn claim(&self, id: &str) -> Result<bool, JobStoreError> {
        let updated = self
            .patch_where(
                id,
                JobStatus::Pending,
                json!({ "status": JobStatus::Processing }),
            )
            .await?;
        Ok(!updated.is_empty())
    }

    async fn mark_completed(
        &self,
        id: &str,
        output_path: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), JobStoreError> {
        self.finish(
            id,
            JobStatus::Completed,
            json!({
                "status": JobStatus::Completed,
                "output_path": output_path,
                "completed_at": completed_at.to_rfc3339(),
            }),
        )
        .await
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<(), JobStoreError> {
        self.finish(
            id,
            JobStatus::Failed,
            json!({ "status": JobStatus::Failed, "error": error }),
        )
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<SigningJob>, JobStoreError> {
        let request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);
        let jobs = decode(self.authorized(request).send().await?).await?;
        Ok(jobs.into_iter().next())
    }

    async fn enqueue(
        &self,
        input_path: &str,
        user_email: &str,
    ) -> Result<SigningJob, JobStoreError> {
        let request = self
            .client
            .post(self.endpoint.clone())
            .header("Prefer", "return=representation")
            .json(&json!({
                "input_path": input_path,
                "user_email": user_email,
                "status": JobStatus::Pending,
            }));
        let jobs = decode(self.authorized(request).send().await?).await?;
        jobs.into_iter()
            .next()
            .ok_or_else(|| JobStoreError::Decode("insert returned no row".to_string()))
    }

    fn name(&self) -> &str {
        "postgrest"
    }
}
