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

//! Signing job backlog.
//!
//! Jobs are created in `PENDING`, claimed into `PROCESSING` by exactly one
//! runner, and finish in `COMPLETED` or `FAILED`. Terminal jobs are never
//! touched again. Every [`JobStore`] enforces these transitions itself, so
//! two runners racing on the same backlog cannot both process a job.

mod memory;
mod postgrest;
#[cfg(feature = "sqlite")]
mod schema;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryJobStore;
pub use postgrest::PostgrestJobStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteJobStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default name of the hosted backlog table.
pub const JOBS_TABLE: &str = "jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(JobStoreError::Decode(format!("unknown job status '{}'", other))),
        }
    }
}

/// One row of the backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningJob {
    /// Row identifier; numeric keys are accepted and kept as text.
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    /// Object key of the file to sign.
    pub input_path: String,
    pub user_email: String,
    pub status: JobStatus,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SigningJob {
    /// A new `PENDING` job with a random identifier.
    pub fn pending(input_path: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input_path: input_path.into(),
            user_email: user_email.into(),
            status: JobStatus::Pending,
            output_path: None,
            error: None,
            created_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    /// Final path component of the input key.
    pub fn file_name(&self) -> &str {
        self.input_path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("file")
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Errors that can occur while accessing the backlog.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backlog API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Invalid backlog configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to decode job: {0}")]
    Decode(String),

    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Job {id} cannot move to {to}: it is not {expected}")]
    InvalidTransition {
        id: String,
        expected: JobStatus,
        to: JobStatus,
    },
}

/// Storage of signing jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Up to `limit` jobs in `PENDING`, oldest first where the store knows
    /// creation order.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<SigningJob>, JobStoreError>;

    /// Moves a job from `PENDING` to `PROCESSING`.
    ///
    /// Returns `false` when the job was no longer `PENDING`, i.e. another
    /// runner claimed it first.
    async fn claim(&self, id: &str) -> Result<bool, JobStoreError>;

    /// Moves a `PROCESSING` job to `COMPLETED`.
    async fn mark_completed(
        &self,
        id: &str,
        output_path: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), JobStoreError>;

    /// Moves a `PROCESSING` job to `FAILED`.
    async fn mark_failed(&self, id: &str, error: &str) -> Result<(), JobStoreError>;

    async fn get(&self, id: &str) -> Result<Option<SigningJob>, JobStoreError>;

    /// Creates a `PENDING` job.
    async fn enqueue(&self, input_path: &str, user_email: &str)
        -> Result<SigningJob, JobStoreError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
