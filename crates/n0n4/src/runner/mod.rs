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

//! Batch processing of the signing backlog.
//!
//! A batch provisions certificates, fetches up to `batch_limit` pending
//! jobs and processes them one at a time in fetch order:
//!
//! 1. claim (`PENDING -> PROCESSING`, skipped if another runner won)
//! 2. download the input object into a job-scoped scratch file
//! 3. sign with the configured [`Protector`]
//! 4. upload the result under `{output_prefix}out_{id}_{file}`
//! 5. mark `COMPLETED`, or `FAILED` with the error text
//!
//! A failing job never aborts the batch. Provisioning and backlog listing
//! failures abort the whole batch before any job is claimed.

mod config;

pub use config::{RunnerConfig, RunnerConfigBuilder};

use crate::audit;
use crate::certs::{CertificateBundle, CertificateCache, ProvisionError};
use crate::jobs::{JobStore, JobStoreError, SigningJob};
use crate::provenance::ProvenanceManifest;
use crate::signing::{Protector, SignError, SignOutcome};
use crate::storage::{ObjectStore, StorageError};
use crate::verification::content_type_for;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Certificate provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Backlog unavailable: {0}")]
    Backlog(#[from] JobStoreError),

    #[error("Cannot prepare work directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Reasons a single job fails. The display text is recorded on the job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Download of '{key}' failed: {source}")]
    Download { key: String, source: StorageError },

    #[error("Signing failed: {0}")]
    Sign(#[from] SignError),

    #[error("Upload of '{key}' failed: {source}")]
    Upload { key: String, source: StorageError },

    #[error("Could not record completion: {0}")]
    Record(#[from] JobStoreError),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),
}

/// Counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Pending jobs returned by the backlog.
    pub fetched: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs another runner claimed first.
    pub skipped: usize,
    /// Completed jobs carrying a real signature.
    pub signed: usize,
    /// Completed jobs uploaded as unsigned copies.
    pub simulated: usize,
    /// Completed jobs carrying in-band metadata.
    pub embedded: usize,
}

impl BatchReport {
    fn record_completed(&mut self, outcome: &SignOutcome) {
        self.completed += 1;
        match outcome {
            SignOutcome::Signed { .. } => self.signed += 1,
            SignOutcome::SimulatedCopy => self.simulated += 1,
            SignOutcome::Embedded => self.embedded += 1,
        }
    }

    /// Jobs that reached a terminal state in this batch.
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Drains the backlog in bounded, sequential batches.
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    objects: Arc<dyn ObjectStore>,
    protector: Protector,
    certs: Arc<CertificateCache>,
    config: RunnerConfig,
    batch_lock: Mutex<()>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("store", &self.store.name())
            .field("objects", &self.objects.name())
            .field("protector", &self.protector)
            .field("config", &self.config)
            .finish()
    }
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        objects: Arc<dyn ObjectStore>,
        protector: Protector,
        certs: Arc<CertificateCache>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            store,
            objects,
            protector,
            certs,
            config,
            batch_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn certificates(&self) -> &Arc<CertificateCache> {
        &self.certs
    }

    /// Runs one batch. Batches on the same runner never overlap.
    pub async fn run_batch(&self) -> Result<BatchReport, RunnerError> {
        let _batch = self.batch_lock.lock().await;

        let bundle = self.certs.get_or_provision().await?;

        let work_dir = self.config.work_dir();
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|source| RunnerError::WorkDir {
                path: work_dir.to_path_buf(),
                source,
            })?;

        let jobs = self.store.fetch_pending(self.config.batch_limit()).await?;
        let mut report = BatchReport {
            fetched: jobs.len(),
            ..BatchReport::default()
        };
        if jobs.is_empty() {
            debug!("No pending jobs");
            return Ok(report);
        }
        info!(count = jobs.len(), "Processing pending jobs");

        for job in &jobs {
            match self.store.claim(&job.id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(job_id = %job.id, "Job claimed by another runner, skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Failed to claim job, skipping");
                    report.skipped += 1;
                    continue;
                }
            }

            match self.run_claimed(job, &bundle).await {
                Some(outcome) => report.record_completed(&outcome),
                None => report.failed += 1,
            }
        }

        info!(
            fetched = report.fetched,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            simulated = report.simulated,
            embedded = report.embedded,
            "Batch finished"
        );
        Ok(report)
    }

    /// Processes a claimed job to a terminal state; returns the signing
    /// outcome when it completed.
    async fn run_claimed(
        &self,
        job: &SigningJob,
        bundle: &CertificateBundle,
    ) -> Option<SignOutcome> {
        let timeout = self.config.job_timeout();
        let result = match tokio::time::timeout(timeout, self.process(job, bundle)).await {
            Ok(result) => result,
            Err(_) => Err(JobError::Timeout(timeout)),
        };

        let error = match result {
            Ok((output_key, outcome)) => {
                match self
                    .store
                    .mark_completed(&job.id, &output_key, Utc::now())
                    .await
                {
                    Ok(()) => {
                        audit::log_job_completed(&job.id, &output_key, outcome.as_str());
                        return Some(outcome);
                    }
                    Err(e) => JobError::Record(e),
                }
            }
            Err(e) => e,
        };

        let message = error.to_string();
        audit::log_job_failed(&job.id, &message);
        if let Err(e) = self.store.mark_failed(&job.id, &message).await {
            warn!(job_id = %job.id, error = %e, "Failed to record job failure");
        }
        None
    }

    async fn process(
        &self,
        job: &SigningJob,
        bundle: &CertificateBundle,
    ) -> Result<(String, SignOutcome), JobError> {
        let file_name = job.file_name();
        let scratch = JobScratch::new(self.config.work_dir(), &job.id, file_name);

        self.objects
            .download(&job.input_path, scratch.input())
            .await
            .map_err(|source| JobError::Download {
                key: job.input_path.clone(),
                source,
            })?;

        let manifest = ProvenanceManifest::created(serde_json::json!({
            "author": job.user_email,
            "timestamp": Utc::now().to_rfc3339(),
            "jobId": job.id,
        }));

        let outcome = self
            .protector
            .protect(scratch.input(), scratch.output(), bundle, &manifest)
            .await?;

        let output_key = format!(
            "{}out_{}_{}",
            self.config.output_prefix(),
            job.id,
            file_name
        );
        self.objects
            .upload(
                &output_key,
                scratch.output(),
                content_type_for(Path::new(file_name)),
            )
            .await
            .map_err(|source| JobError::Upload {
                key: output_key.clone(),
                source,
            })?;

        debug!(job_id = %job.id, outcome = outcome.as_str(), key = %output_key, "Job uploaded");
        Ok((output_key, outcome))
    }
}

/// Job-scoped scratch files, removed on drop.
///
/// Names carry a random token next to the job id so concurrent runners on
/// one host never share a path.
struct JobScratch {
    input: PathBuf,
    output: PathBuf,
}

impl JobScratch {
    fn new(dir: &Path, job_id: &str, file_name: &str) -> Self {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let id = sanitize(job_id);
        let name = sanitize(file_name);
        Self {
            input: dir.join(format!("in_{}_{}_{}", id, token, name)),
            output: dir.join(format!("out_{}_{}_{}", id, token, name)),
        }
    }

    fn input(&self) -> &Path {
        &self.input
    }

    fn output(&self) -> &Path {
        &self.output
    }
}

impl Drop for JobScratch {
    fn drop(&mut self) {
        for path in [&self.input, &self.output] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!(path = %path.display(), error = %e, "Scratch cleanup failed"),
            }
        }
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
