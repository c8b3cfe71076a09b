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

use super::{JobStatus, JobStore, JobStoreError, SigningJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// In-process backlog kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<SigningJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a job as-is, replacing any job with the same id.
    pub fn insert(&self, job: SigningJob) {
        let mut jobs = self.jobs.lock();
        match jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job,
            None => jobs.push(job),
        }
    }

    /// Snapshot of every job.
    pub fn all(&self) -> Vec<SigningJob> {
        self.jobs.lock().clone()
    }

    fn transition(
        &self,
        id: &str,
        expected: JobStatus,
        to: JobStatus,
        apply: impl FnOnce(&mut SigningJob),
    ) -> Result<bool, JobStoreError> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;
        if job.status != expected {
            return Ok(false);
        }
        job.status = to;
        apply(job);
        Ok(true)
    }

    fn finish(
        &self,
        id: &str,
        to: JobStatus,
        apply: impl FnOnce(&mut SigningJob),
    ) -> Result<(), JobStoreError> {
        if self.transition(id, JobStatus::Processing, to, apply)? {
            Ok(())
        } else {
            Err(JobStoreError::InvalidTransition {
                id: id.to_string(),
                expected: JobStatus::Processing,
                to,
            })
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<SigningJob>, JobStoreError> {
        Ok(self
            .jobs
            .lock()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn claim(&self, id: &str) -> Result<bool, JobStoreError> {
        self.transition(id, JobStatus::Pending, JobStatus::Processing, |_| {})
    }

    async fn mark_completed(
        &self,
        id: &str,
        output_path: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), JobStoreError> {
        self.finish(id, JobStatus::Completed, |job| {
            job.output_path = Some(output_path.to_string());
            job.completed_at = Some(completed_at);
        })
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<(), JobStoreError> {
        self.finish(id, JobStatus::Failed, |job| {
            job.error = Some(error.to_string());
        })
    }

    async fn get(&self, id: &str) -> Result<Option<SigningJob>, JobStoreError> {
        Ok(self.jobs.lock().iter().find(|j| j.id == id).cloned())
    }

    async fn enqueue(
        &self,
        input_path: &str,
        user_email: &str,
    ) -> Result<SigningJob, JobStoreError> {
        let job = SigningJob::pending(input_path, user_email);
        self.jobs.lock().push(job.clone());
        Ok(job)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
