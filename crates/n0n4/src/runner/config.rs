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

//! Configuration for the [`JobRunner`](super::JobRunner).

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings controlling one runner.
///
/// ```rust,ignore
/// let config = RunnerConfig::builder()
///     .batch_limit(10)
///     .job_timeout(Duration::from_secs(60))
///     .build();
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct RunnerConfig {
    batch_limit: usize,
    work_dir: PathBuf,
    output_prefix: String,
    job_timeout: Duration,
}

impl RunnerConfig {
    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::default()
    }

    /// Maximum number of pending jobs fetched per batch.
    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Directory holding per-job scratch files.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Prefix of uploaded result keys.
    pub fn output_prefix(&self) -> &str {
        &self.output_prefix
    }

    /// Upper bound on processing a single job, download to upload.
    pub fn job_timeout(&self) -> Duration {
        self.job_timeout
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfigBuilder::default().build()
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfigBuilder {
    config: RunnerConfig,
}

impl Default for RunnerConfigBuilder {
    fn default() -> Self {
        Self {
            config: RunnerConfig {
                batch_limit: 5,
                work_dir: std::env::temp_dir(),
                output_prefix: "signed/".to_string(),
                job_timeout: Duration::from_secs(300),
            },
        }
    }
}

impl RunnerConfigBuilder {
    pub fn batch_limit(mut self, value: usize) -> Self {
        self.config.batch_limit = value;
        self
    }

    pub fn work_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.config.work_dir = value.into();
        self
    }

    /// Sets the result key prefix; a trailing `/` is added when missing.
    pub fn output_prefix(mut self, value: impl Into<String>) -> Self {
        let mut prefix = value.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.config.output_prefix = prefix;
        self
    }

    pub fn job_timeout(mut self, value: Duration) -> Self {
        self.config.job_timeout = value;
        self
    }

    pub fn build(self) -> RunnerConfig {
        self.config
    }
}
