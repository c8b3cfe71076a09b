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

//! Subprocess signer driving `c2patool`.

use super::{ProvenanceSigner, SignError, SignOutcome};
use crate::audit;
use crate::certs::CertificateBundle;
use crate::provenance::ProvenanceManifest;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_PROGRAM: &str = "c2patool";

/// Exit status a shell reports for a command it could not find.
const COMMAND_NOT_FOUND: i32 = 127;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Signs files by invoking an external provenance tool.
///
/// The invocation is
/// `<program> <input> -m <manifest> -o <output> -c <cert> -k <key> --force`.
/// When the program cannot be found the input is copied unchanged and
/// [`SignOutcome::SimulatedCopy`] is returned.
#[derive(Debug, Clone)]
pub struct ToolSigner {
    program: String,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl Default for ToolSigner {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl ToolSigner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            temp_dir: std::env::temp_dir(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Directory receiving the per-invocation manifest files.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn simulate(&self, input: &Path, output: &Path) -> Result<SignOutcome, SignError> {
        tokio::fs::copy(input, output)
            .await
            .map_err(|e| SignError::io(input, e))?;
        audit::log_simulated(input, output);
        Ok(SignOutcome::SimulatedCopy)
    }
}

#[async_trait]
impl ProvenanceSigner for ToolSigner {
    async fn sign(
        &self,
        input: &Path,
        output: &Path,
        bundle: &CertificateBundle,
        manifest: &ProvenanceManifest,
    ) -> Result<SignOutcome, SignError> {
        bundle.ensure_present()?;

        let manifest_file = ManifestFile::write(&self.temp_dir, &manifest.to_json()?).await?;

        let mut cmd = Command::new(&self.program);
        cmd.arg(input)
            .arg("-m")
            .arg(manifest_file.path())
            .arg("-o")
            .arg(output)
            .arg("-c")
            .arg(&bundle.cert_path)
            .arg("-k")
            .arg(&bundle.key_path)
            .arg("--force")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(program = %self.program, input = %input.display(), "Invoking signing tool");

        let result = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => return Err(SignError::Timeout(self.timeout)),
            Ok(result) => result,
        };

        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => return self.simulate(input, output).await,
            Err(e) => return Err(SignError::io(Path::new(&self.program), e)),
        };

        if out.status.code() == Some(COMMAND_NOT_FOUND) {
            return self.simulate(input, output).await;
        }

        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        if !out.status.success() {
            return Err(SignError::ToolFailed {
                status: out.status.code(),
                stderr,
            });
        }

        let diagnostics = if stderr.is_empty() {
            None
        } else {
            warn!(program = %self.program, stderr = %stderr, "Signing tool reported diagnostics");
            Some(stderr)
        };
        Ok(SignOutcome::Signed { diagnostics })
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Returns the version string printed by `<program> --version`, or `None`
/// when the program is missing or fails.
pub async fn tool_version(program: &str) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(VERSION_PROBE_TIMEOUT, cmd.output()).await {
        Ok(Ok(out)) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
            Some(version).filter(|v| !v.is_empty())
        }
        Ok(Ok(out)) => {
            debug!(program, status = ?out.status.code(), "Version probe failed");
            None
        }
        Ok(Err(e)) => {
            debug!(program, error = %e, "Version probe could not start");
            None
        }
        Err(_) => None,
    }
}

/// Manifest definition written for a single invocation; removed on drop.
struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    async fn write(dir: &Path, json: &str) -> Result<Self, SignError> {
        let path = dir.join(format!("manifest_{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| SignError::io(&path, e))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ManifestFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                debug!(path = %self.path.display(), error = %e, "Failed to remove manifest file");
            }
        }
    }
}
