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

use super::{ManifestReader, ManifestReport, ReadError};
use crate::provenance::Assertion;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Messages `c2patool` prints when a file simply has no manifest.
const NO_MANIFEST_MARKERS: [&str; 3] = ["No claim found", "JumbfNotFound", "no JUMBF data found"];

/// Reads manifests by running `<program> <file>` and parsing the manifest
/// store JSON it prints.
#[derive(Debug, Clone)]
pub struct ToolManifestReader {
    program: String,
    timeout: Duration,
}

impl Default for ToolManifestReader {
    fn default() -> Self {
        Self::new("c2patool")
    }
}

impl ToolManifestReader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ManifestReader for ToolManifestReader {
    async fn read(&self, path: &Path, _mime: &str) -> Result<Option<ManifestReport>, ReadError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(path).stdin(Stdio::null()).kill_on_drop(true);

        let out = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => return Err(ReadError::Timeout(self.timeout)),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(ReadError::ToolUnavailable(self.program.clone()))
            }
            Ok(Err(source)) => {
                return Err(ReadError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Ok(Ok(out)) => out,
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            if NO_MANIFEST_MARKERS.iter().any(|m| stderr.contains(m)) {
                return Ok(None);
            }
            return Err(ReadError::ToolFailed {
                status: out.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        Ok(parse_manifest_store(&stdout)?)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[derive(Deserialize)]
struct ManifestStore {
    active_manifest: Option<String>,
    #[serde(default)]
    manifests: HashMap<String, StoredManifest>,
}

#[derive(Deserialize)]
struct StoredManifest {
    claim_generator: Option<String>,
    #[serde(default)]
    claim_generator_info: Vec<GeneratorInfo>,
    #[serde(default)]
    assertions: Vec<StoredAssertion>,
}

#[derive(Deserialize)]
struct GeneratorInfo {
    name: Option<String>,
    version: Option<String>,
}

#[derive(Deserialize)]
struct StoredAssertion {
    label: String,
    #[serde(default)]
    data: Value,
}

/// Extracts the active manifest from a manifest store JSON document.
///
/// Returns `Ok(None)` when the store names no active manifest.
pub fn parse_manifest_store(json: &str) -> Result<Option<ManifestReport>, serde_json::Error> {
    let mut store: ManifestStore = serde_json::from_str(json)?;
    let Some(active) = store.active_manifest.as_ref() else {
        return Ok(None);
    };
    let Some(manifest) = store.manifests.remove(active) else {
        return Ok(None);
    };

    let first_info = manifest.claim_generator_info.into_iter().next();
    let (info_name, generator_version) = match first_info {
        Some(info) => (info.name, info.version),
        None => (None, None),
    };

    Ok(Some(ManifestReport {
        claim_generator: manifest.claim_generator.or(info_name),
        generator_version,
        assertions: manifest
            .assertions
            .into_iter()
            .map(|a| Assertion {
                label: a.label,
                data: a.data,
            })
            .collect(),
    }))
}
