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
use std::path::Path;

/// Reads manifests in-process with `c2pa::Reader`.
#[derive(Debug, Clone, Default)]
pub struct NativeManifestReader;

impl NativeManifestReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ManifestReader for NativeManifestReader {
    async fn read(&self, path: &Path, _mime: &str) -> Result<Option<ManifestReport>, ReadError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let reader = match c2pa::Reader::from_file(&path) {
                Ok(reader) => reader,
                Err(c2pa::Error::JumbfNotFound) => return Ok(None),
                Err(e) => return Err(ReadError::Native(e.to_string())),
            };

            let Some(manifest) = reader.active_manifest() else {
                return Ok(None);
            };

            let first_info = manifest
                .claim_generator_info
                .as_ref()
                .and_then(|infos| infos.first());

            let assertions = manifest
                .assertions()
                .iter()
                .map(|a| Assertion {
                    label: a.label().to_string(),
                    data: a.value().cloned().unwrap_or(serde_json::Value::Null),
                })
                .collect();

            Ok(Some(ManifestReport {
                claim_generator: manifest
                    .claim_generator()
                    .map(str::to_string)
                    .or_else(|| first_info.map(|info| info.name.clone())),
                generator_version: first_info.and_then(|info| info.version.clone()),
                assertions,
            }))
        })
        .await
        .map_err(|e| ReadError::Native(format!("read task panicked: {}", e)))?
    }

    fn name(&self) -> &str {
        "c2pa-native"
    }
}
