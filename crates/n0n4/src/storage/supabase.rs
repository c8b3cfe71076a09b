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

//! Bucket in a hosted storage service speaking the
//! `/storage/v1/object/{bucket}/{key}` REST API.

use super::{key_segments, ObjectStore, StorageError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct SupabaseObjectStore {
    client: Client,
    base: Url,
    bucket: String,
    service_key: String,
}

impl SupabaseObjectStore {
    pub fn new(
        project_url: &str,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let service_key = service_key.into();
        let bucket = bucket.into();
        if service_key.trim().is_empty() {
            return Err(StorageError::InvalidConfig("service key is empty".to_string()));
        }
        if bucket.trim().is_empty() || bucket.contains('/') {
            return Err(StorageError::InvalidConfig(format!("invalid bucket '{}'", bucket)));
        }

        let base = Url::parse(project_url)
            .map_err(|e| StorageError::InvalidConfig(format!("{}: {}", project_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(StorageError::InvalidConfig(format!(
                "{} cannot be used as a base URL",
                project_url
            )));
        }

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base,
            bucket,
            service_key,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// URL of the object at `key`; each key segment is percent-encoded.
    pub fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let segments = key_segments(key)?;
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidConfig("base URL has no path".to_string()))?;
            path.pop_if_empty()
                .extend(["storage", "v1", "object", self.bucket.as_str()])
                .extend(segments);
        }
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for SupabaseObjectStore {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let response = self
            .client
            .get(self.object_url(key)?)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Api {
                status: status.as_u16(),
                key: key.to_string(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| StorageError::io(dest, e))?;
        debug!(key, bytes = bytes.len(), "Downloaded object");
        Ok(())
    }

    async fn upload(&self, key: &str, src: &Path, content_type: &str) -> Result<(), StorageError> {
        let url = self.object_url(key)?;
        let body = tokio::fs::read(src)
            .await
            .map_err(|e| StorageError::io(src, e))?;
        let size = body.len();

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Api {
                status: status.as_u16(),
                key: key.to_string(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        debug!(key, bytes = size, content_type, "Uploaded object");
        Ok(())
    }

    fn name(&self) -> &str {
        "supabase"
    }
}
