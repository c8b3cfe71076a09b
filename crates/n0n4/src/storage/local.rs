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

use super::{key_segments, ObjectStore, StorageError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Object store backed by a directory; keys map to relative paths.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(key_segments(key)?
            .into_iter()
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let source = self.path_for(key)?;
        match tokio::fs::copy(&source, dest).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::io(&source, e)),
        }
    }

    async fn upload(&self, key: &str, src: &Path, _content_type: &str) -> Result<(), StorageError> {
        let target = self.path_for(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        tokio::fs::copy(src, &target)
            .await
            .map_err(|e| StorageError::io(src, e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}
