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

//! Object storage the runner downloads inputs from and uploads results to.

mod local;
mod supabase;

pub use local::LocalObjectStore;
pub use supabase::SupabaseObjectStore;

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage API returned {status} for '{key}': {body}")]
    Api {
        status: u16,
        key: String,
        body: String,
    },

    #[error("Object '{0}' not found")]
    NotFound(String),

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A bucket of objects addressed by `/`-separated keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes the object at `key` to the local file `dest`.
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError>;

    /// Stores the local file `src` at `key`, replacing any existing object.
    async fn upload(&self, key: &str, src: &Path, content_type: &str) -> Result<(), StorageError>;

    fn name(&self) -> &str;
}

/// Splits a key into its segments, rejecting anything that could escape
/// the bucket root.
pub(crate) fn key_segments(key: &str) -> Result<Vec<&str>, StorageError> {
    let invalid = || StorageError::InvalidKey(key.to_string());
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(invalid());
    }

    let segments: Vec<&str> = key.split('/').collect();
    for segment in &segments {
        if segment.is_empty() {
            return Err(invalid());
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(invalid()),
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert_eq!(
            key_segments("uploads/u1/photo.jpg").unwrap(),
            vec!["uploads", "u1", "photo.jpg"]
        );
        for bad in ["", "/etc/passwd", "a/../b", "..", "a//b", "a/./b", "a\\b", "trailing/"] {
            assert!(
                matches!(key_segments(bad), Err(StorageError::InvalidKey(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
