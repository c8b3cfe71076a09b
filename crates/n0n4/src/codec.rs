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

//! In-band fallback carrier for provenance metadata.
//!
//! When cryptographic signing is not available the metadata is appended to
//! the file itself:
//!
//! ```text
//! <original bytes><MANIFEST_SEPARATOR><UTF-8 JSON metadata>
//! ```
//!
//! Most image viewers and PDF readers ignore trailing bytes, so the file
//! stays usable. This carrier offers no integrity protection at all.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Marker delimiting the original bytes from the appended metadata.
pub const MANIFEST_SEPARATOR: &[u8] = b"__N0N4_C2PA_MANIFEST__";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to serialize metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Appends the separator and the JSON encoding of `metadata` to `original`.
pub fn embed<T: Serialize + ?Sized>(original: &[u8], metadata: &T) -> Result<Vec<u8>, CodecError> {
    let json = serde_json::to_vec(metadata)?;
    let mut out = Vec::with_capacity(original.len() + MANIFEST_SEPARATOR.len() + json.len());
    out.extend_from_slice(original);
    out.extend_from_slice(MANIFEST_SEPARATOR);
    out.extend_from_slice(&json);
    Ok(out)
}

/// Recovers appended metadata, or `None` when no parseable record exists.
///
/// Separator occurrences are tried from the last one backwards, so a marker
/// that happens to occur inside the original binary content does not shadow
/// the real record, and a marker inside the metadata text falls back to the
/// earlier, complete one.
pub fn extract<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    separator_positions(bytes)
        .into_iter()
        .rev()
        .find_map(|pos| {
            let tail = &bytes[pos + MANIFEST_SEPARATOR.len()..];
            let text = std::str::from_utf8(tail).ok()?;
            serde_json::from_str(text).ok()
        })
}

/// [`extract`] into an untyped JSON value.
pub fn extract_value(bytes: &[u8]) -> Option<Value> {
    extract(bytes)
}

/// Reads `input`, embeds `metadata` and writes the result to `output`.
pub async fn embed_file<T: Serialize + ?Sized>(
    input: &Path,
    output: &Path,
    metadata: &T,
) -> Result<(), CodecError> {
    let original = tokio::fs::read(input).await?;
    let stamped = embed(&original, metadata)?;
    tokio::fs::write(output, stamped).await?;
    Ok(())
}

/// Reads `path` and extracts any appended metadata.
pub async fn extract_file(path: &Path) -> Result<Option<Value>, CodecError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(extract_value(&bytes))
}

fn separator_positions(bytes: &[u8]) -> Vec<usize> {
    if bytes.len() < MANIFEST_SEPARATOR.len() {
        return Vec::new();
    }
    bytes
        .windows(MANIFEST_SEPARATOR.len())
        .enumerate()
        .filter(|(_, window)| *window == MANIFEST_SEPARATOR)
        .map(|(pos, _)| pos)
        .collect()
}
