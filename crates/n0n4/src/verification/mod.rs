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

//! Layered provenance verification.
//!
//! A file is checked in order:
//!
//! 1. Structured read through a [`ManifestReader`]. An application
//!    manifest yields its metadata assertion; any other valid manifest
//!    yields a reduced, generic stamp.
//! 2. In-band scan with [`crate::codec`].
//!
//! Failures at either layer are logged and never returned; the only
//! negative outcome is `None`.

mod tool;

#[cfg(feature = "c2pa")]
mod native;

#[cfg(feature = "c2pa")]
pub use native::NativeManifestReader;
pub use tool::{parse_manifest_store, ToolManifestReader};

use crate::audit;
use crate::codec;
use crate::provenance::{Assertion, StampMetadata, METADATA_LABEL};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// The active manifest of a file as reported by a reader.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ManifestReport {
    pub claim_generator: Option<String>,
    /// Version of the first claim generator info entry, if any.
    pub generator_version: Option<String>,
    pub assertions: Vec<Assertion>,
}

impl ManifestReport {
    pub fn find_assertion(&self, label: &str) -> Option<&Assertion> {
        self.assertions.iter().find(|a| a.label == label)
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Manifest reader '{0}' is not installed")]
    ToolUnavailable(String),

    #[error("Manifest reader failed (exit code {status:?}): {stderr}")]
    ToolFailed { status: Option<i32>, stderr: String },

    #[error("Manifest read timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed manifest report: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Native manifest read failed: {0}")]
    Native(String),
}

/// Reads the active manifest of a file.
///
/// `Ok(None)` means the file carries no manifest.
#[async_trait]
pub trait ManifestReader: Send + Sync {
    async fn read(&self, path: &Path, mime: &str) -> Result<Option<ManifestReport>, ReadError>;

    fn name(&self) -> &str;
}

/// Which layer recovered the provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationSource {
    /// A manifest carrying the application metadata assertion.
    Application,
    /// A valid manifest written by another tool.
    External,
    /// Metadata appended by the in-band codec.
    InBand,
}

impl VerificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationSource::Application => "application",
            VerificationSource::External => "external",
            VerificationSource::InBand => "inband",
        }
    }
}

/// Recovered provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedProvenance {
    pub source: VerificationSource,
    pub metadata: Value,
}

impl VerifiedProvenance {
    /// Interprets the metadata as a stamp declaration, when it is one.
    pub fn stamp(&self) -> Option<StampMetadata> {
        serde_json::from_value(self.metadata.clone()).ok()
    }
}

/// Runs the layered verification strategy.
#[derive(Clone)]
pub struct Verifier {
    reader: Option<Arc<dyn ManifestReader>>,
    scratch_dir: PathBuf,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("reader", &self.reader.as_ref().map(|r| r.name().to_string()))
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

impl Verifier {
    pub fn new(reader: Arc<dyn ManifestReader>) -> Self {
        Self {
            reader: Some(reader),
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// A verifier that only performs the in-band scan.
    pub fn inband_only() -> Self {
        Self {
            reader: None,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Directory used to stage buffers passed to [`Verifier::verify_bytes`].
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub async fn verify(&self, path: &Path) -> Option<VerifiedProvenance> {
        let subject = path.display().to_string();

        if let Some(found) = self.structured(path, content_type_for(path)).await {
            return Some(self.report(&subject, found));
        }

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                if let Some(found) = inband(&bytes) {
                    return Some(self.report(&subject, found));
                }
            }
            Err(e) => warn!(subject = %subject, error = %e, "Could not read file for in-band scan"),
        }

        audit::log_verification_not_found(&subject);
        None
    }

    /// Verifies an in-memory buffer of the given MIME type.
    pub async fn verify_bytes(&self, bytes: &[u8], mime: &str) -> Option<VerifiedProvenance> {
        let subject = format!("<{} bytes of {}>", bytes.len(), mime);

        if self.reader.is_some() {
            match StagedBuffer::write(&self.scratch_dir, bytes, mime).await {
                Ok(staged) => {
                    if let Some(found) = self.structured(staged.path(), mime).await {
                        return Some(self.report(&subject, found));
                    }
                }
                Err(e) => warn!(error = %e, "Could not stage buffer for structured read"),
            }
        }

        if let Some(found) = inband(bytes) {
            return Some(self.report(&subject, found));
        }

        audit::log_verification_not_found(&subject);
        None
    }

    async fn structured(&self, path: &Path, mime: &str) -> Option<VerifiedProvenance> {
        let reader = self.reader.as_ref()?;
        match reader.read(path, mime).await {
            Ok(Some(report)) => Some(from_report(report)),
            Ok(None) => {
                debug!(path = %path.display(), reader = reader.name(), "No structured manifest");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), reader = reader.name(), error = %e, "Structured manifest read failed");
                None
            }
        }
    }

    fn report(&self, subject: &str, found: VerifiedProvenance) -> VerifiedProvenance {
        audit::log_verification_success(subject, found.source.as_str());
        found
    }
}

fn from_report(report: ManifestReport) -> VerifiedProvenance {
    if let Some(assertion) = report.find_assertion(METADATA_LABEL) {
        return VerifiedProvenance {
            source: VerificationSource::Application,
            metadata: assertion.data.clone(),
        };
    }

    let timestamp = report
        .generator_version
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    let stamp = StampMetadata::external(report.claim_generator.as_deref(), timestamp);
    VerifiedProvenance {
        source: VerificationSource::External,
        metadata: serde_json::to_value(stamp).unwrap_or(Value::Null),
    }
}

fn inband(bytes: &[u8]) -> Option<VerifiedProvenance> {
    codec::extract_value(bytes).map(|metadata| VerifiedProvenance {
        source: VerificationSource::InBand,
        metadata,
    })
}

/// Maps a file extension to the MIME type used for uploads and reads.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("avif") => "image/avif",
        Some("heic") => "image/heic",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/tiff" => "tiff",
        "image/avif" => "avif",
        "image/heic" => "heic",
        "image/svg+xml" => "svg",
        "application/pdf" => "pdf",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        _ => "bin",
    }
}

/// Buffer written to disk for a path-based reader; removed on drop.
struct StagedBuffer {
    path: PathBuf,
}

impl StagedBuffer {
    async fn write(dir: &Path, bytes: &[u8], mime: &str) -> std::io::Result<Self> {
        let path = dir.join(format!(
            "verify_{}.{}",
            uuid::Uuid::new_v4(),
            extension_for(mime)
        ));
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedBuffer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{AiLevel, ProvenanceManifest};
    use serde_json::json;

    enum Scripted {
        Found(ManifestReport),
        Nothing,
        Fails,
    }

    struct FakeReader(Scripted);

    #[async_trait]
    impl ManifestReader for FakeReader {
        async fn read(
            &self,
            _path: &Path,
            _mime: &str,
        ) -> Result<Option<ManifestReport>, ReadError> {
            match &self.0 {
                Scripted::Found(report) => Ok(Some(report.clone())),
                Scripted::Nothing => Ok(None),
                Scripted::Fails => Err(ReadError::ToolFailed {
                    status: Some(1),
                    stderr: "boom".to_string(),
                }),
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn verifier(script: Scripted, scratch: &Path) -> Verifier {
        Verifier::new(Arc::new(FakeReader(script))).with_scratch_dir(scratch)
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_application_manifest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ProvenanceManifest::created(json!({"author": "alice", "level": 0}));
        let report = ManifestReport {
            claim_generator: Some(manifest.claim_generator.clone()),
            generator_version: None,
            assertions: manifest.assertions.clone(),
        };
        let path = write(dir.path(), "a.jpg", b"signed");

        let found = verifier(Scripted::Found(report), dir.path())
            .verify(&path)
            .await
            .unwrap();
        assert_eq!(found.source, VerificationSource::Application);
        assert_eq!(found.metadata, json!({"author": "alice", "level": 0}));
    }

    #[tokio::test]
    async fn test_external_manifest_yields_generic_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let report = ManifestReport {
            claim_generator: Some("Adobe_Photoshop/25.0".to_string()),
            generator_version: Some("25.0.1".to_string()),
            assertions: vec![Assertion {
                label: "c2pa.actions".to_string(),
                data: json!({"actions": []}),
            }],
        };
        let path = write(dir.path(), "b.jpg", b"signed elsewhere");

        let found = verifier(Scripted::Found(report), dir.path())
            .verify(&path)
            .await
            .unwrap();
        assert_eq!(found.source, VerificationSource::External);

        let stamp = found.stamp().unwrap();
        assert_eq!(stamp.author, "Adobe_Photoshop/25.0");
        assert_eq!(stamp.level, AiLevel::CoAuthor);
        assert_eq!(stamp.level_label, "C2PA Validated");
        assert_eq!(stamp.timestamp, "25.0.1");
    }

    #[tokio::test]
    async fn test_reader_failure_falls_back_to_inband() {
        let dir = tempfile::tempdir().unwrap();
        let stamped = codec::embed(b"pdf bytes", &json!({"author": "bob"})).unwrap();
        let path = write(dir.path(), "c.pdf", &stamped);

        let found = verifier(Scripted::Fails, dir.path())
            .verify(&path)
            .await
            .unwrap();
        assert_eq!(found.source, VerificationSource::InBand);
        assert_eq!(found.metadata, json!({"author": "bob"}));
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "d.png", b"hello world");

        assert!(verifier(Scripted::Nothing, dir.path())
            .verify(&path)
            .await
            .is_none());
        assert!(verifier(Scripted::Fails, dir.path())
            .verify(&path)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");
        assert!(Verifier::inband_only().verify(&missing).await.is_none());
    }

    #[tokio::test]
    async fn test_verify_bytes_cleans_up_staging() {
        let dir = tempfile::tempdir().unwrap();
        let stamped = codec::embed(b"png", &json!({"jobId": "9"})).unwrap();

        let found = verifier(Scripted::Nothing, dir.path())
            .verify_bytes(&stamped, "image/png")
            .await
            .unwrap();
        assert_eq!(found.source, VerificationSource::InBand);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_inband_only_verifier() {
        let found = Verifier::inband_only()
            .verify_bytes(b"plain", "image/jpeg")
            .await;
        assert!(found.is_none());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("x/photo.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("doc.pdf")), "application/pdf");
        assert_eq!(content_type_for(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("application/x-unknown"), "bin");
    }
}
