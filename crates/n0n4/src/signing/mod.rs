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

//! Manifest signing.
//!
//! This module provides:
//! - [`ProvenanceSigner`], the pluggable signing boundary
//! - [`ToolSigner`], which shells out to `c2patool`
//! - `NativeSigner`, backed by the `c2pa` crate (feature `c2pa`)
//! - [`Protector`], the policy layer that adds the in-band fallback
//!
//! Every signer reports a [`SignOutcome`] so callers can tell a real
//! signature from a degraded result.

mod protect;
mod tool;

#[cfg(feature = "c2pa")]
mod native;

#[cfg(feature = "c2pa")]
pub use native::NativeSigner;
pub use protect::Protector;
pub use tool::{tool_version, ToolSigner};

use crate::certs::{CertificateBundle, ProvisionError};
use crate::codec::CodecError;
use crate::provenance::ProvenanceManifest;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Result of a successful signing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    /// A manifest was cryptographically embedded. `diagnostics` holds
    /// anything the signer printed on standard error.
    Signed { diagnostics: Option<String> },
    /// The signing tool was absent; the output is an unsigned copy.
    SimulatedCopy,
    /// Metadata was appended with the in-band codec; not tamper-evident.
    Embedded,
}

impl SignOutcome {
    pub fn is_simulated(&self) -> bool {
        matches!(self, SignOutcome::SimulatedCopy)
    }

    /// Whether the output carries a real signature.
    pub fn is_signed(&self) -> bool {
        matches!(self, SignOutcome::Signed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignOutcome::Signed { .. } => "signed",
            SignOutcome::SimulatedCopy => "simulated",
            SignOutcome::Embedded => "embedded",
        }
    }
}

/// Errors that can occur during signing.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Certificate bundle unavailable: {0}")]
    MissingCertificate(#[from] ProvisionError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Signing tool failed (exit code {status:?}): {stderr}")]
    ToolFailed { status: Option<i32>, stderr: String },

    #[error("Signing timed out after {0:?}")]
    Timeout(Duration),

    #[error("Native signing failed: {0}")]
    Native(String),

    #[error("In-band fallback failed: {0}")]
    Codec(#[from] CodecError),

    #[error("Signing tool unavailable and simulated output is not allowed")]
    SimulatedRefused,
}

impl SignError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        SignError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Embeds a provenance manifest into a file.
///
/// Implementations must check that `bundle` is present on disk before doing
/// any work, and must not leave temporary files behind on any exit path.
#[async_trait]
pub trait ProvenanceSigner: Send + Sync {
    async fn sign(
        &self,
        input: &Path,
        output: &Path,
        bundle: &CertificateBundle,
        manifest: &ProvenanceManifest,
    ) -> Result<SignOutcome, SignError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
