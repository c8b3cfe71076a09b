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

use super::{ProvenanceSigner, SignError, SignOutcome};
use crate::audit;
use crate::certs::CertificateBundle;
use crate::codec;
use crate::provenance::ProvenanceManifest;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Signing policy wrapped around a [`ProvenanceSigner`].
///
/// - `allow_simulated = false` turns a [`SignOutcome::SimulatedCopy`] into
///   [`SignError::SimulatedRefused`] and removes the unsigned copy.
/// - `inband_fallback = true` appends the application metadata with the
///   in-band codec when the signer fails for any reason other than a
///   missing certificate.
#[derive(Clone)]
pub struct Protector {
    signer: Arc<dyn ProvenanceSigner>,
    inband_fallback: bool,
    allow_simulated: bool,
}

impl std::fmt::Debug for Protector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protector")
            .field("signer", &self.signer.name())
            .field("inband_fallback", &self.inband_fallback)
            .field("allow_simulated", &self.allow_simulated)
            .finish()
    }
}

impl Protector {
    pub fn new(signer: Arc<dyn ProvenanceSigner>) -> Self {
        Self {
            signer,
            inband_fallback: false,
            allow_simulated: true,
        }
    }

    pub fn with_inband_fallback(mut self, enabled: bool) -> Self {
        self.inband_fallback = enabled;
        self
    }

    pub fn with_allow_simulated(mut self, allowed: bool) -> Self {
        self.allow_simulated = allowed;
        self
    }

    pub fn signer_name(&self) -> &str {
        self.signer.name()
    }

    pub async fn protect(
        &self,
        input: &Path,
        output: &Path,
        bundle: &CertificateBundle,
        manifest: &ProvenanceManifest,
    ) -> Result<SignOutcome, SignError> {
        let result = match self.signer.sign(input, output, bundle, manifest).await {
            Ok(SignOutcome::SimulatedCopy) if !self.allow_simulated => {
                if let Err(e) = tokio::fs::remove_file(output).await {
                    debug!(path = %output.display(), error = %e, "Failed to remove unsigned copy");
                }
                Err(SignError::SimulatedRefused)
            }
            other => other,
        };

        match result {
            Ok(outcome) => {
                if outcome.is_signed() {
                    audit::log_signed(input, output, self.signer.name());
                }
                Ok(outcome)
            }
            Err(e @ SignError::MissingCertificate(_)) => {
                audit::log_sign_failed(input, self.signer.name(), &e.to_string());
                Err(e)
            }
            Err(e) if self.inband_fallback => {
                match manifest.application_metadata() {
                    Some(metadata) => codec::embed_file(input, output, metadata).await?,
                    None => codec::embed_file(input, output, manifest).await?,
                }
                audit::log_embedded(input, output, &e.to_string());
                Ok(SignOutcome::Embedded)
            }
            Err(e) => {
                audit::log_sign_failed(input, self.signer.name(), &e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::test_material::{CERTIFICATE, PRIVATE_KEY};
    use async_trait::async_trait;
    use serde_json::json;

    /// Returns a fixed outcome; copies input to output unless it fails.
    struct ScriptedSigner {
        outcome: fn() -> Result<SignOutcome, SignError>,
    }

    #[async_trait]
    impl ProvenanceSigner for ScriptedSigner {
        async fn sign(
            &self,
            input: &Path,
            output: &Path,
            bundle: &CertificateBundle,
            _manifest: &ProvenanceManifest,
        ) -> Result<SignOutcome, SignError> {
            bundle.ensure_present()?;
            let outcome = (self.outcome)()?;
            std::fs::copy(input, output).unwrap();
            Ok(outcome)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn protector(outcome: fn() -> Result<SignOutcome, SignError>) -> Protector {
        Protector::new(Arc::new(ScriptedSigner { outcome }))
    }

    fn tool_failure() -> Result<SignOutcome, SignError> {
        Err(SignError::ToolFailed {
            status: Some(1),
            stderr: "unsupported format".to_string(),
        })
    }

    fn setup() -> (tempfile::TempDir, CertificateBundle, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, CERTIFICATE).unwrap();
        std::fs::write(&key, PRIVATE_KEY).unwrap();
        let input = dir.path().join("in.jpg");
        std::fs::write(&input, b"jpeg bytes").unwrap();
        (dir, CertificateBundle::new(cert, key), input)
    }

    fn manifest() -> ProvenanceManifest {
        ProvenanceManifest::created(json!({"author": "erin", "level": 1}))
    }

    #[tokio::test]
    async fn test_signed_outcome_passes_through() {
        let (dir, bundle, input) = setup();
        let output = dir.path().join("out.jpg");

        let outcome = protector(|| Ok(SignOutcome::Signed { diagnostics: None }))
            .protect(&input, &output, &bundle, &manifest())
            .await
            .unwrap();
        assert!(outcome.is_signed());
    }

    #[tokio::test]
    async fn test_failure_without_fallback_propagates() {
        let (dir, bundle, input) = setup();
        let output = dir.path().join("out.jpg");

        let result = protector(tool_failure)
            .protect(&input, &output, &bundle, &manifest())
            .await;
        assert!(matches!(result, Err(SignError::ToolFailed { .. })));
    }

    #[tokio::test]
    async fn test_failure_with_fallback_embeds_metadata() {
        let (dir, bundle, input) = setup();
        let output = dir.path().join("out.jpg");

        let outcome = protector(tool_failure)
            .with_inband_fallback(true)
            .protect(&input, &output, &bundle, &manifest())
            .await
            .unwrap();

        assert_eq!(outcome, SignOutcome::Embedded);
        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"jpeg bytes"));
        assert_eq!(
            codec::extract_value(&bytes),
            Some(json!({"author": "erin", "level": 1}))
        );
    }

    #[tokio::test]
    async fn test_missing_certificate_never_falls_back() {
        let (dir, _bundle, input) = setup();
        let output = dir.path().join("out.jpg");
        let bundle = CertificateBundle::new(dir.path().join("x.pem"), dir.path().join("y.pem"));

        let result = protector(tool_failure)
            .with_inband_fallback(true)
            .protect(&input, &output, &bundle, &manifest())
            .await;

        assert!(matches!(result, Err(SignError::MissingCertificate(_))));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_simulated_copy_can_be_refused() {
        let (dir, bundle, input) = setup();
        let output = dir.path().join("out.jpg");

        let result = protector(|| Ok(SignOutcome::SimulatedCopy))
            .with_allow_simulated(false)
            .protect(&input, &output, &bundle, &manifest())
            .await;

        assert!(matches!(result, Err(SignError::SimulatedRefused)));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_simulated_copy_allowed_by_default() {
        let (dir, bundle, input) = setup();
        let output = dir.path().join("out.jpg");

        let outcome = protector(|| Ok(SignOutcome::SimulatedCopy))
            .protect(&input, &output, &bundle, &manifest())
            .await
            .unwrap();
        assert!(outcome.is_simulated());
        assert_eq!(std::fs::read(&output).unwrap(), b"jpeg bytes");
    }
}
