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

//! In-process signer backed by the `c2pa` crate.

use super::{ProvenanceSigner, SignError, SignOutcome};
use crate::certs::CertificateBundle;
use crate::provenance::ProvenanceManifest;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Signs with `c2pa::Builder` using PS256 over the bundle's RSA key.
#[derive(Debug, Clone, Default)]
pub struct NativeSigner {
    tsa_url: Option<String>,
}

impl NativeSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests an RFC 3161 timestamp from `url` while signing.
    pub fn with_tsa_url(mut self, url: impl Into<String>) -> Self {
        self.tsa_url = Some(url.into());
        self
    }
}

#[async_trait]
impl ProvenanceSigner for NativeSigner {
    async fn sign(
        &self,
        input: &Path,
        output: &Path,
        bundle: &CertificateBundle,
        manifest: &ProvenanceManifest,
    ) -> Result<SignOutcome, SignError> {
        bundle.ensure_present()?;

        let definition = manifest.to_json()?;
        let input: PathBuf = input.to_path_buf();
        let output: PathBuf = output.to_path_buf();
        let bundle = bundle.clone();
        let tsa_url = self.tsa_url.clone();

        tokio::task::spawn_blocking(move || -> Result<(), SignError> {
            let signer = c2pa::create_signer::from_files(
                &bundle.cert_path,
                &bundle.key_path,
                c2pa::SigningAlg::Ps256,
                tsa_url,
            )
            .map_err(|e| SignError::Native(e.to_string()))?;

            let mut builder = c2pa::Builder::from_json(&definition)
                .map_err(|e| SignError::Native(e.to_string()))?;

            if output.exists() {
                std::fs::remove_file(&output).map_err(|e| SignError::io(&output, e))?;
            }
            builder
                .sign_file(signer.as_ref(), &input, &output)
                .map_err(|e| SignError::Native(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| SignError::Native(format!("signing task panicked: {}", e)))??;

        Ok(SignOutcome::Signed { diagnostics: None })
    }

    fn name(&self) -> &str {
        "c2pa-native"
    }
}
