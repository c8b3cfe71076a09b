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

use super::{CertificateBundle, CertificateProvisioner, ProvisionError};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Provision-once wrapper around a [`CertificateProvisioner`].
///
/// The bundle is reused while both files exist on disk. If either artifact
/// disappears the next caller provisions again. A failed attempt leaves the
/// cache empty.
#[derive(Debug)]
pub struct CertificateCache {
    provisioner: CertificateProvisioner,
    bundle: Mutex<Option<CertificateBundle>>,
}

impl CertificateCache {
    pub fn new(provisioner: CertificateProvisioner) -> Self {
        Self {
            provisioner,
            bundle: Mutex::new(None),
        }
    }

    /// Seeds the cache with an already materialized bundle.
    pub fn with_bundle(provisioner: CertificateProvisioner, bundle: CertificateBundle) -> Self {
        Self {
            provisioner,
            bundle: Mutex::new(Some(bundle)),
        }
    }

    pub async fn get_or_provision(&self) -> Result<CertificateBundle, ProvisionError> {
        let mut guard = self.bundle.lock().await;

        if let Some(bundle) = guard.as_ref() {
            match bundle.ensure_present() {
                Ok(()) => {
                    debug!("Reusing cached certificate bundle");
                    return Ok(bundle.clone());
                }
                Err(e) => {
                    warn!(error = %e, "Cached certificate bundle is gone, provisioning again");
                    *guard = None;
                }
            }
        }

        let bundle = self.provisioner.provision().await?;
        *guard = Some(bundle.clone());
        Ok(bundle)
    }

    /// The cached bundle, without provisioning.
    pub async fn current(&self) -> Option<CertificateBundle> {
        self.bundle.lock().await.clone()
    }

    pub async fn invalidate(&self) {
        *self.bundle.lock().await = None;
    }
}
