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

use super::{CertificateBundle, ProvisionError};
use crate::audit;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";
const MIN_KEY_BITS: u32 = 2048;

/// Settings for [`CertificateProvisioner`].
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Directory receiving `cert.pem` and `key.pem`.
    pub cert_dir: PathBuf,
    /// Certificate PEM text supplied by the deployment, if any.
    pub certificate_pem: Option<String>,
    /// Private key PEM text supplied by the deployment, if any.
    pub private_key_pem: Option<String>,
    /// Program used to generate a self-signed pair.
    pub openssl_program: String,
    pub key_bits: u32,
    pub validity_days: u32,
    pub subject: String,
    /// Upper bound on the generation subprocess.
    pub timeout: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            cert_dir: PathBuf::from("certs"),
            certificate_pem: None,
            private_key_pem: None,
            openssl_program: "openssl".to_string(),
            key_bits: MIN_KEY_BITS,
            validity_days: 365,
            subject: "/CN=TestSigner".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ProvisionerConfig {
    /// Supplied material, when both halves are present and non-blank.
    fn supplied(&self) -> Option<(&str, &str)> {
        match (&self.certificate_pem, &self.private_key_pem) {
            (Some(cert), Some(key)) if !cert.trim().is_empty() && !key.trim().is_empty() => {
                Some((cert.as_str(), key.as_str()))
            }
            _ => None,
        }
    }
}

/// Converts literal `\n` escapes (as found in single-line environment
/// variables) into real newlines.
pub fn normalize_pem(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// Makes sure a certificate and key exist at fixed paths under `cert_dir`.
#[derive(Debug, Clone)]
pub struct CertificateProvisioner {
    config: ProvisionerConfig,
}

impl CertificateProvisioner {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Paths the bundle is written to.
    pub fn target_bundle(&self) -> CertificateBundle {
        CertificateBundle::new(
            self.config.cert_dir.join(CERT_FILE),
            self.config.cert_dir.join(KEY_FILE),
        )
    }

    /// Writes the supplied PEM material, or generates a self-signed pair when
    /// none is configured.
    ///
    /// Not retried; callers decide whether to provision again later.
    pub async fn provision(&self) -> Result<CertificateBundle, ProvisionError> {
        let result = self.provision_inner().await;
        match &result {
            Ok(bundle) => {
                let source = if self.config.supplied().is_some() {
                    "supplied"
                } else {
                    "self-signed"
                };
                let fingerprint = bundle.fingerprint().ok();
                audit::log_certificate_provisioned(&bundle.cert_path, source, fingerprint.as_deref());
            }
            Err(e) => audit::log_certificate_provision_failed(&e.to_string()),
        }
        result
    }

    async fn provision_inner(&self) -> Result<CertificateBundle, ProvisionError> {
        let dir = &self.config.cert_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ProvisionError::Io {
                path: dir.clone(),
                source,
            })?;

        let bundle = self.target_bundle();

        match self.config.supplied() {
            Some((cert, key)) => {
                info!("Provisioning supplied certificates to disk");
                let cert = normalize_pem(cert);
                let key = normalize_pem(key);
                validate_pem(&cert, "certificate", |tag| tag == "CERTIFICATE")?;
                validate_pem(&key, "private key", |tag| tag.ends_with("PRIVATE KEY"))?;

                write_file(&bundle.cert_path, cert.as_bytes()).await?;
                write_file(&bundle.key_path, key.as_bytes()).await?;
            }
            None => {
                if self.config.certificate_pem.is_some() || self.config.private_key_pem.is_some() {
                    warn!("Only one of certificate / private key supplied, ignoring it");
                }
                warn!("No signing certificate supplied, generating a temporary self-signed pair");
                self.generate(&bundle).await?;
            }
        }

        restrict_key_permissions(&bundle.key_path).await?;
        bundle.ensure_present()?;
        Ok(bundle)
    }

    async fn generate(&self, bundle: &CertificateBundle) -> Result<(), ProvisionError> {
        if self.config.key_bits < MIN_KEY_BITS {
            return Err(ProvisionError::KeyTooSmall(self.config.key_bits));
        }

        let program = &self.config.openssl_program;
        let mut cmd = Command::new(program);
        cmd.arg("req")
            .arg("-x509")
            .arg("-newkey")
            .arg(format!("rsa:{}", self.config.key_bits))
            .arg("-keyout")
            .arg(&bundle.key_path)
            .arg("-out")
            .arg(&bundle.cert_path)
            .arg("-days")
            .arg(self.config.validity_days.to_string())
            .arg("-nodes")
            .arg("-subj")
            .arg(&self.config.subject)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.timeout, cmd.output()).await {
            Err(_) => return Err(ProvisionError::Timeout(self.config.timeout)),
            Ok(Err(source)) => {
                return Err(ProvisionError::ToolUnavailable {
                    program: program.clone(),
                    source,
                })
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(ProvisionError::GenerationFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(
            key_bits = self.config.key_bits,
            validity_days = self.config.validity_days,
            "Temporary self-signed certificate generated"
        );
        Ok(())
    }
}

fn validate_pem(
    text: &str,
    which: &'static str,
    accept: impl Fn(&str) -> bool,
) -> Result<(), ProvisionError> {
    let blocks = pem::parse_many(text).map_err(|e| ProvisionError::InvalidPem {
        which,
        reason: e.to_string(),
    })?;
    if blocks.iter().any(|block| accept(block.tag())) {
        Ok(())
    } else {
        Err(ProvisionError::InvalidPem {
            which,
            reason: "no matching PEM block".to_string(),
        })
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), ProvisionError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| ProvisionError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(unix)]
async fn restrict_key_permissions(path: &Path) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;

    if !path.exists() {
        return Ok(());
    }
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|source| ProvisionError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn restrict_key_permissions(_path: &Path) -> Result<(), ProvisionError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::test_material::{CERTIFICATE, PRIVATE_KEY};

    fn config_in(dir: &Path) -> ProvisionerConfig {
        ProvisionerConfig {
            cert_dir: dir.join("nested").join("certs"),
            ..ProvisionerConfig::default()
        }
    }

    fn escaped(pem: &str) -> String {
        pem.replace('\n', "\\n")
    }

    #[test]
    fn test_normalize_pem() {
        assert_eq!(normalize_pem("a\\nb\\n"), "a\nb\n");
        assert_eq!(normalize_pem("already\nfine"), "already\nfine");
    }

    #[tokio::test]
    async fn test_supplied_material_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionerConfig {
            certificate_pem: Some(escaped(CERTIFICATE)),
            private_key_pem: Some(escaped(PRIVATE_KEY)),
            ..config_in(dir.path())
        };

        let bundle = CertificateProvisioner::new(config).provision().await.unwrap();

        assert!(bundle.cert_path.ends_with("nested/certs/cert.pem"));
        assert_eq!(std::fs::read_to_string(&bundle.cert_path).unwrap(), CERTIFICATE);
        assert_eq!(std::fs::read_to_string(&bundle.key_path).unwrap(), PRIVATE_KEY);
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionerConfig {
            certificate_pem: Some(CERTIFICATE.to_string()),
            private_key_pem: Some(PRIVATE_KEY.to_string()),
            ..config_in(dir.path())
        };
        let provisioner = CertificateProvisioner::new(config);

        let first = provisioner.provision().await.unwrap();
        let second = provisioner.provision().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_supplied_material_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionerConfig {
            certificate_pem: Some(PRIVATE_KEY.to_string()),
            private_key_pem: Some(PRIVATE_KEY.to_string()),
            ..config_in(dir.path())
        };

        let result = CertificateProvisioner::new(config).provision().await;
        assert!(matches!(
            result,
            Err(ProvisionError::InvalidPem {
                which: "certificate",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_generator_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionerConfig {
            openssl_program: "n0n4-no-such-openssl".to_string(),
            ..config_in(dir.path())
        };

        let result = CertificateProvisioner::new(config).provision().await;
        assert!(matches!(result, Err(ProvisionError::ToolUnavailable { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_generator_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionerConfig {
            openssl_program: "false".to_string(),
            ..config_in(dir.path())
        };

        let result = CertificateProvisioner::new(config).provision().await;
        assert!(matches!(
            result,
            Err(ProvisionError::GenerationFailed { status: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_small_keys_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionerConfig {
            key_bits: 1024,
            ..config_in(dir.path())
        };

        let result = CertificateProvisioner::new(config).provision().await;
        assert!(matches!(result, Err(ProvisionError::KeyTooSmall(1024))));
    }

    #[tokio::test]
    #[ignore = "requires openssl on PATH"]
    async fn test_generates_self_signed_pair() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = CertificateProvisioner::new(config_in(dir.path()))
            .provision()
            .await
            .unwrap();

        bundle.ensure_present().unwrap();
        assert_eq!(bundle.fingerprint().unwrap().len(), 64);
    }
}
