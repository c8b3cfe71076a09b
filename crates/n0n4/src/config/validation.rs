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

use crate::config::{types::*, ValidationError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for N0n4Config {
    fn validate(&self) -> Result<(), ValidationError> {
        let results = [
            self.certificates.validate(),
            self.signer.validate(),
            self.verifier.validate(),
            self.storage.validate(),
            self.database.validate(),
            self.runner.validate(),
            self.server.validate(),
        ];
        let mut errors: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

fn positive(field: &str, timeout: u64) -> Result<(), ValidationError> {
    if timeout == 0 {
        return Err(ValidationError::InvalidTimeout {
            field: field.to_string(),
            timeout,
        });
    }
    Ok(())
}

fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField {
            field: field.to_string(),
        }),
    }
}

fn http_url(field: &str, value: &str) -> Result<(), ValidationError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::InvalidUrl {
            field: field.to_string(),
            url: value.to_string(),
        }),
    }
}

fn native_available(field: &str, backend: SignerBackend) -> Result<(), ValidationError> {
    if backend == SignerBackend::Native && !cfg!(feature = "c2pa") {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "the native backend needs the `c2pa` feature".to_string(),
        });
    }
    Ok(())
}

impl Validate for CertificatesConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.key_bits < 2048 {
            return Err(ValidationError::InvalidKeySize {
                bits: self.key_bits,
            });
        }
        if self.validity_days == 0 {
            return Err(ValidationError::InvalidValue {
                field: "certificates.validity_days".to_string(),
                message: "must be positive".to_string(),
            });
        }
        positive("certificates.timeout_secs", self.timeout_secs)
    }
}

impl Validate for SignerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        native_available("signer.backend", self.backend)?;
        if self.backend == SignerBackend::Tool && self.program.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "signer.program".to_string(),
            });
        }
        if let Some(tsa) = &self.tsa_url {
            http_url("signer.tsa_url", tsa)?;
        }
        positive("signer.timeout_secs", self.timeout_secs)
    }
}

impl Validate for VerifierConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        native_available("verifier.backend", self.backend)?;
        if self.backend == SignerBackend::Tool && self.program.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "verifier.program".to_string(),
            });
        }
        positive("verifier.timeout_secs", self.timeout_secs)
    }
}

impl Validate for StorageConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let StorageBackend::Supabase = self.backend {
            let url = required("storage.url", &self.url)?;
            http_url("storage.url", url)?;
            required("storage.service_key", &self.service_key)?;
            if self.bucket.trim().is_empty() || self.bucket.contains('/') {
                return Err(ValidationError::InvalidValue {
                    field: "storage.bucket".to_string(),
                    message: format!("'{}' is not a bucket name", self.bucket),
                });
            }
        }
        positive("storage.timeout_secs", self.timeout_secs)
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.backend {
            DatabaseBackend::Postgrest => {
                let url = required("database.url", &self.url)?;
                http_url("database.url", url)?;
                required("database.service_key", &self.service_key)?;
            }
            DatabaseBackend::Sqlite => {
                if !cfg!(feature = "sqlite") {
                    return Err(ValidationError::InvalidValue {
                        field: "database.backend".to_string(),
                        message: "the sqlite backend needs the `sqlite` feature".to_string(),
                    });
                }
                required("database.url", &self.url)?;
            }
            DatabaseBackend::Memory => {}
        }
        if self.table.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "database.table".to_string(),
            });
        }
        positive("database.timeout_secs", self.timeout_secs)
    }
}

impl Validate for RunnerSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_limit == 0 || self.batch_limit > 100 {
            return Err(ValidationError::InvalidBatchLimit {
                limit: self.batch_limit,
            });
        }
        output_prefix(&self.output_prefix)?;
        positive("runner.job_timeout_secs", self.job_timeout_secs)
    }
}

/// The prefix must yield storage keys: relative, no empty or dot segments.
/// One trailing `/` is allowed and added when missing.
fn output_prefix(prefix: &str) -> Result<(), ValidationError> {
    let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    if prefix.is_empty() {
        return Ok(());
    }
    crate::storage::key_segments(trimmed)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidValue {
            field: "runner.output_prefix".to_string(),
            message: format!("'{}' does not form valid object keys", prefix),
        })
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ValidationError::InvalidLogLevel {
                    level: self.log_level.clone(),
                });
            }
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort { port: self.port });
        }
        Ok(())
    }
}
