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

//! Layered configuration: TOML file, `${VAR}` substitution, then the
//! deployment environment variables.

mod defaults;
mod error;
mod loader;
mod types;
mod validation;

pub use defaults::generate_default_config_toml;
pub use error::{ConfigError, ValidationError};
pub use loader::{apply_env_overrides, expand_vars, ConfigLoader, CONFIG_ENV};
pub use types::*;
pub use validation::Validate;

use crate::certs::ProvisionerConfig;
use crate::runner::RunnerConfig;
use std::time::Duration;

impl CertificatesConfig {
    pub fn to_provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            cert_dir: self.cert_dir.clone(),
            certificate_pem: self.certificate_pem.clone(),
            private_key_pem: self.private_key_pem.clone(),
            openssl_program: self.openssl_program.clone(),
            key_bits: self.key_bits,
            validity_days: self.validity_days,
            subject: self.subject.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl RunnerSettings {
    pub fn to_runner_config(&self) -> RunnerConfig {
        let mut builder = RunnerConfig::builder()
            .batch_limit(self.batch_limit)
            .output_prefix(self.output_prefix.clone())
            .job_timeout(Duration::from_secs(self.job_timeout_secs));
        if let Some(dir) = &self.work_dir {
            builder = builder.work_dir(dir.clone());
        }
        builder.build()
    }
}
