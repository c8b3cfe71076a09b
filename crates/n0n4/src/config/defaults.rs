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

use crate::config::types::*;
use std::path::PathBuf;

impl Default for CertificatesConfig {
    fn default() -> Self {
        Self {
            cert_dir: PathBuf::from("certs"),
            certificate_pem: None,
            private_key_pem: None,
            openssl_program: "openssl".to_string(),
            key_bits: 2048,
            validity_days: 365,
            subject: "/CN=TestSigner".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            backend: SignerBackend::Tool,
            program: "c2patool".to_string(),
            timeout_secs: 120,
            inband_fallback: false,
            allow_simulated: true,
            temp_dir: None,
            tsa_url: None,
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            backend: SignerBackend::Tool,
            program: "c2patool".to_string(),
            timeout_secs: 60,
            scratch_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Supabase,
            url: None,
            service_key: None,
            bucket: "c2pa-files".to_string(),
            local_root: PathBuf::from("storage"),
            timeout_secs: 60,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Postgrest,
            url: None,
            service_key: None,
            table: crate::jobs::JOBS_TABLE.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            batch_limit: 5,
            work_dir: None,
            output_prefix: "signed/".to_string(),
            job_timeout_secs: 300,
            run_on_start: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// Generate the default configuration as TOML.
pub fn generate_default_config_toml() -> Result<String, toml::ser::Error> {
    let config = N0n4Config::default();
    toml::to_string_pretty(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = generate_default_config_toml().unwrap();
        assert!(rendered.contains("[certificates]"));
        assert!(rendered.contains("backend = \"postgrest\""));

        let parsed: N0n4Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.runner.batch_limit, 5);
        assert_eq!(parsed.database.table, "jobs");
        assert!(parsed.certificates.certificate_pem.is_none());
    }

    #[test]
    fn test_partial_sections_fill_in_defaults() {
        let parsed: N0n4Config = toml::from_str(
            r#"
            [storage]
            backend = "local"
            local_root = "/srv/files"

            [runner]
            batch_limit = 2
            "#,
        )
        .unwrap();
        assert_eq!(parsed.storage.backend, StorageBackend::Local);
        assert_eq!(parsed.storage.bucket, "c2pa-files");
        assert_eq!(parsed.runner.batch_limit, 2);
        assert_eq!(parsed.runner.output_prefix, "signed/");
        assert_eq!(parsed.signer.program, "c2patool");
    }
}
