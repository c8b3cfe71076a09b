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

use crate::config::{ConfigError, DatabaseBackend, N0n4Config};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "N0N4_CONFIG";

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from("./n0n4.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("n0n4").join("config.toml"));
        }

        search_paths.push(PathBuf::from("/etc/n0n4/config.toml"));

        Self { search_paths }
    }

    /// Create a config loader with custom search paths
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Load configuration from the given file, `N0N4_CONFIG`, or the first
    /// search path that exists, then apply deployment environment overrides.
    ///
    /// With no file anywhere the built-in defaults are used. An explicit
    /// path that does not exist is an error.
    pub fn load_config(&self, config_file: Option<&Path>) -> Result<N0n4Config, ConfigError> {
        let explicit = config_file
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) if !path.is_file() => return Err(ConfigError::ConfigNotFound(path)),
            Some(path) => self.load_config_from_file(&path)?,
            None => match self.find_config_file() {
                Some(path) => self.load_config_from_file(&path)?,
                None => {
                    debug!("No configuration file found, using defaults");
                    N0n4Config::default()
                }
            },
        };

        apply_env_overrides(&mut config, |name| env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_config_from_file(&self, path: &Path) -> Result<N0n4Config, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let substituted_content = self.substitute_env_vars(&content)?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") | None => toml::from_str::<N0n4Config>(&substituted_content)?,
            Some(ext) => {
                return Err(ConfigError::UnsupportedFormat {
                    extension: ext.to_string(),
                })
            }
        };

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Find the first existing configuration file in search paths
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .find(|path| path.is_file())
            .cloned()
    }

    fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        expand_vars(content, |name| env::var(name).ok())
    }

    /// Get all search paths for debugging
    pub fn get_search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands `${VAR}`, `${VAR:-default}` and `${VAR:?message}` references.
///
/// A bare or `:?` reference to an unset variable is an error; the first one
/// encountered is reported.
pub fn expand_vars<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::EnvSubstitutionError(e.to_string()))?;

    let mut failure = None;
    let expanded = pattern.replace_all(content, |caps: &regex::Captures<'_>| {
        let (name, value) = match caps[1].split_once(":-") {
            Some((name, fallback)) => {
                let value = lookup(name).unwrap_or_else(|| fallback.to_string());
                (name, Some(value))
            }
            None => match caps[1].split_once(":?") {
                Some((name, hint)) => {
                    let value = lookup(name);
                    if value.is_none() && failure.is_none() {
                        failure = Some(format!("{} is unset: {}", name, hint));
                    }
                    (name, value)
                }
                None => (&caps[1], lookup(&caps[1])),
            },
        };
        value.unwrap_or_else(|| {
            if failure.is_none() {
                failure = Some(format!("{} is unset", name));
            }
            String::new()
        })
    });

    match failure {
        Some(message) => Err(ConfigError::EnvSubstitutionError(message)),
        None => Ok(expanded.into_owned()),
    }
}

/// Applies the deployment variables on top of a parsed configuration.
///
/// PEM material is only taken from here, never from `${VAR}` substitution.
/// The first non-blank variable of each alias group wins; values are trimmed.
pub fn apply_env_overrides<F>(config: &mut N0n4Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let first = |names: &[&str]| {
        names
            .iter()
            .filter_map(|name| lookup(*name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    };

    if let Some(cert) = first(&["C2PA_CERTIFICATE"]) {
        config.certificates.certificate_pem = Some(cert);
    }
    if let Some(key) = first(&["C2PA_PRIVATE_KEY"]) {
        config.certificates.private_key_pem = Some(key);
    }

    if let Some(url) = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
        if config.database.backend == DatabaseBackend::Postgrest {
            config.database.url = Some(url.clone());
        }
        config.storage.url = Some(url);
    }
    if let Some(key) = first(&["SUPABASE_SERVICE_ROLE_KEY", "SUPABASE_SERVICE_KEY"]) {
        if config.database.backend == DatabaseBackend::Postgrest {
            config.database.service_key = Some(key.clone());
        }
        config.storage.service_key = Some(key);
    }
    if let Some(bucket) = first(&["STORAGE_BUCKET", "R2_BUCKET_NAME"]) {
        config.storage.bucket = bucket;
    }

    if let Some(port) = first(&["PORT"]) {
        config.server.port = port.parse().map_err(|_| ConfigError::InvalidEnvValue {
            name: "PORT".to_string(),
            value: port,
        })?;
    }

    Ok(())
}
