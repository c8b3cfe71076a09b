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

//! Composition root: builds every collaborator from an [`N0n4Config`].

use crate::certs::{CertificateCache, CertificateProvisioner};
use crate::config::{DatabaseBackend, N0n4Config, SignerBackend, StorageBackend};
use crate::jobs::{JobStore, JobStoreError, MemoryJobStore, PostgrestJobStore};
use crate::runner::JobRunner;
use crate::signing::{Protector, ProvenanceSigner, ToolSigner};
use crate::storage::{LocalObjectStore, ObjectStore, StorageError, SupabaseObjectStore};
use crate::verification::{ManifestReader, ToolManifestReader, Verifier};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Backend '{0}' is not compiled into this build")]
    BackendUnavailable(String),

    #[error("Job store error: {0}")]
    Jobs(#[from] JobStoreError),

    #[error("Object storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The assembled pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub runner: Arc<JobRunner>,
    pub verifier: Arc<Verifier>,
    pub certificates: Arc<CertificateCache>,
}

impl Pipeline {
    pub async fn from_config(config: &N0n4Config) -> Result<Self, PipelineError> {
        let jobs = build_job_store(config).await?;
        let objects = build_object_store(config)?;
        let protector = build_protector(config)?;
        let certificates = Arc::new(build_certificate_cache(config));
        let verifier = Arc::new(build_verifier(config)?);

        info!(
            jobs = jobs.name(),
            storage = objects.name(),
            signer = protector.signer_name(),
            "Pipeline assembled"
        );

        let runner = JobRunner::new(
            jobs,
            objects,
            protector,
            Arc::clone(&certificates),
            config.runner.to_runner_config(),
        );

        Ok(Self {
            runner: Arc::new(runner),
            verifier,
            certificates,
        })
    }
}

pub fn build_certificate_cache(config: &N0n4Config) -> CertificateCache {
    CertificateCache::new(CertificateProvisioner::new(
        config.certificates.to_provisioner_config(),
    ))
}

pub fn build_signer(config: &N0n4Config) -> Result<Arc<dyn ProvenanceSigner>, PipelineError> {
    let settings = &config.signer;
    match settings.backend {
        SignerBackend::Tool => {
            let mut signer = ToolSigner::new(settings.program.clone())
                .with_timeout(Duration::from_secs(settings.timeout_secs));
            if let Some(dir) = &settings.temp_dir {
                signer = signer.with_temp_dir(dir.clone());
            }
            Ok(Arc::new(signer))
        }
        #[cfg(feature = "c2pa")]
        SignerBackend::Native => {
            let mut signer = crate::signing::NativeSigner::new();
            if let Some(url) = &settings.tsa_url {
                signer = signer.with_tsa_url(url.clone());
            }
            Ok(Arc::new(signer))
        }
        #[cfg(not(feature = "c2pa"))]
        SignerBackend::Native => Err(PipelineError::BackendUnavailable("native signer".into())),
    }
}

pub fn build_protector(config: &N0n4Config) -> Result<Protector, PipelineError> {
    Ok(Protector::new(build_signer(config)?)
        .with_inband_fallback(config.signer.inband_fallback)
        .with_allow_simulated(config.signer.allow_simulated))
}

pub fn build_verifier(config: &N0n4Config) -> Result<Verifier, PipelineError> {
    let settings = &config.verifier;
    let reader: Arc<dyn ManifestReader> = match settings.backend {
        SignerBackend::Tool => Arc::new(
            ToolManifestReader::new(settings.program.clone())
                .with_timeout(Duration::from_secs(settings.timeout_secs)),
        ),
        #[cfg(feature = "c2pa")]
        SignerBackend::Native => Arc::new(crate::verification::NativeManifestReader::new()),
        #[cfg(not(feature = "c2pa"))]
        SignerBackend::Native => {
            return Err(PipelineError::BackendUnavailable("native reader".into()))
        }
    };

    let verifier = Verifier::new(reader);
    Ok(match &settings.scratch_dir {
        Some(dir) => verifier.with_scratch_dir(dir.clone()),
        None => verifier,
    })
}

pub async fn build_job_store(config: &N0n4Config) -> Result<Arc<dyn JobStore>, PipelineError> {
    let settings = &config.database;
    match settings.backend {
        DatabaseBackend::Postgrest => {
            let url = settings
                .url
                .as_deref()
                .ok_or(PipelineError::MissingSetting("database.url"))?;
            let key = settings
                .service_key
                .clone()
                .ok_or(PipelineError::MissingSetting("database.service_key"))?;
            Ok(Arc::new(PostgrestJobStore::with_table(
                url,
                key,
                &settings.table,
                Duration::from_secs(settings.timeout_secs),
            )?))
        }
        #[cfg(feature = "sqlite")]
        DatabaseBackend::Sqlite => {
            let url = settings
                .url
                .as_deref()
                .ok_or(PipelineError::MissingSetting("database.url"))?;
            Ok(Arc::new(crate::jobs::SqliteJobStore::connect(url).await?))
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseBackend::Sqlite => Err(PipelineError::BackendUnavailable("sqlite".into())),
        DatabaseBackend::Memory => Ok(Arc::new(MemoryJobStore::new())),
    }
}

pub fn build_object_store(config: &N0n4Config) -> Result<Arc<dyn ObjectStore>, PipelineError> {
    let settings = &config.storage;
    match settings.backend {
        StorageBackend::Supabase => {
            let url = settings
                .url
                .as_deref()
                .ok_or(PipelineError::MissingSetting("storage.url"))?;
            let key = settings
                .service_key
                .clone()
                .ok_or(PipelineError::MissingSetting("storage.service_key"))?;
            Ok(Arc::new(SupabaseObjectStore::new(
                url,
                key,
                settings.bucket.clone(),
                Duration::from_secs(settings.timeout_secs),
            )?))
        }
        StorageBackend::Local => Ok(Arc::new(LocalObjectStore::new(settings.local_root.clone()))),
    }
}
