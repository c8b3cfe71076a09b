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

//! # N0N4
//!
//! Provenance stamping for files: a user declares how much AI was involved
//! in producing a file, the declaration is attached as a C2PA manifest (or,
//! when real signing is unavailable, as an appended in-band record), and the
//! claim can later be recovered and verified.
//!
//! The crate is organised leaf to root:
//!
//! - [`certs`] makes sure a signing certificate and key exist on disk
//! - [`provenance`] holds the manifest model and the stamp vocabulary
//! - [`signing`] embeds manifests through an external tool or the `c2pa` crate
//! - [`codec`] is the in-band fallback carrier
//! - [`verification`] recovers claims through a layered strategy
//! - [`jobs`] and [`storage`] are the backlog and object storage collaborators
//! - [`runner`] drains the backlog one job at a time
//! - [`runtime`] wires everything together from [`config`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use n0n4::config::ConfigLoader;
//! use n0n4::runtime::Pipeline;
//!
//! let config = ConfigLoader::new().load_config(None)?;
//! let pipeline = Pipeline::from_config(&config).await?;
//! let report = pipeline.runner.run_batch().await?;
//! println!("processed {} jobs", report.processed());
//! ```

pub mod audit;
pub mod certs;
pub mod codec;
pub mod config;
pub mod jobs;
pub mod provenance;
pub mod runner;
pub mod runtime;
pub mod signing;
pub mod storage;
pub mod verification;

pub use certs::{CertificateBundle, CertificateCache, CertificateProvisioner, ProvisionError};
pub use codec::{embed, extract, extract_value, CodecError, MANIFEST_SEPARATOR};
pub use jobs::{JobStatus, JobStore, JobStoreError, SigningJob};
pub use provenance::{AiLevel, ProvenanceManifest, StampMetadata};
pub use runner::{BatchReport, JobRunner, RunnerConfig, RunnerError};
pub use signing::{ProvenanceSigner, Protector, SignError, SignOutcome};
pub use storage::{ObjectStore, StorageError};
pub use verification::{Verifier, VerifiedProvenance};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`; when neither is given the
/// filter defaults to `info`. Calling this more than once is harmless, later
/// calls are ignored.
pub fn init_logging(level: Option<&str>, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
