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

use anyhow::{Context, Result};
use clap::Parser;
use n0n4::config::{ConfigLoader, Validate};
use n0n4::runtime::Pipeline;
use n0n4::signing::tool_version;
use n0n4_worker::{router, shutdown_signal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "n0n4-worker",
    version,
    about = "Runs pending signing jobs when triggered over HTTP"
)]
struct Args {
    /// Configuration file (defaults to N0N4_CONFIG or the search paths)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overrides server.bind_address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::new()
        .load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    n0n4::init_logging(Some(&config.server.log_level), config.server.log_json);
    config.validate().context("Invalid configuration")?;

    if config.signer.backend == n0n4::config::SignerBackend::Tool {
        match tool_version(&config.signer.program).await {
            Some(version) => info!(program = %config.signer.program, %version, "Signing tool found"),
            None => warn!(
                program = %config.signer.program,
                "Signing tool not found, outputs will be unsigned copies"
            ),
        }
    }

    let pipeline = Pipeline::from_config(&config)
        .await
        .context("Failed to assemble pipeline")?;

    match pipeline.certificates.get_or_provision().await {
        Ok(bundle) => info!(cert = %bundle.cert_path.display(), "Certificates ready"),
        Err(e) => warn!(error = %e, "Certificate provisioning failed, will retry on the next batch"),
    }

    if config.runner.run_on_start {
        let runner = Arc::clone(&pipeline.runner);
        tokio::spawn(async move {
            match runner.run_batch().await {
                Ok(report) => info!(processed = report.processed(), "Initial batch finished"),
                Err(e) => warn!(error = %e, "Initial batch failed"),
            }
        });
    }

    let bind = args.bind.unwrap_or_else(|| config.server.bind_address.clone());
    let addr = format!("{}:{}", bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Worker listening");

    axum::serve(listener, router(pipeline.runner))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Worker stopped");
    Ok(())
}
