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
use colored::Colorize;
use n0n4::config::N0n4Config;
use n0n4::runtime::{build_job_store, Pipeline};

pub async fn enqueue(config: &N0n4Config, key: &str, email: &str) -> Result<()> {
    let store = build_job_store(config).await?;
    let job = store
        .enqueue(key, email)
        .await
        .with_context(|| format!("Failed to queue a job for '{}'", key))?;

    println!(
        "{} Queued job {} for {}",
        "✓".green().bold(),
        job.id.cyan(),
        job.input_path
    );
    Ok(())
}

pub async fn run_batch(config: &N0n4Config) -> Result<()> {
    let pipeline = Pipeline::from_config(config)
        .await
        .context("Failed to assemble pipeline")?;
    let report = pipeline.runner.run_batch().await.context("Batch failed")?;

    println!(
        "{} Processed {} of {} fetched jobs",
        "✓".green().bold(),
        report.processed(),
        report.fetched
    );
    println!(
        "  completed: {} (signed {}, simulated {}, embedded {})",
        report.completed.to_string().green(),
        report.signed,
        report.simulated,
        report.embedded
    );
    println!("  failed:    {}", report.failed.to_string().red());
    if report.skipped > 0 {
        println!("  skipped:   {}", report.skipped.to_string().yellow());
    }
    Ok(())
}
