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

mod config;
mod jobs;
mod provenance;

pub use config::redacted;
pub use provenance::stamp_metadata;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result};
use n0n4::config::{ConfigLoader, N0n4Config};
use std::path::Path;

pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Provision => provenance::provision(&load(config_path)?).await,
        Commands::Sign {
            input,
            output,
            stamp,
        } => provenance::sign(&load(config_path)?, &input, &output, &stamp).await,
        Commands::Embed {
            input,
            output,
            stamp,
        } => provenance::embed(&input, &output, &stamp).await,
        Commands::Extract { file, format } => provenance::extract(&file, format).await,
        Commands::Verify { file, format } => {
            provenance::verify(&load(config_path)?, &file, format).await
        }
        Commands::Enqueue { key, email } => jobs::enqueue(&load(config_path)?, &key, &email).await,
        Commands::RunBatch => jobs::run_batch(&load(config_path)?).await,
        Commands::Config(command) => config::handle_config_command(command, config_path),
    }
}

fn load(path: Option<&Path>) -> Result<N0n4Config> {
    ConfigLoader::new()
        .load_config(path)
        .context("Failed to load configuration")
}
