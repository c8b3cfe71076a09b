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

use crate::cli::ConfigCommands;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use n0n4::config::{generate_default_config_toml, N0n4Config, Validate};
use std::fs;
use std::path::{Path, PathBuf};

const MASK: &str = "********";

pub fn handle_config_command(command: ConfigCommands, config_path: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommands::Generate { output, force } => generate_config(output, force),
        ConfigCommands::Validate => validate_config(&super::load(config_path)?),
        ConfigCommands::Show => show_config(&super::load(config_path)?),
    }
}

fn generate_config(target: PathBuf, force: bool) -> Result<()> {
    if target.exists() && !force {
        bail!(
            "{} already exists, pass --force to replace it",
            target.display()
        );
    }

    let rendered = generate_default_config_toml().context("Failed to render defaults")?;
    fs::write(&target, rendered)
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!(
        "{} Wrote default configuration to {}",
        "✓".green().bold(),
        target.display().to_string().cyan()
    );
    Ok(())
}

fn validate_config(config: &N0n4Config) -> Result<()> {
    if let Err(problem) = config.validate() {
        eprintln!("{} Invalid configuration", "✗".red().bold());
        eprintln!("  {}", problem.to_string().red());
        std::process::exit(1);
    }
    println!("{} Configuration is deployable", "✓".green().bold());
    Ok(())
}

fn show_config(config: &N0n4Config) -> Result<()> {
    if let Err(problem) = config.validate() {
        eprintln!("{} {}", "⚠".yellow().bold(), problem.to_string().yellow());
    }
    let rendered =
        toml::to_string_pretty(&redacted(config.clone())).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

/// Masks key material and service credentials.
pub fn redacted(mut config: N0n4Config) -> N0n4Config {
    for secret in [
        &mut config.certificates.certificate_pem,
        &mut config.certificates.private_key_pem,
        &mut config.storage.service_key,
        &mut config.database.service_key,
    ] {
        if secret.is_some() {
            *secret = Some(MASK.to_string());
        }
    }
    config
}
