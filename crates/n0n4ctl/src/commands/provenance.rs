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

use crate::cli::{OutputFormat, StampArgs};
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use n0n4::codec;
use n0n4::config::N0n4Config;
use n0n4::provenance::{ProvenanceManifest, StampMetadata};
use n0n4::runtime::{build_certificate_cache, build_protector, build_verifier};
use n0n4::SignOutcome;
use serde_json::Value;
use std::path::Path;

/// The metadata a command should record, from raw JSON or a declaration.
pub fn stamp_metadata(args: &StampArgs) -> Result<Value> {
    if let Some(raw) = &args.metadata {
        let value: Value = serde_json::from_str(raw).context("--metadata is not valid JSON")?;
        if !value.is_object() {
            return Err(anyhow!("--metadata must be a JSON object"));
        }
        return Ok(value);
    }

    let author = args
        .author
        .clone()
        .ok_or_else(|| anyhow!("--author is required without --metadata"))?;
    let mut stamp = StampMetadata::declare(
        author,
        args.ai_level()?,
        args.style.into(),
        args.lang.into(),
    );
    if let Some(key) = &args.key {
        stamp = stamp.with_key(key.clone());
    }
    Ok(serde_json::to_value(stamp)?)
}

pub async fn provision(config: &N0n4Config) -> Result<()> {
    let cache = build_certificate_cache(config);
    let bundle = cache
        .get_or_provision()
        .await
        .context("Certificate provisioning failed")?;

    println!("{} Certificates ready", "✓".green().bold());
    println!("  certificate: {}", bundle.cert_path.display().to_string().cyan());
    println!("  key:         {}", bundle.key_path.display().to_string().cyan());
    match bundle.fingerprint() {
        Ok(fp) => println!("  sha256:      {}", fp),
        Err(e) => println!("  {} {}", "⚠".yellow().bold(), e.to_string().yellow()),
    }
    Ok(())
}

pub async fn sign(
    config: &N0n4Config,
    input: &Path,
    output: &Path,
    args: &StampArgs,
) -> Result<()> {
    let metadata = stamp_metadata(args)?;
    let bundle = build_certificate_cache(config)
        .get_or_provision()
        .await
        .context("Certificate provisioning failed")?;
    let protector = build_protector(config)?;

    let outcome = protector
        .protect(input, output, &bundle, &ProvenanceManifest::created(metadata))
        .await
        .with_context(|| format!("Failed to sign {}", input.display()))?;

    match &outcome {
        SignOutcome::Signed { diagnostics } => {
            println!(
                "{} Signed {}",
                "✓".green().bold(),
                output.display().to_string().cyan()
            );
            if let Some(text) = diagnostics {
                println!("  {}", text.yellow());
            }
        }
        SignOutcome::SimulatedCopy => println!(
            "{} {} is an unsigned copy, {} was not found",
            "⚠".yellow().bold(),
            output.display().to_string().cyan(),
            config.signer.program
        ),
        SignOutcome::Embedded => println!(
            "{} Signing failed, metadata embedded in-band in {}",
            "⚠".yellow().bold(),
            output.display().to_string().cyan()
        ),
    }
    Ok(())
}

pub async fn embed(input: &Path, output: &Path, args: &StampArgs) -> Result<()> {
    let metadata = stamp_metadata(args)?;
    codec::embed_file(input, output, &metadata)
        .await
        .with_context(|| format!("Failed to embed metadata into {}", output.display()))?;

    println!(
        "{} Embedded metadata in {}",
        "✓".green().bold(),
        output.display().to_string().cyan()
    );
    Ok(())
}

pub async fn extract(file: &Path, format: OutputFormat) -> Result<()> {
    let found = codec::extract_file(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    match (found, format) {
        (Some(metadata), OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&metadata)?)
        }
        (Some(metadata), OutputFormat::Human) => {
            println!("{} In-band metadata found", "✓".green().bold());
            print_metadata(&metadata);
        }
        (None, OutputFormat::Json) => println!("null"),
        (None, OutputFormat::Human) => {
            println!("{} No in-band metadata found", "✗".red().bold())
        }
    }
    Ok(())
}

pub async fn verify(config: &N0n4Config, file: &Path, format: OutputFormat) -> Result<()> {
    if !file.is_file() {
        return Err(anyhow!("{} is not a file", file.display()));
    }
    let verifier = build_verifier(config)?;
    let result = verifier.verify(file).await;

    match (result, format) {
        (Some(verified), OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&verified)?)
        }
        (Some(verified), OutputFormat::Human) => {
            println!(
                "{} Provenance verified ({})",
                "✓".green().bold(),
                verified.source.as_str().cyan()
            );
            print_metadata(&verified.metadata);
        }
        (None, OutputFormat::Json) => println!("null"),
        (None, OutputFormat::Human) => {
            println!("{} No verifiable metadata found", "✗".red().bold())
        }
    }
    Ok(())
}

fn print_metadata(metadata: &Value) {
    match serde_json::from_value::<StampMetadata>(metadata.clone()) {
        Ok(stamp) => {
            println!("  author:    {}", stamp.author);
            println!("  level:     {} ({})", stamp.level, stamp.level_label);
            println!("  stamp:     {} / {:?}", stamp.stamp_style, stamp.stamp_language);
            println!("  timestamp: {}", stamp.timestamp);
        }
        Err(_) => {
            if let Some(fields) = metadata.as_object() {
                for (key, value) in fields {
                    println!("  {}: {}", key, value);
                }
            } else {
                println!("  {}", metadata);
            }
        }
    }
}
