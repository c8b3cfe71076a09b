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

use clap::{Parser, Subcommand, ValueEnum};
use n0n4::provenance::{AiLevel, StampLanguage, StampStyle};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "n0n4ctl",
    version,
    about = "Command-line interface for N0N4 provenance stamping",
    long_about = "Provision signing certificates, stamp files with provenance manifests, \
                  verify stamped files and drive the signing job backlog"
)]
pub struct Cli {
    /// Configuration file (defaults to N0N4_CONFIG or the search paths)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make sure a signing certificate and key exist
    Provision,

    /// Sign a file with a provenance manifest
    Sign {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        stamp: StampArgs,
    },

    /// Append provenance metadata in-band, without signing
    Embed {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        stamp: StampArgs,
    },

    /// Print metadata appended in-band to a file
    Extract {
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Recover and check the provenance of a file
    Verify {
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Queue a signing job for an object in storage
    Enqueue {
        /// Object key of the file to sign
        key: String,

        /// Requesting user, recorded as the manifest author
        #[arg(long)]
        email: String,
    },

    /// Process one batch of pending jobs
    RunBatch,

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write the default configuration to a file
    Generate {
        /// Output path
        #[arg(short, long, default_value = "n0n4.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the resolved configuration with secrets masked
    Show,
    /// Check the resolved configuration
    Validate,
}

/// What to declare about a file.
#[derive(clap::Args, Debug, Clone)]
pub struct StampArgs {
    /// Author of the declaration
    #[arg(long, required_unless_present = "metadata")]
    pub author: Option<String>,

    /// Degree of AI involvement, 0 (none) to 4 (synthetic)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub level: u8,

    /// Stamp design
    #[arg(long, value_enum, default_value_t = StyleArg::A)]
    pub style: StyleArg,

    /// Stamp language
    #[arg(long, value_enum, default_value_t = LanguageArg::Es)]
    pub lang: LanguageArg,

    /// Opaque key stored with the declaration
    #[arg(long)]
    pub key: Option<String>,

    /// Raw JSON metadata instead of a stamp declaration
    #[arg(long, conflicts_with_all = ["author", "key"])]
    pub metadata: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleArg {
    A,
    B,
    C,
}

impl From<StyleArg> for StampStyle {
    fn from(value: StyleArg) -> Self {
        match value {
            StyleArg::A => StampStyle::A,
            StyleArg::B => StampStyle::B,
            StyleArg::C => StampStyle::C,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageArg {
    Es,
    En,
}

impl From<LanguageArg> for StampLanguage {
    fn from(value: LanguageArg) -> Self {
        match value {
            LanguageArg::Es => StampLanguage::Es,
            LanguageArg::En => StampLanguage::En,
        }
    }
}

impl StampArgs {
    pub fn ai_level(&self) -> Result<AiLevel, n0n4::provenance::InvalidLevel> {
        AiLevel::try_from(self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sign_arguments() {
        let cli = Cli::try_parse_from([
            "n0n4ctl", "sign", "in.jpg", "out.jpg", "--author", "ana", "--level", "3", "--lang",
            "en",
        ])
        .unwrap();
        match cli.command {
            Commands::Sign { stamp, .. } => {
                assert_eq!(stamp.author.as_deref(), Some("ana"));
                assert_eq!(stamp.ai_level().unwrap(), AiLevel::Predominant);
                assert_eq!(StampLanguage::from(stamp.lang), StampLanguage::En);
                assert_eq!(StampStyle::from(stamp.style), StampStyle::A);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_level_out_of_range() {
        let result = Cli::try_parse_from([
            "n0n4ctl", "embed", "in.jpg", "out.jpg", "--author", "ana", "--level", "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_author_or_metadata_required() {
        assert!(Cli::try_parse_from(["n0n4ctl", "embed", "in.jpg", "out.jpg"]).is_err());
        assert!(Cli::try_parse_from([
            "n0n4ctl", "embed", "in.jpg", "out.jpg", "--metadata", "{\"a\":1}"
        ])
        .is_ok());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["n0n4ctl", "run-batch", "--config", "x.toml", "-v"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::RunBatch));
    }
}
