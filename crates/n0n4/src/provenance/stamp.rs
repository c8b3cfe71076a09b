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

//! Stamp vocabulary: declared AI-involvement levels and stamp presentation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Author recorded when an external manifest carries no claim generator.
const UNKNOWN_GENERATOR: &str = "Third Party Tool";

/// Level label used for manifests produced by third-party tools.
const EXTERNAL_LEVEL_LABEL: &str = "C2PA Validated";

#[derive(Debug, Error)]
#[error("Invalid AI involvement level: {0} (must be 0-4)")]
pub struct InvalidLevel(pub u8);

/// Declared degree of AI involvement, `N0` (none) through `N4` (synthetic).
///
/// Serialized as its numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AiLevel {
    NoAi,
    AiScript,
    CoAuthor,
    Predominant,
    Synthetic,
}

impl AiLevel {
    pub const ALL: [AiLevel; 5] = [
        AiLevel::NoAi,
        AiLevel::AiScript,
        AiLevel::CoAuthor,
        AiLevel::Predominant,
        AiLevel::Synthetic,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn label(self, lang: StampLanguage) -> &'static str {
        match (self, lang) {
            (AiLevel::NoAi, StampLanguage::Es) => "Sin IA",
            (AiLevel::NoAi, StampLanguage::En) => "No AI",
            (AiLevel::AiScript, StampLanguage::Es) => "Guión IA",
            (AiLevel::AiScript, StampLanguage::En) => "AI Script",
            (AiLevel::CoAuthor, StampLanguage::Es) => "Coautor",
            (AiLevel::CoAuthor, StampLanguage::En) => "Co-author",
            (AiLevel::Predominant, StampLanguage::Es) => "Predominante",
            (AiLevel::Predominant, StampLanguage::En) => "Predominant",
            (AiLevel::Synthetic, StampLanguage::Es) => "Sintético",
            (AiLevel::Synthetic, StampLanguage::En) => "Synthetic",
        }
    }

    pub fn description(self, lang: StampLanguage) -> &'static str {
        match (self, lang) {
            (AiLevel::NoAi, StampLanguage::Es) => "Contenido 100% humano.",
            (AiLevel::NoAi, StampLanguage::En) => "100% human content.",
            (AiLevel::AiScript, StampLanguage::Es) => "IA usada para ideación o estructura.",
            (AiLevel::AiScript, StampLanguage::En) => "AI used for ideation or structure.",
            (AiLevel::CoAuthor, StampLanguage::Es) => "Colaboración equitativa Humano-IA.",
            (AiLevel::CoAuthor, StampLanguage::En) => "Equal Human-AI collaboration.",
            (AiLevel::Predominant, StampLanguage::Es) => "Mayoría generado por IA.",
            (AiLevel::Predominant, StampLanguage::En) => "Mostly AI generated.",
            (AiLevel::Synthetic, StampLanguage::Es) => "Generado 100% por IA.",
            (AiLevel::Synthetic, StampLanguage::En) => "100% AI generated.",
        }
    }
}

impl TryFrom<u8> for AiLevel {
    type Error = InvalidLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        AiLevel::ALL
            .get(value as usize)
            .copied()
            .ok_or(InvalidLevel(value))
    }
}

impl From<AiLevel> for u8 {
    fn from(level: AiLevel) -> Self {
        level.value()
    }
}

impl fmt::Display for AiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StampStyle {
    A,
    B,
    C,
}

impl fmt::Display for StampStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StampStyle::A => "A",
            StampStyle::B => "B",
            StampStyle::C => "C",
        };
        f.write_str(s)
    }
}

/// Stamps are only distributed as SVG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StampFormat {
    #[default]
    #[serde(rename = "SVG")]
    Svg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StampLanguage {
    Es,
    En,
}

/// Application metadata recorded under the `n0n4.metadata` assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampMetadata {
    pub author: String,
    pub level: AiLevel,
    pub level_label: String,
    pub stamp_style: StampStyle,
    pub stamp_format: StampFormat,
    pub stamp_language: StampLanguage,
    pub timestamp: String,
    #[serde(rename = "c2pa_key", default, skip_serializing_if = "Option::is_none")]
    pub c2pa_key: Option<String>,
}

impl StampMetadata {
    /// A fresh declaration stamped with the current time.
    pub fn declare(
        author: impl Into<String>,
        level: AiLevel,
        style: StampStyle,
        lang: StampLanguage,
    ) -> Self {
        Self {
            author: author.into(),
            level,
            level_label: level.label(lang).to_string(),
            stamp_style: style,
            stamp_format: StampFormat::Svg,
            stamp_language: lang,
            timestamp: chrono::Utc::now().to_rfc3339(),
            c2pa_key: None,
        }
    }

    /// Attaches the opaque per-file key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.c2pa_key = Some(key.into());
        self
    }

    /// The reduced response for a valid manifest written by another tool.
    pub fn external(generator: Option<&str>, timestamp: impl Into<String>) -> Self {
        Self {
            author: generator
                .filter(|g| !g.is_empty())
                .unwrap_or(UNKNOWN_GENERATOR)
                .to_string(),
            level: AiLevel::CoAuthor,
            level_label: EXTERNAL_LEVEL_LABEL.to_string(),
            stamp_style: StampStyle::A,
            stamp_format: StampFormat::Svg,
            stamp_language: StampLanguage::En,
            timestamp: timestamp.into(),
            c2pa_key: None,
        }
    }
}

/// Public path of the SVG stamp for a level, style and language.
pub fn stamp_asset_path(level: AiLevel, style: StampStyle, lang: StampLanguage) -> String {
    match lang {
        StampLanguage::Es => format!(
            "/stamps/0 SVG_es/sello_option{}_N{}_es.svg",
            style,
            level.value()
        ),
        StampLanguage::En => format!(
            "/stamps/0 SVG_en/option{}_level{}.svg",
            style,
            level.value()
        ),
    }
}
