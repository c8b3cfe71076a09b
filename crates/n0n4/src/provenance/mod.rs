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

//! Provenance manifest model.
//!
//! This module provides:
//! - [`ProvenanceManifest`], the claim embedded into a signed file
//! - [`Assertion`], a labelled entry of a manifest
//! - The stamp vocabulary ([`AiLevel`], [`StampMetadata`], ...) carried as
//!   application metadata

mod stamp;

pub use stamp::{
    stamp_asset_path, AiLevel, InvalidLevel, StampFormat, StampLanguage, StampMetadata, StampStyle,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claim generator recorded in every manifest this crate produces.
pub const CLAIM_GENERATOR: &str = "N0N4_Stamp/1.0";

/// Label of the standard C2PA actions assertion.
pub const ACTIONS_LABEL: &str = "c2pa.actions";

/// Label of the application metadata assertion.
pub const METADATA_LABEL: &str = "n0n4.metadata";

/// Action recorded for freshly stamped files.
pub const CREATED_ACTION: &str = "c2pa.created";

/// A single labelled assertion of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub label: String,
    pub data: Value,
}

/// The manifest definition handed to a signer.
///
/// A manifest is built fresh for every signing attempt and is not persisted
/// once it has been embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceManifest {
    pub claim_generator: String,
    pub assertions: Vec<Assertion>,
}

impl ProvenanceManifest {
    /// Builds the two-entry manifest: a `c2pa.created` action record and the
    /// application metadata record carrying `metadata`.
    pub fn created(metadata: Value) -> Self {
        Self {
            claim_generator: CLAIM_GENERATOR.to_string(),
            assertions: vec![
                Assertion {
                    label: ACTIONS_LABEL.to_string(),
                    data: serde_json::json!({
                        "actions": [{ "action": CREATED_ACTION }]
                    }),
                },
                Assertion {
                    label: METADATA_LABEL.to_string(),
                    data: metadata,
                },
            ],
        }
    }

    /// Builds a manifest from typed stamp metadata.
    pub fn for_stamp(stamp: &StampMetadata) -> Result<Self, serde_json::Error> {
        Ok(Self::created(serde_json::to_value(stamp)?))
    }

    /// Returns the first assertion with the given label.
    pub fn find_assertion(&self, label: &str) -> Option<&Assertion> {
        self.assertions.iter().find(|a| a.label == label)
    }

    /// The application metadata payload, if present.
    pub fn application_metadata(&self) -> Option<&Value> {
        self.find_assertion(METADATA_LABEL).map(|a| &a.data)
    }

    /// Serializes the manifest definition to compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
