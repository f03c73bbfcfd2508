//! Offline scoring of a saved ingredient set and protocol

use galley_fusion::{ConfidenceBreakdown, ConfidenceFusion, FusionParams, MemoryBias};
use galley_model::{Ingredient, Protocol, ProtocolDraft};
use serde::Deserialize;
use std::path::Path;

/// `{ingredients, protocol, memory?}` document
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreInput {
    /// Perceived ingredients
    pub ingredients: Vec<Ingredient>,
    /// Protocol content
    pub protocol: ProtocolDraft,
    /// Prior confirmations by name
    #[serde(default)]
    pub memory: MemoryBias,
}

impl ScoreInput {
    /// Parse a JSON document
    ///
    /// # Errors
    /// Fails when the document does not match the schema.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read and parse a JSON file
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Composite confidence and its terms
    #[must_use]
    pub fn score(&self, params: FusionParams) -> ConfidenceBreakdown {
        let protocol = Protocol::remote(self.protocol.clone());
        ConfidenceFusion::new(params).breakdown(&self.ingredients, &protocol, &self.memory)
    }
}
