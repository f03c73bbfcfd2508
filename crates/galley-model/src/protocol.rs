//! Protocols (synthesized recipes)
//!
//! Collaborators produce a [`ProtocolDraft`]; only the orchestration layer
//! turns a draft into a [`Protocol`] and stamps its [`Provenance`]. The
//! provenance field is private and `Protocol` is serialize-only, so a
//! collaborator cannot claim a remote origin for offline output.

use crate::ids::ProtocolId;
use crate::ingredient::name_key;
use serde::{Deserialize, Serialize};

/// Which path produced a protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Produced by the remote intelligence service
    Remote,
    /// Produced by the local offline synthesizer
    Offline,
}

/// Unstamped protocol content returned by a synthesizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolDraft {
    /// Title
    pub title: String,
    /// Ordered instruction steps
    pub instructions: Vec<String>,
    /// Ingredient names the protocol references
    pub ingredients_used: Vec<String>,
    /// Sources cited by the synthesizer
    pub grounding_sources: Vec<String>,
}

impl ProtocolDraft {
    /// Create a draft with a title
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Append an instruction step
    #[inline]
    #[must_use]
    pub fn step(mut self, instruction: impl Into<String>) -> Self {
        self.instructions.push(instruction.into());
        self
    }

    /// Append a referenced ingredient
    #[inline]
    #[must_use]
    pub fn uses(mut self, ingredient: impl Into<String>) -> Self {
        self.ingredients_used.push(ingredient.into());
        self
    }

    /// Append a grounding source
    #[inline]
    #[must_use]
    pub fn cites(mut self, source: impl Into<String>) -> Self {
        self.grounding_sources.push(source.into());
        self
    }
}

/// A synthesized protocol with authoritative provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Protocol {
    /// Identifier
    pub id: ProtocolId,
    /// Title
    pub title: String,
    /// Ordered instruction steps
    pub instructions: Vec<String>,
    /// Ingredient names the protocol references
    pub ingredients_used: Vec<String>,
    /// Sources cited by the synthesizer
    pub grounding_sources: Vec<String>,
    provenance: Provenance,
}

impl Protocol {
    /// Stamp a draft produced by the remote service
    #[must_use]
    pub fn remote(draft: ProtocolDraft) -> Self {
        Self::stamp(draft, Provenance::Remote)
    }

    /// Stamp a draft produced by the offline synthesizer
    #[must_use]
    pub fn offline(draft: ProtocolDraft) -> Self {
        Self::stamp(draft, Provenance::Offline)
    }

    fn stamp(draft: ProtocolDraft, provenance: Provenance) -> Self {
        Self {
            id: ProtocolId::new(),
            title: draft.title,
            instructions: draft.instructions,
            ingredients_used: draft.ingredients_used,
            grounding_sources: draft.grounding_sources,
            provenance,
        }
    }

    /// Which path produced this protocol
    #[inline]
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Whether the offline synthesizer produced this protocol
    #[inline]
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.provenance == Provenance::Offline
    }

    /// Normalized keys of referenced ingredients (duplicates removed, order kept)
    #[must_use]
    pub fn referenced_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.ingredients_used.len());
        for key in self
            .ingredients_used
            .iter()
            .map(|name| name_key(name))
            .filter(|key| !key.is_empty())
        {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}
