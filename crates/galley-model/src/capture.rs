//! Captures and preferences handed to collaborators

use crate::ids::CaptureId;
use serde::{Deserialize, Serialize};

/// A raw scan of the user's inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    /// Identifier
    pub id: CaptureId,
    /// MIME type of the payload
    pub mime: String,
    /// Encoded image bytes
    pub bytes: Vec<u8>,
}

impl Capture {
    /// Create a capture from encoded bytes
    #[must_use]
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: CaptureId::new(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Whether the capture carries no data
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// User preferences forwarded to synthesis
///
/// Persistence of preferences lives outside Galley; the core only passes
/// them through to the remote and offline synthesizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Dietary restrictions ("vegetarian", "gluten-free", ...)
    pub dietary: Vec<String>,
    /// Preferred cuisine
    pub cuisine: Option<String>,
    /// Number of servings
    pub servings: u8,
    /// Time budget in minutes
    pub max_minutes: Option<u32>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dietary: Vec::new(),
            cuisine: None,
            servings: 2,
            max_minutes: None,
        }
    }
}

impl Preferences {
    /// With dietary restriction
    #[inline]
    #[must_use]
    pub fn with_dietary(mut self, restriction: impl Into<String>) -> Self {
        self.dietary.push(restriction.into());
        self
    }

    /// With cuisine
    #[inline]
    #[must_use]
    pub fn with_cuisine(mut self, cuisine: impl Into<String>) -> Self {
        self.cuisine = Some(cuisine.into());
        self
    }

    /// With servings (at least one)
    #[inline]
    #[must_use]
    pub fn with_servings(mut self, servings: u8) -> Self {
        self.servings = servings.max(1);
        self
    }
}
