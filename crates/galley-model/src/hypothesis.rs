//! Hypotheses about ingredients perception may have missed

use crate::unit_interval;
use serde::{Deserialize, Serialize};

/// A suspected ingredient proposed by the audit stage
///
/// Hypotheses are ephemeral: they feed the targeted rescan and are then
/// discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Suspected ingredient name
    pub name: String,
    /// Why the service suspects it
    #[serde(default)]
    pub justification: String,
    /// Where to look in the capture
    #[serde(default)]
    pub visual_hint: String,
    /// Confidence in `[0, 1]`
    confidence: f64,
}

impl Hypothesis {
    /// Create a hypothesis
    #[must_use]
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            justification: String::new(),
            visual_hint: String::new(),
            confidence: unit_interval(confidence),
        }
    }

    /// With justification
    #[inline]
    #[must_use]
    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = justification.into();
        self
    }

    /// With visual hint
    #[inline]
    #[must_use]
    pub fn with_visual_hint(mut self, hint: impl Into<String>) -> Self {
        self.visual_hint = hint.into();
        self
    }

    /// Confidence in `[0, 1]`
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> f64 {
        unit_interval(self.confidence)
    }
}
