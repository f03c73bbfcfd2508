//! Tunable constants for confidence fusion
//!
//! The defaults are empirical; they are exposed as configuration rather
//! than derived.

use serde::{Deserialize, Serialize};

/// Fusion weights and heuristics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    /// Weight of the perception term
    pub perception_weight: f64,
    /// Weight of the coherence term
    pub coherence_weight: f64,
    /// Weight of the constraint-satisfaction term
    pub constraint_weight: f64,
    /// Minimum confidence of a confirmed ingredient
    pub confirmed_floor: f64,
    /// Bias added per prior confirmation of the same ingredient
    pub bias_per_confirmation: f64,
    /// Ceiling on the memory bias
    pub bias_cap: f64,
    /// Protocols with more steps than this count as detailed
    pub detailed_step_threshold: usize,
    /// Coherence of a detailed protocol
    pub detailed_coherence: f64,
    /// Coherence of a sparse protocol
    pub sparse_coherence: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            perception_weight: 0.5,
            coherence_weight: 0.3,
            constraint_weight: 0.2,
            confirmed_floor: 0.85,
            bias_per_confirmation: 0.02,
            bias_cap: 0.10,
            detailed_step_threshold: 3,
            detailed_coherence: 1.0,
            sparse_coherence: 0.7,
        }
    }
}

/// Invalid fusion parameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FusionError {
    /// A weight is negative or not finite
    #[error("{name} must be a finite non-negative number (got {value})")]
    InvalidWeight {
        /// Field name
        name: &'static str,
        /// Offending value
        value: f64,
    },

    /// A probability-like field is outside `[0, 1]`
    #[error("{name} must lie in [0, 1] (got {value})")]
    OutOfUnitRange {
        /// Field name
        name: &'static str,
        /// Offending value
        value: f64,
    },

    /// Every weight is zero
    #[error("at least one fusion weight must be positive")]
    AllWeightsZero,
}

impl FusionParams {
    /// Check every field
    ///
    /// # Errors
    /// Returns the first [`FusionError`] found.
    pub fn validate(&self) -> Result<(), FusionError> {
        for (name, value) in [
            ("perception_weight", self.perception_weight),
            ("coherence_weight", self.coherence_weight),
            ("constraint_weight", self.constraint_weight),
            ("bias_per_confirmation", self.bias_per_confirmation),
            ("bias_cap", self.bias_cap),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FusionError::InvalidWeight { name, value });
            }
        }

        for (name, value) in [
            ("confirmed_floor", self.confirmed_floor),
            ("detailed_coherence", self.detailed_coherence),
            ("sparse_coherence", self.sparse_coherence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FusionError::OutOfUnitRange { name, value });
            }
        }

        if self.perception_weight + self.coherence_weight + self.constraint_weight == 0.0 {
            return Err(FusionError::AllWeightsZero);
        }
        Ok(())
    }
}
