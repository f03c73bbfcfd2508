//! Galley Model - domain types shared by every Galley crate
//!
//! Defines:
//! - Ingredients produced by perception and refined by the pipeline
//! - Hypotheses produced by the audit stage
//! - Protocols (recipes) with authoritative provenance
//! - Visual artifacts and their descriptive-blueprint fallback
//! - Captures and user preferences handed to collaborators

#![warn(unreachable_pub)]

pub mod capture;
pub mod hypothesis;
pub mod ids;
pub mod ingredient;
pub mod protocol;
pub mod visual;

pub use capture::{Capture, Preferences};
pub use hypothesis::Hypothesis;
pub use ids::{CaptureId, IngredientId, ProtocolId, SessionId};
pub use ingredient::{name_key, Ingredient, VerificationStatus};
pub use protocol::{Protocol, ProtocolDraft, Provenance};
pub use visual::{AssetKind, DescriptiveBlueprint, ImageAsset, ImageBytes, VisualArtifact};

/// Clamp a value into `[0.0, 1.0]`, mapping non-finite input to `0.0`.
#[inline]
#[must_use]
pub fn unit_interval(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_interval_clamps_and_rejects_nan() {
        assert_eq!(unit_interval(1.7), 1.0);
        assert_eq!(unit_interval(-0.2), 0.0);
        assert_eq!(unit_interval(f64::NAN), 0.0);
        assert_eq!(unit_interval(f64::INFINITY), 0.0);
        assert_eq!(unit_interval(0.42), 0.42);
    }
}
