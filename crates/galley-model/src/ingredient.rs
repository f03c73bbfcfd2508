//! Ingredients
//!
//! An ingredient is created by perception, may be corrected by ensemble
//! refinement, and is frozen once it enters protocol synthesis. Confidence
//! is always kept in `[0, 1]` and vitality in `[0, 100]`.

use crate::ids::IngredientId;
use crate::unit_interval;
use serde::{Deserialize, Deserializer, Serialize};

/// Verification state of a perceived ingredient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Not reviewed yet
    #[default]
    Unverified,
    /// Confirmed by the user
    Confirmed,
    /// Rejected by the user
    Dismissed,
}

/// Normalized lookup key for an ingredient name (trimmed, lowercase)
#[must_use]
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A perceived ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Identifier
    #[serde(default)]
    pub id: IngredientId,
    /// Display name
    pub name: String,
    /// Free-form category (e.g. "produce", "dairy")
    #[serde(default)]
    pub category: String,
    /// Estimated mass in grams
    #[serde(default)]
    pub mass_grams: f64,
    /// Freshness estimate
    #[serde(default = "default_vitality", deserialize_with = "de_vitality")]
    vitality_score: u8,
    /// Perception confidence
    #[serde(deserialize_with = "de_confidence")]
    confidence: f64,
    /// Verification status
    #[serde(default)]
    pub verification: VerificationStatus,
}

fn default_vitality() -> u8 {
    100
}

fn de_vitality<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = u32::deserialize(deserializer)?;
    Ok(raw.min(100) as u8)
}

fn de_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    f64::deserialize(deserializer).map(unit_interval)
}

impl Ingredient {
    /// Create an unverified ingredient
    #[must_use]
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: IngredientId::new(),
            name: name.into(),
            category: String::new(),
            mass_grams: 0.0,
            vitality_score: default_vitality(),
            confidence: unit_interval(confidence),
            verification: VerificationStatus::Unverified,
        }
    }

    /// With category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// With mass in grams (negative or non-finite becomes 0)
    #[inline]
    #[must_use]
    pub fn with_mass(mut self, grams: f64) -> Self {
        self.set_mass(grams);
        self
    }

    /// With vitality score (saturates at 100)
    #[inline]
    #[must_use]
    pub fn with_vitality(mut self, score: u8) -> Self {
        self.vitality_score = score.min(100);
        self
    }

    /// With verification status
    #[inline]
    #[must_use]
    pub fn with_verification(mut self, status: VerificationStatus) -> Self {
        self.verification = status;
        self
    }

    /// Perception confidence in `[0, 1]`
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Vitality score in `[0, 100]`
    #[inline]
    #[must_use]
    pub fn vitality_score(&self) -> u8 {
        self.vitality_score
    }

    /// Replace confidence, clamped into `[0, 1]`
    #[inline]
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = unit_interval(confidence);
    }

    /// Replace mass, clamped at zero
    #[inline]
    pub fn set_mass(&mut self, grams: f64) {
        self.mass_grams = if grams.is_finite() { grams.max(0.0) } else { 0.0 };
    }

    /// Lookup key for this ingredient's name
    #[inline]
    #[must_use]
    pub fn key(&self) -> String {
        name_key(&self.name)
    }

    /// Whether the user confirmed this ingredient
    #[inline]
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.verification == VerificationStatus::Confirmed
    }

    /// Whether the user dismissed this ingredient
    #[inline]
    #[must_use]
    pub fn is_dismissed(&self) -> bool {
        self.verification == VerificationStatus::Dismissed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_confidence() {
        assert_eq!(Ingredient::new("salt", 3.0).confidence(), 1.0);
        assert_eq!(Ingredient::new("salt", -1.0).confidence(), 0.0);
    }

    #[test]
    fn builder_clamps_ranges() {
        let item = Ingredient::new("leek", 0.5)
            .with_vitality(250)
            .with_mass(-12.0)
            .with_category("produce");
        assert_eq!(item.vitality_score(), 100);
        assert_eq!(item.mass_grams, 0.0);
        assert_eq!(item.category, "produce");
    }

    #[test]
    fn key_is_case_insensitive() {
        assert_eq!(Ingredient::new("  Tomato ", 0.5).key(), "tomato");
    }

    #[test]
    fn deserialize_clamps_out_of_range_values() {
        let json = r#"{"name":"basil","confidence":1.4,"vitality_score":300}"#;
        let item: Ingredient = serde_json::from_str(json).unwrap();
        assert_eq!(item.confidence(), 1.0);
        assert_eq!(item.vitality_score(), 100);
        assert_eq!(item.verification, VerificationStatus::Unverified);
    }

    #[test]
    fn verification_flags() {
        let item = Ingredient::new("egg", 0.9).with_verification(VerificationStatus::Confirmed);
        assert!(item.is_confirmed());
        assert!(!item.is_dismissed());
    }
}
