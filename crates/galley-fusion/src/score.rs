//! Composite confidence

use crate::bias::MemoryBias;
use crate::params::FusionParams;
use galley_model::{unit_interval, Ingredient, Protocol};
use serde::Serialize;
use std::collections::HashSet;

/// The three fused terms and the resulting score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceBreakdown {
    /// Mean adjusted perception confidence
    pub perception: f64,
    /// Protocol detail heuristic
    pub coherence: f64,
    /// Share of referenced ingredients that were perceived
    pub constraint: f64,
    /// Weighted score in `[0, 100]`
    pub composite: u8,
}

/// Scores protocols under a fixed set of parameters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceFusion {
    params: FusionParams,
}

impl ConfidenceFusion {
    /// Create a scorer
    #[must_use]
    pub fn new(params: FusionParams) -> Self {
        Self { params }
    }

    /// Parameters in use
    #[inline]
    #[must_use]
    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    /// Composite score in `[0, 100]`
    #[must_use]
    pub fn score(&self, ingredients: &[Ingredient], protocol: &Protocol, bias: &MemoryBias) -> u8 {
        self.breakdown(ingredients, protocol, bias).composite
    }

    /// Every term plus the composite score
    #[must_use]
    pub fn breakdown(
        &self,
        ingredients: &[Ingredient],
        protocol: &Protocol,
        bias: &MemoryBias,
    ) -> ConfidenceBreakdown {
        let perception = self.perception(ingredients, bias);
        let coherence = self.coherence(protocol);
        let constraint = constraint(ingredients, protocol);

        let weighted = self.params.perception_weight * perception
            + self.params.coherence_weight * coherence
            + self.params.constraint_weight * constraint;

        ConfidenceBreakdown {
            perception,
            coherence,
            constraint,
            composite: to_score(weighted),
        }
    }

    /// Mean adjusted confidence; an empty set scores 1.0
    fn perception(&self, ingredients: &[Ingredient], bias: &MemoryBias) -> f64 {
        if ingredients.is_empty() {
            return 1.0;
        }

        let total: f64 = ingredients
            .iter()
            .map(|item| {
                let mut confidence = item.confidence();
                if item.is_confirmed() {
                    confidence = confidence.max(self.params.confirmed_floor);
                }
                unit_interval(confidence + bias.bias(&item.name, &self.params))
            })
            .sum();

        #[allow(clippy::cast_precision_loss)]
        let count = ingredients.len() as f64;
        total / count
    }

    fn coherence(&self, protocol: &Protocol) -> f64 {
        if protocol.instructions.len() > self.params.detailed_step_threshold {
            self.params.detailed_coherence
        } else {
            self.params.sparse_coherence
        }
    }
}

/// Score with default parameters
#[must_use]
pub fn composite_confidence(
    ingredients: &[Ingredient],
    protocol: &Protocol,
    bias: &MemoryBias,
) -> u8 {
    ConfidenceFusion::default().score(ingredients, protocol, bias)
}

/// `1 - missing / referenced`, floored at 0; no references scores 1.0
fn constraint(ingredients: &[Ingredient], protocol: &Protocol) -> f64 {
    let referenced = protocol.referenced_keys();
    if referenced.is_empty() {
        return 1.0;
    }

    let perceived: HashSet<String> = ingredients.iter().map(Ingredient::key).collect();
    let missing = referenced.iter().filter(|key| !perceived.contains(*key)).count();

    #[allow(clippy::cast_precision_loss)]
    let ratio = missing as f64 / referenced.len() as f64;
    (1.0 - ratio).max(0.0)
}

fn to_score(weighted: f64) -> u8 {
    if !weighted.is_finite() {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = (100.0 * weighted).round().clamp(0.0, 100.0) as u8;
    score
}
