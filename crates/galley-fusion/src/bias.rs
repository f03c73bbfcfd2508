//! Historical confirmation bias
//!
//! Counts how often each ingredient name has been confirmed. Keys are
//! normalized with [`galley_model::name_key`], so lookups are case-insensitive.

use crate::params::FusionParams;
use galley_model::name_key;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Confirmation counts keyed by normalized ingredient name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryBias {
    counts: HashMap<String, u32>,
}

impl MemoryBias {
    /// Empty memory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, count)` pairs; duplicate names accumulate
    #[must_use]
    pub fn from_counts<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let mut bias = Self::new();
        for (name, count) in pairs {
            let entry = bias.counts.entry(name_key(name.as_ref())).or_insert(0);
            *entry = entry.saturating_add(count);
        }
        bias
    }

    /// Record one confirmation
    pub fn record(&mut self, name: &str) {
        let key = name_key(name);
        if key.is_empty() {
            return;
        }
        let entry = self.counts.entry(key).or_insert(0);
        *entry = entry.saturating_add(1);
    }

    /// Prior confirmations of `name`
    #[must_use]
    pub fn count(&self, name: &str) -> u32 {
        self.counts.get(&name_key(name)).copied().unwrap_or(0)
    }

    /// Confidence bias for `name` under `params`
    #[must_use]
    pub fn bias(&self, name: &str, params: &FusionParams) -> f64 {
        (f64::from(self.count(name)) * params.bias_per_confirmation).min(params.bias_cap)
    }

    /// Number of distinct names remembered
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether nothing has been confirmed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
