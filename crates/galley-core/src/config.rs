//! Galley configuration
//!
//! Every section of the TOML file is optional; absent fields keep the
//! defaults of their own section (a partial `[asset_retry]` table is merged
//! onto the asset defaults, not the critical ones).
//!
//! ```toml
//! [critical_retry]
//! max_attempts = 5
//!
//! [asset_retry]
//! initial_delay_ms = 250
//!
//! [fusion]
//! detailed_step_threshold = 4
//!
//! [synthesis]
//! parallel_assets = true
//! ```

use crate::error::ConfigError;
use galley_fusion::FusionParams;
use galley_resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Perception pipeline settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Hypotheses below this confidence are discarded
    pub min_hypothesis_confidence: f64,
    /// At most this many hypotheses are forwarded to the rescan
    pub max_hypotheses: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            min_hypothesis_confidence: 0.3,
            max_hypotheses: 8,
        }
    }
}

/// Synthesis pipeline settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Attempt image generation for visual stages
    pub generate_images: bool,
    /// Substitute a descriptive blueprint when no image is produced
    pub blueprint_fallback: bool,
    /// Run the three visual stages concurrently
    pub parallel_assets: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            generate_images: true,
            blueprint_fallback: true,
            parallel_assets: false,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleyConfig {
    /// Retry policy for the critical synthesis call
    pub critical_retry: RetryPolicy,
    /// Retry policy for enhancement and visual calls
    pub asset_retry: RetryPolicy,
    /// Confidence fusion parameters
    pub fusion: FusionParams,
    /// Perception settings
    pub perception: PerceptionConfig,
    /// Synthesis settings
    pub synthesis: SynthesisConfig,
}

impl GalleyConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With critical retry policy
    #[inline]
    #[must_use]
    pub fn with_critical_retry(mut self, policy: RetryPolicy) -> Self {
        self.critical_retry = policy;
        self
    }

    /// With asset retry policy
    #[inline]
    #[must_use]
    pub fn with_asset_retry(mut self, policy: RetryPolicy) -> Self {
        self.asset_retry = policy;
        self
    }

    /// With fusion parameters
    #[inline]
    #[must_use]
    pub fn with_fusion(mut self, fusion: FusionParams) -> Self {
        self.fusion = fusion;
        self
    }

    /// With perception settings
    #[inline]
    #[must_use]
    pub fn with_perception(mut self, perception: PerceptionConfig) -> Self {
        self.perception = perception;
        self
    }

    /// With synthesis settings
    #[inline]
    #[must_use]
    pub fn with_synthesis(mut self, synthesis: SynthesisConfig) -> Self {
        self.synthesis = synthesis;
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns [`ConfigError`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        let config = file.resolve();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Check every section
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.critical_retry
            .validate()
            .map_err(|source| ConfigError::Policy {
                which: "critical",
                source,
            })?;
        self.asset_retry
            .validate()
            .map_err(|source| ConfigError::Policy {
                which: "asset",
                source,
            })?;
        self.fusion.validate()?;

        let min = self.perception.min_hypothesis_confidence;
        if !(0.0..=1.0).contains(&min) {
            return Err(ConfigError::Invalid(format!(
                "perception.min_hypothesis_confidence must lie in [0, 1] (got {min})"
            )));
        }
        Ok(())
    }
}

impl Default for GalleyConfig {
    fn default() -> Self {
        Self {
            critical_retry: RetryPolicy::critical(),
            asset_retry: RetryPolicy::asset(),
            fusion: FusionParams::default(),
            perception: PerceptionConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

/// On-disk shape: every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    critical_retry: RetryOverrides,
    asset_retry: RetryOverrides,
    fusion: FusionParams,
    perception: PerceptionConfig,
    synthesis: SynthesisConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RetryOverrides {
    max_attempts: Option<u32>,
    initial_delay_ms: Option<u64>,
    backoff_multiplier: Option<f64>,
}

impl RetryOverrides {
    fn apply(self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            initial_delay_ms: self.initial_delay_ms.unwrap_or(base.initial_delay_ms),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(base.backoff_multiplier),
        }
    }
}

impl ConfigFile {
    fn resolve(self) -> GalleyConfig {
        GalleyConfig {
            critical_retry: self.critical_retry.apply(RetryPolicy::critical()),
            asset_retry: self.asset_retry.apply(RetryPolicy::asset()),
            fusion: self.fusion,
            perception: self.perception,
            synthesis: self.synthesis,
        }
    }
}
