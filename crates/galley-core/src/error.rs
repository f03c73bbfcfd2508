//! Error types for Galley Core
//!
//! Pipelines degrade rather than fail. The only hard failures are:
//! - cancellation by the caller
//! - an illegal stage transition (a programming error)
//!
//! Configuration problems surface at session construction.

use crate::pipeline::{StageId, StageStatus};
use galley_fusion::FusionError;
use galley_resilience::PolicyError;
use std::path::PathBuf;

/// Hard pipeline failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The caller cancelled the pipeline
    #[error("pipeline cancelled during {stage}")]
    Cancelled {
        /// Stage running when cancellation was observed
        stage: StageId,
    },

    /// A stage attempted a transition its state machine forbids
    #[error("illegal transition for {stage}: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Stage
        stage: StageId,
        /// Current status
        from: StageStatus,
        /// Requested status
        to: StageStatus,
    },
}

impl PipelineError {
    /// Whether the caller abandoned the pipeline
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A retry policy is unusable
    #[error("invalid {which} retry policy: {source}")]
    Policy {
        /// "critical" or "asset"
        which: &'static str,
        /// Underlying error
        #[source]
        source: PolicyError,
    },

    /// Fusion parameters are unusable
    #[error("invalid fusion parameters: {0}")]
    Fusion(#[from] FusionError),

    /// Any other invalid value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
