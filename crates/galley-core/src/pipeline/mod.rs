//! Staged orchestration pipelines
//!
//! Two pipelines run strictly in order:
//! - perception: Detect, Segment, HypothesisAudit, TargetedRescan, EnsembleRefinement
//! - synthesis: ManifestAlignment, PlatingAsset, SommelierAsset, SchematicAsset
//!
//! Every stage has a fallback, so a stage never aborts its pipeline. A stage
//! that used its fallback reports a [`StageOutcome::Degraded`] and the
//! pipeline carries on with the substitute value. Pipelines only fail hard on
//! cancellation or on an illegal stage transition.

pub mod perception;
pub mod progress;
pub(crate) mod state_machine;
pub mod synthesis;

pub use perception::PerceptionOutcome;
pub use progress::{ProgressEvent, ProgressLog};
pub use synthesis::{SynthesisOutcome, VisualSet};

use crate::config::GalleyConfig;
use crate::error::PipelineError;
use crate::memory::ConfirmationMemory;
use crate::remote::{OfflineSynthesizer, Perceiver, RemoteIntelligence};
use galley_resilience::{AssetCaller, CallError, CancelToken, CriticalCaller, HealthMonitor};
use serde::Serialize;
use std::fmt;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Local ingredient detection
    Detect,
    /// Local sanitation of detections
    Segment,
    /// Remote hypotheses about missed ingredients
    HypothesisAudit,
    /// Remote re-verification of hypotheses
    TargetedRescan,
    /// Remote canonicalization of the ingredient set
    EnsembleRefinement,
    /// Protocol synthesis (critical path)
    ManifestAlignment,
    /// Plated dish visual
    PlatingAsset,
    /// Drink pairing visual
    SommelierAsset,
    /// Step layout visual
    SchematicAsset,
    /// On-demand ingredient visual, outside both pipelines
    IngredientAsset,
}

impl StageId {
    /// Stages of the perception pipeline, in order
    pub const PERCEPTION: [StageId; 5] = [
        StageId::Detect,
        StageId::Segment,
        StageId::HypothesisAudit,
        StageId::TargetedRescan,
        StageId::EnsembleRefinement,
    ];

    /// Stages of the synthesis pipeline, in order
    pub const SYNTHESIS: [StageId; 4] = [
        StageId::ManifestAlignment,
        StageId::PlatingAsset,
        StageId::SommelierAsset,
        StageId::SchematicAsset,
    ];

    /// Stable machine-readable name
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            StageId::Detect => "detect",
            StageId::Segment => "segment",
            StageId::HypothesisAudit => "hypothesis_audit",
            StageId::TargetedRescan => "targeted_rescan",
            StageId::EnsembleRefinement => "ensemble_refinement",
            StageId::ManifestAlignment => "manifest_alignment",
            StageId::PlatingAsset => "plating_asset",
            StageId::SommelierAsset => "sommelier_asset",
            StageId::SchematicAsset => "schematic_asset",
            StageId::IngredientAsset => "ingredient_asset",
        }
    }

    /// Human-readable progress text
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            StageId::Detect => "Detecting ingredients",
            StageId::Segment => "Separating items",
            StageId::HypothesisAudit => "Looking for missed ingredients",
            StageId::TargetedRescan => "Double-checking suspects",
            StageId::EnsembleRefinement => "Refining the inventory",
            StageId::ManifestAlignment => "Composing the protocol",
            StageId::PlatingAsset => "Plating the dish",
            StageId::SommelierAsset => "Pairing a drink",
            StageId::SchematicAsset => "Drawing the schematic",
            StageId::IngredientAsset => "Rendering the ingredient",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a stage within one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not started
    Pending,
    /// Running
    Active,
    /// Finished, on the primary path or through a fallback
    Complete,
    /// Primary path failed; may still complete through compensation
    Failed,
}

/// Why a stage used its fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    /// The health monitor reported the remote service unreachable
    Unreachable,
    /// The remote call failed
    Remote(CallError),
    /// The remote answered with nothing usable
    EmptyAnswer,
    /// A local collaborator failed
    Local(String),
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::Unreachable => f.write_str("remote service unreachable"),
            DegradeReason::Remote(e) => write!(f, "remote call failed: {e}"),
            DegradeReason::EmptyAnswer => f.write_str("remote returned an empty answer"),
            DegradeReason::Local(msg) => write!(f, "local collaborator failed: {msg}"),
        }
    }
}

/// Result of one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// Primary path succeeded
    Ok(T),
    /// Fallback value substituted
    Degraded {
        /// Substitute value
        value: T,
        /// What went wrong
        reason: DegradeReason,
    },
}

impl<T> StageOutcome<T> {
    /// Wrap a fallback value
    #[inline]
    #[must_use]
    pub fn degraded(value: T, reason: DegradeReason) -> Self {
        StageOutcome::Degraded { value, reason }
    }

    /// Whether the fallback was used
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    /// The value, primary or substitute
    #[inline]
    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Ok(value) | StageOutcome::Degraded { value, .. } => value,
        }
    }

    /// Reason for degradation, if any
    #[must_use]
    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            StageOutcome::Ok(_) => None,
            StageOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    /// Split into the value and the degradation reason
    #[must_use]
    pub fn into_parts(self) -> (T, Option<DegradeReason>) {
        match self {
            StageOutcome::Ok(value) => (value, None),
            StageOutcome::Degraded { value, reason } => (value, Some(reason)),
        }
    }
}

/// A stage that used its fallback during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDegradation {
    /// Stage
    pub stage: StageId,
    /// What went wrong
    pub reason: DegradeReason,
}

/// Borrowed session state a pipeline run needs
pub(crate) struct StageContext<'a> {
    pub(crate) remote: &'a dyn RemoteIntelligence,
    pub(crate) perceiver: &'a dyn Perceiver,
    pub(crate) offline: &'a dyn OfflineSynthesizer,
    pub(crate) health: &'a HealthMonitor,
    pub(crate) critical: &'a CriticalCaller,
    pub(crate) asset: &'a AssetCaller,
    pub(crate) config: &'a GalleyConfig,
    pub(crate) memory: &'a ConfirmationMemory,
    pub(crate) cancel: &'a CancelToken,
}

impl StageContext<'_> {
    /// Fail with `PipelineError::Cancelled` if the caller has cancelled
    pub(crate) fn checkpoint(&self, stage: StageId) -> Result<(), PipelineError> {
        self.cancel
            .checkpoint()
            .map_err(|_| PipelineError::Cancelled { stage })
    }
}

/// Map a stage's remote error, surfacing cancellation as a hard failure
pub(crate) fn absorb<T>(
    stage: StageId,
    result: Result<T, CallError>,
) -> Result<Result<T, CallError>, PipelineError> {
    match result {
        Err(CallError::Cancelled) => Err(PipelineError::Cancelled { stage }),
        other => Ok(other),
    }
}
