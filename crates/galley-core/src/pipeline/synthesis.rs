//! Synthesis pipeline
//!
//! ManifestAlignment is the only stage on the critical path. Its failure is
//! absorbed by the offline synthesizer. The asset stages that follow use the
//! asset strategy and fall back first to a remote blueprint description and
//! then to the local [`BlueprintWriter`].

use super::progress::StageTracker;
use super::{absorb, DegradeReason, ProgressEvent, StageContext, StageDegradation, StageId};
use crate::error::PipelineError;
use crate::fallback::BlueprintWriter;
use galley_fusion::{ConfidenceBreakdown, ConfidenceFusion};
use galley_model::{
    AssetKind, ImageAsset, Ingredient, Preferences, Protocol, ProtocolDraft, VisualArtifact,
};
use galley_resilience::{CallError, CallPolicy};
use serde::Serialize;

/// Visuals produced by the asset stages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisualSet {
    /// Plated dish
    pub plating: Option<VisualArtifact>,
    /// Drink pairing
    pub sommelier: Option<VisualArtifact>,
    /// Step layout
    pub schematic: Option<VisualArtifact>,
}

impl VisualSet {
    /// Number of visuals that fell back to a descriptive blueprint
    #[must_use]
    pub fn blueprint_count(&self) -> usize {
        self.iter()
            .filter(|artifact| artifact.is_blueprint())
            .count()
    }

    /// Produced visuals in stage order
    pub fn iter(&self) -> impl Iterator<Item = &VisualArtifact> {
        [&self.plating, &self.sommelier, &self.schematic]
            .into_iter()
            .flatten()
    }
}

/// Result of a synthesis run
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    /// Synthesized protocol with its provenance
    pub protocol: Protocol,
    /// Visual artifacts
    pub visuals: VisualSet,
    /// Composite confidence and its terms
    pub confidence: ConfidenceBreakdown,
    /// Every stage transition of this run
    pub events: Vec<ProgressEvent>,
    /// Stages that used their fallback
    pub degraded: Vec<StageDegradation>,
}

impl SynthesisOutcome {
    /// Composite confidence in `[0, 100]`
    #[inline]
    #[must_use]
    pub fn composite(&self) -> u8 {
        self.confidence.composite
    }

    /// Whether the offline synthesizer produced the protocol
    #[inline]
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.protocol.is_offline()
    }
}

/// Outcome of one asset stage, recorded once the stage has run
#[derive(Debug)]
pub(crate) struct Rendered {
    pub(crate) artifact: Option<VisualArtifact>,
    pub(crate) failure: Option<DegradeReason>,
}

pub(crate) async fn run(
    ctx: &StageContext<'_>,
    ingredients: &[Ingredient],
    preferences: &Preferences,
    mut tracker: StageTracker,
) -> Result<SynthesisOutcome, PipelineError> {
    let mut degraded = Vec::new();
    let active: Vec<Ingredient> = ingredients
        .iter()
        .filter(|item| !item.is_dismissed())
        .cloned()
        .collect();

    ctx.checkpoint(StageId::ManifestAlignment)?;
    let protocol = manifest_alignment(ctx, &active, preferences, &mut tracker, &mut degraded).await?;

    let highlights: Vec<String> = protocol.ingredients_used.clone();
    let briefs = [
        (StageId::PlatingAsset, AssetKind::Plating, plating_brief(&protocol)),
        (StageId::SommelierAsset, AssetKind::Drink, sommelier_brief(&protocol)),
        (StageId::SchematicAsset, AssetKind::Schematic, schematic_brief(&protocol)),
    ];

    let mut artifacts: Vec<Option<VisualArtifact>> = Vec::with_capacity(briefs.len());
    if ctx.config.synthesis.parallel_assets {
        ctx.checkpoint(StageId::PlatingAsset)?;
        let [plating, sommelier, schematic] = &briefs;
        let (a, b, c) = futures::join!(
            render(ctx, plating.0, plating.1, &protocol.title, &plating.2, &highlights),
            render(ctx, sommelier.0, sommelier.1, &protocol.title, &sommelier.2, &highlights),
            render(ctx, schematic.0, schematic.1, &protocol.title, &schematic.2, &highlights),
        );
        // events are replayed in stage order once all three have finished
        for ((stage, _, _), rendered) in briefs.iter().zip([a?, b?, c?]) {
            tracker.begin(*stage)?;
            artifacts.push(record(&mut tracker, &mut degraded, *stage, rendered)?);
        }
    } else {
        for (stage, kind, brief) in &briefs {
            ctx.checkpoint(*stage)?;
            tracker.begin(*stage)?;
            let rendered = render(ctx, *stage, *kind, &protocol.title, brief, &highlights).await?;
            artifacts.push(record(&mut tracker, &mut degraded, *stage, rendered)?);
        }
    }

    let mut artifacts = artifacts.into_iter();
    let visuals = VisualSet {
        plating: artifacts.next().flatten(),
        sommelier: artifacts.next().flatten(),
        schematic: artifacts.next().flatten(),
    };

    let confidence =
        ConfidenceFusion::new(ctx.config.fusion).breakdown(&active, &protocol, &ctx.memory.snapshot());

    tracing::info!(
        offline = protocol.is_offline(),
        composite = confidence.composite,
        blueprints = visuals.blueprint_count(),
        degraded = degraded.len(),
        "synthesis pipeline finished"
    );

    Ok(SynthesisOutcome {
        protocol,
        visuals,
        confidence,
        events: tracker.into_events(),
        degraded,
    })
}

async fn manifest_alignment(
    ctx: &StageContext<'_>,
    active: &[Ingredient],
    preferences: &Preferences,
    tracker: &mut StageTracker,
    degraded: &mut Vec<StageDegradation>,
) -> Result<Protocol, PipelineError> {
    let stage = StageId::ManifestAlignment;
    tracker.begin(stage)?;

    if !ctx.health.is_reachable() {
        tracing::warn!(stage = %stage, "remote unreachable, synthesizing offline");
        let protocol = Protocol::offline(ctx.offline.synthesize(active, preferences));
        tracker.complete(stage, true)?;
        degraded.push(StageDegradation {
            stage,
            reason: DegradeReason::Unreachable,
        });
        return Ok(protocol);
    }

    let result = ctx
        .critical
        .call("synthesize", ctx.cancel, || ctx.remote.synthesize(active, preferences))
        .await;

    let reason = match absorb(stage, result)? {
        Ok(draft) if is_usable(&draft) => {
            tracker.complete(stage, false)?;
            return Ok(Protocol::remote(draft));
        }
        Ok(_) => DegradeReason::EmptyAnswer,
        Err(e) => DegradeReason::Remote(e),
    };

    tracing::warn!(stage = %stage, reason = %reason, "critical synthesis failed, synthesizing offline");
    tracker.fail(stage)?;
    let protocol = Protocol::offline(ctx.offline.synthesize(active, preferences));
    tracker.compensate(stage)?;
    degraded.push(StageDegradation { stage, reason });
    Ok(protocol)
}

fn is_usable(draft: &ProtocolDraft) -> bool {
    !draft.title.trim().is_empty() && !draft.instructions.is_empty()
}

/// Produce one visual: image, then remote blueprint, then local blueprint
pub(crate) async fn render(
    ctx: &StageContext<'_>,
    stage: StageId,
    kind: AssetKind,
    subject: &str,
    brief: &str,
    highlights: &[String],
) -> Result<Rendered, PipelineError> {
    let settings = &ctx.config.synthesis;

    let failure = if settings.generate_images {
        match generate_image(ctx, stage, kind, subject).await? {
            Ok(image) => {
                return Ok(Rendered {
                    artifact: Some(VisualArtifact::Image(image)),
                    failure: None,
                })
            }
            Err(reason) => Some(reason),
        }
    } else {
        None
    };

    if !settings.blueprint_fallback {
        return Ok(Rendered {
            artifact: None,
            failure,
        });
    }

    let blueprint = if ctx.health.is_reachable() {
        let result = ctx
            .asset
            .call("describe_blueprint", ctx.cancel, || {
                ctx.remote.describe_blueprint(subject, brief)
            })
            .await;
        match absorb(stage, result)? {
            Ok(blueprint) if !blueprint.is_blank() => Some(blueprint),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "remote blueprint failed, writing locally");
                None
            }
        }
    } else {
        None
    };

    let blueprint = blueprint.unwrap_or_else(|| BlueprintWriter::compose(kind, subject, highlights));
    Ok(Rendered {
        artifact: Some(VisualArtifact::Blueprint(blueprint)),
        failure,
    })
}

async fn generate_image(
    ctx: &StageContext<'_>,
    stage: StageId,
    kind: AssetKind,
    subject: &str,
) -> Result<Result<ImageAsset, DegradeReason>, PipelineError> {
    if !ctx.health.is_reachable() {
        return Ok(Err(DegradeReason::Unreachable));
    }

    let result: Result<_, CallError> = ctx
        .asset
        .call("generate_asset", ctx.cancel, || ctx.remote.generate_asset(kind, subject))
        .await;

    Ok(match absorb(stage, result)? {
        Ok(image) if !image.is_empty() => Ok(ImageAsset { kind, image }),
        Ok(_) => Err(DegradeReason::EmptyAnswer),
        Err(e) => {
            tracing::warn!(stage = %stage, kind = %kind, error = %e, "asset generation failed");
            Err(DegradeReason::Remote(e))
        }
    })
}

/// Record the transitions of an active asset stage
fn record(
    tracker: &mut StageTracker,
    degraded: &mut Vec<StageDegradation>,
    stage: StageId,
    rendered: Rendered,
) -> Result<Option<VisualArtifact>, PipelineError> {
    match rendered.failure {
        None => tracker.complete(stage, false)?,
        Some(reason) => {
            // a failed asset stage still completes, with a blueprint or with nothing
            tracker.fail(stage)?;
            tracker.compensate(stage)?;
            degraded.push(StageDegradation { stage, reason });
        }
    }
    Ok(rendered.artifact)
}

fn plating_brief(protocol: &Protocol) -> String {
    format!(
        "plated {} featuring {}",
        protocol.title,
        protocol.ingredients_used.join(", ")
    )
}

fn sommelier_brief(protocol: &Protocol) -> String {
    format!("a drink that pairs with {}", protocol.title)
}

fn schematic_brief(protocol: &Protocol) -> String {
    format!(
        "a {}-step preparation schematic for {}",
        protocol.instructions.len(),
        protocol.title
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_model::{DescriptiveBlueprint, ImageBytes};

    #[test]
    fn blank_drafts_are_not_usable() {
        assert!(!is_usable(&ProtocolDraft::new("  ").step("boil")));
        assert!(!is_usable(&ProtocolDraft::new("Soup")));
        assert!(is_usable(&ProtocolDraft::new("Soup").step("boil")));
    }

    #[test]
    fn visual_set_counts_blueprints_in_order() {
        let visuals = VisualSet {
            plating: Some(VisualArtifact::Image(ImageAsset {
                kind: AssetKind::Plating,
                image: ImageBytes::new("image/png", vec![1]),
            })),
            sommelier: None,
            schematic: Some(VisualArtifact::Blueprint(DescriptiveBlueprint::default())),
        };
        assert_eq!(visuals.iter().count(), 2);
        assert_eq!(visuals.blueprint_count(), 1);
    }

    #[test]
    fn briefs_mention_the_protocol() {
        let protocol = Protocol::remote(
            ProtocolDraft::new("Tomato Tart")
                .step("roll")
                .step("bake")
                .uses("tomato"),
        );
        assert!(plating_brief(&protocol).contains("tomato"));
        assert!(sommelier_brief(&protocol).contains("Tomato Tart"));
        assert!(schematic_brief(&protocol).contains("2-step"));
    }
}
