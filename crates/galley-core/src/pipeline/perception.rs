//! Perception pipeline
//!
//! Detect and Segment run locally. The three enhancement stages use the
//! asset strategy, so none of them can trip the failover latch, and each
//! falls back to passing its input through unchanged.

use super::progress::StageTracker;
use super::{
    absorb, DegradeReason, ProgressEvent, StageContext, StageDegradation, StageId, StageOutcome,
};
use crate::error::PipelineError;
use galley_model::{name_key, Capture, Hypothesis, Ingredient, VerificationStatus};
use galley_resilience::CallPolicy;
use std::collections::{HashMap, HashSet};

/// Result of a perception run
#[derive(Debug, Clone)]
pub struct PerceptionOutcome {
    /// Refined ingredient set
    pub ingredients: Vec<Ingredient>,
    /// Hypotheses considered by the rescan
    pub hypotheses: Vec<Hypothesis>,
    /// Every stage transition of this run
    pub events: Vec<ProgressEvent>,
    /// Stages that used their fallback
    pub degraded: Vec<StageDegradation>,
}

impl PerceptionOutcome {
    /// Whether every stage ran on its primary path
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.degraded.is_empty()
    }
}

pub(crate) async fn run(
    ctx: &StageContext<'_>,
    capture: &Capture,
    mut tracker: StageTracker,
) -> Result<PerceptionOutcome, PipelineError> {
    let mut degraded = Vec::new();

    ctx.checkpoint(StageId::Detect)?;
    tracker.begin(StageId::Detect)?;
    let detected = settle(&mut tracker, &mut degraded, StageId::Detect, detect(ctx, capture).await?)?;

    ctx.checkpoint(StageId::Segment)?;
    tracker.begin(StageId::Segment)?;
    let segmented = sanitize(detected);
    tracker.complete(StageId::Segment, false)?;

    ctx.checkpoint(StageId::HypothesisAudit)?;
    tracker.begin(StageId::HypothesisAudit)?;
    let audit = hypothesis_audit(ctx, &segmented).await?;
    let hypotheses = settle(&mut tracker, &mut degraded, StageId::HypothesisAudit, audit)?;

    ctx.checkpoint(StageId::TargetedRescan)?;
    tracker.begin(StageId::TargetedRescan)?;
    let rescan = targeted_rescan(ctx, capture, segmented, &hypotheses).await?;
    let rescanned = settle(&mut tracker, &mut degraded, StageId::TargetedRescan, rescan)?;

    ctx.checkpoint(StageId::EnsembleRefinement)?;
    tracker.begin(StageId::EnsembleRefinement)?;
    let refinement = ensemble_refinement(ctx, rescanned).await?;
    let ingredients = settle(&mut tracker, &mut degraded, StageId::EnsembleRefinement, refinement)?;

    tracing::info!(
        ingredients = ingredients.len(),
        degraded = degraded.len(),
        "perception pipeline finished"
    );

    Ok(PerceptionOutcome {
        ingredients,
        hypotheses,
        events: tracker.into_events(),
        degraded,
    })
}

/// Complete the active stage and record any degradation
fn settle<T>(
    tracker: &mut StageTracker,
    degraded: &mut Vec<StageDegradation>,
    stage: StageId,
    outcome: StageOutcome<T>,
) -> Result<T, PipelineError> {
    let (value, reason) = outcome.into_parts();
    tracker.complete(stage, reason.is_some())?;
    if let Some(reason) = reason {
        tracing::warn!(stage = %stage, reason = %reason, "stage degraded");
        degraded.push(StageDegradation { stage, reason });
    }
    Ok(value)
}

async fn detect(
    ctx: &StageContext<'_>,
    capture: &Capture,
) -> Result<StageOutcome<Vec<Ingredient>>, PipelineError> {
    let result = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Err(PipelineError::Cancelled { stage: StageId::Detect }),
        result = ctx.perceiver.detect(capture) => result,
    };

    Ok(match result {
        Ok(items) => StageOutcome::Ok(items),
        Err(e) => StageOutcome::degraded(Vec::new(), DegradeReason::Local(e.to_string())),
    })
}

/// Trim names, drop unnamed items and merge duplicates by name
///
/// Merged items keep the first occurrence's identity, the highest
/// confidence and the summed mass. A confirmation on any duplicate carries over.
pub(crate) fn sanitize(items: Vec<Ingredient>) -> Vec<Ingredient> {
    let mut merged: Vec<Ingredient> = Vec::with_capacity(items.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for mut item in items {
        item.name = item.name.trim().to_string();
        if item.name.is_empty() {
            continue;
        }
        let mass = item.mass_grams;
        item.set_mass(mass);

        match positions.get(&item.key()) {
            Some(&i) => {
                let kept = &mut merged[i];
                kept.set_confidence(kept.confidence().max(item.confidence()));
                let total = kept.mass_grams + item.mass_grams;
                kept.set_mass(total);
                if item.is_confirmed() {
                    kept.verification = VerificationStatus::Confirmed;
                }
            }
            None => {
                positions.insert(item.key(), merged.len());
                merged.push(item);
            }
        }
    }
    merged
}

async fn hypothesis_audit(
    ctx: &StageContext<'_>,
    ingredients: &[Ingredient],
) -> Result<StageOutcome<Vec<Hypothesis>>, PipelineError> {
    if !ctx.health.is_reachable() {
        return Ok(StageOutcome::degraded(Vec::new(), DegradeReason::Unreachable));
    }

    let result = ctx
        .asset
        .call("hypothesize", ctx.cancel, || ctx.remote.hypothesize(ingredients))
        .await;

    Ok(match absorb(StageId::HypothesisAudit, result)? {
        Ok(raw) => StageOutcome::Ok(screen_hypotheses(ctx, ingredients, raw)),
        Err(e) => StageOutcome::degraded(Vec::new(), DegradeReason::Remote(e)),
    })
}

/// Keep confident, novel hypotheses, most confident first
fn screen_hypotheses(
    ctx: &StageContext<'_>,
    known: &[Ingredient],
    raw: Vec<Hypothesis>,
) -> Vec<Hypothesis> {
    let settings = &ctx.config.perception;
    let mut seen: HashSet<String> = known.iter().map(Ingredient::key).collect();

    let mut kept: Vec<Hypothesis> = raw
        .into_iter()
        .filter(|h| h.confidence() >= settings.min_hypothesis_confidence)
        .filter(|h| !h.name.trim().is_empty() && seen.insert(name_key(&h.name)))
        .collect();
    kept.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
    kept.truncate(settings.max_hypotheses);
    kept
}

async fn targeted_rescan(
    ctx: &StageContext<'_>,
    capture: &Capture,
    ingredients: Vec<Ingredient>,
    hypotheses: &[Hypothesis],
) -> Result<StageOutcome<Vec<Ingredient>>, PipelineError> {
    if !ctx.health.is_reachable() {
        return Ok(StageOutcome::degraded(ingredients, DegradeReason::Unreachable));
    }

    let result = ctx
        .asset
        .call("rescan", ctx.cancel, || ctx.remote.rescan(capture, hypotheses))
        .await;

    Ok(match absorb(StageId::TargetedRescan, result)? {
        Ok(recovered) => {
            let mut merged = ingredients;
            let known: HashSet<String> = merged.iter().map(Ingredient::key).collect();
            let fresh: Vec<Ingredient> = sanitize(recovered)
                .into_iter()
                .filter(|item| !known.contains(&item.key()))
                .collect();
            tracing::debug!(recovered = fresh.len(), "rescan recovered ingredients");
            merged.extend(fresh);
            StageOutcome::Ok(merged)
        }
        Err(e) => StageOutcome::degraded(ingredients, DegradeReason::Remote(e)),
    })
}

async fn ensemble_refinement(
    ctx: &StageContext<'_>,
    ingredients: Vec<Ingredient>,
) -> Result<StageOutcome<Vec<Ingredient>>, PipelineError> {
    if ingredients.is_empty() {
        return Ok(StageOutcome::Ok(ingredients));
    }
    if !ctx.health.is_reachable() {
        return Ok(StageOutcome::degraded(ingredients, DegradeReason::Unreachable));
    }

    let result = ctx
        .asset
        .call("refine", ctx.cancel, || ctx.remote.refine(&ingredients))
        .await;

    Ok(match absorb(StageId::EnsembleRefinement, result)? {
        Ok(refined) => {
            let refined = sanitize(refined);
            if refined.is_empty() {
                StageOutcome::degraded(ingredients, DegradeReason::EmptyAnswer)
            } else {
                StageOutcome::Ok(carry_verification(&ingredients, refined))
            }
        }
        Err(e) => StageOutcome::degraded(ingredients, DegradeReason::Remote(e)),
    })
}

/// Refinement may rename or re-identify items; user verification survives by name
fn carry_verification(before: &[Ingredient], mut after: Vec<Ingredient>) -> Vec<Ingredient> {
    let statuses: HashMap<String, VerificationStatus> = before
        .iter()
        .filter(|item| item.verification != VerificationStatus::Unverified)
        .map(|item| (item.key(), item.verification))
        .collect();

    for item in &mut after {
        if item.verification == VerificationStatus::Unverified {
            if let Some(status) = statuses.get(&item.key()) {
                item.verification = *status;
            }
        }
    }
    after
}
