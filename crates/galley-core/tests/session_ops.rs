//! Session-level operations.
//!
//! Covers:
//! - Credential revalidation and the failover latch
//! - Confirmation memory feeding the confidence score
//! - On-demand ingredient rendering
//! - Progress reporting across runs
//! - Isolation between sessions

use galley_core::{ConfigError, GalleyConfig, PerceptionConfig, Session, SynthesisConfig};
use galley_fusion::MemoryBias;
use galley_model::{Preferences, VerificationStatus, VisualArtifact};
use galley_resilience::{CallError, CancelToken, RetryPolicy};
use galley_test_utils::{
    capture, fast_config, ingredient, permanent_error, quota_error, Harness, RemoteOp,
    ScriptedRemote, StaticCredential, StaticNetwork, StaticPerceiver,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

async fn latch(h: &Harness) {
    h.remote.script_synthesize(Err(quota_error()));
    let outcome = h
        .session
        .run_synthesis_pipeline(&[ingredient("leek", 0.6)], &Preferences::default(), &CancelToken::new())
        .await
        .unwrap();
    assert!(outcome.is_offline());
    assert!(!h.session.is_reachable());
}

/// Tenet: a successful revalidation clears the failover latch.
#[tokio::test(start_paused = true)]
async fn revalidation_resets_the_latch() {
    let h = Harness::new();
    latch(&h).await;

    let valid = h.session.revalidate_credential(&CancelToken::new()).await.unwrap();

    assert!(valid);
    assert!(h.session.is_reachable());
    assert_eq!(h.remote.calls(RemoteOp::ValidateCredential), 1);
}

/// Tenet: a failed revalidation leaves the latch alone.
#[tokio::test(start_paused = true)]
async fn failed_revalidation_keeps_the_latch() {
    let h = Harness::new();
    latch(&h).await;
    h.remote.script_validation(Err(permanent_error()));

    let err = h
        .session
        .revalidate_credential(&CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, CallError::Permanent(permanent_error()));
    assert!(h.session.health().failover_latched);
}

/// Tenet: a quota answer to revalidation never trips the latch.
#[tokio::test(start_paused = true)]
async fn revalidation_quota_does_not_latch() {
    let h = Harness::new();
    h.remote.script_validation(Err(quota_error()));

    let err = h
        .session
        .revalidate_credential(&CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Permanent(_)));
    assert!(h.session.is_reachable());
}

/// Tenet: without a credential there is nothing to validate.
#[tokio::test(start_paused = true)]
async fn revalidation_without_credential() {
    let h = Harness::new();
    h.credentials.set(None);

    let valid = h.session.revalidate_credential(&CancelToken::new()).await.unwrap();

    assert!(!valid);
    assert_eq!(h.remote.calls(RemoteOp::ValidateCredential), 0);
    assert!(!h.session.health().credential_present);
}

/// Tenet: confirming twice records once; dismissing excludes the item.
#[tokio::test(start_paused = true)]
async fn confirmation_feeds_memory() {
    let h = Harness::new();
    let mut tomato = ingredient("Tomato", 0.5);
    let mut onion = ingredient("onion", 0.5);

    h.session.confirm_ingredient(&mut tomato);
    h.session.confirm_ingredient(&mut tomato);
    h.session.dismiss_ingredient(&mut onion);

    assert!(tomato.is_confirmed());
    assert_eq!(onion.verification, VerificationStatus::Dismissed);
    assert_eq!(h.session.memory().count("tomato"), 1);
    assert_eq!(h.session.memory().count("onion"), 0);

    let outcome = h
        .session
        .run_synthesis_pipeline(&[tomato, onion], &Preferences::default(), &CancelToken::new())
        .await
        .unwrap();

    // confirmed floor plus one confirmation of bias
    assert!((outcome.confidence.perception - 0.87).abs() < 1e-9);
}

/// Tenet: a seeded memory biases the perception term.
#[tokio::test(start_paused = true)]
async fn seeded_memory_raises_confidence() {
    let remote = Arc::new(ScriptedRemote::new());
    let session = Session::builder(
        remote,
        Arc::new(StaticPerceiver::detecting(Vec::new())),
        Arc::new(StaticNetwork::new(true)),
        Arc::new(StaticCredential::present()),
    )
    .with_config(fast_config())
    .with_memory(MemoryBias::from_counts([("tomato", 9)]))
    .build()
    .unwrap();

    let outcome = session
        .run_synthesis_pipeline(&[ingredient("tomato", 0.5)], &Preferences::default(), &CancelToken::new())
        .await
        .unwrap();

    // bias is capped at 0.10
    assert_eq!(outcome.composite(), 80);
}

/// Tenet: ingredient rendering follows the visual fallback chain.
#[tokio::test(start_paused = true)]
async fn ingredient_asset_fallback_chain() {
    let h = Harness::new();
    let basil = ingredient(" basil ", 0.9);
    let cancel = CancelToken::new();

    let image = h.session.render_ingredient_asset(&basil, &cancel).await.unwrap();
    assert!(matches!(image, Some(VisualArtifact::Image(_))));

    h.remote.script_asset(Err(permanent_error()));
    let blueprint = h.session.render_ingredient_asset(&basil, &cancel).await.unwrap();
    match blueprint {
        Some(VisualArtifact::Blueprint(b)) => assert_eq!(b.plating, "remote plating for basil"),
        other => panic!("expected a blueprint, got {other:?}"),
    }
}

/// Tenet: with blueprints disabled a failed render yields nothing.
#[tokio::test(start_paused = true)]
async fn ingredient_asset_without_fallback() {
    let h = Harness::with_config(fast_config().with_synthesis(SynthesisConfig {
        blueprint_fallback: false,
        ..SynthesisConfig::default()
    }));
    h.remote.fail_always(RemoteOp::GenerateAsset, permanent_error());

    let rendered = h
        .session
        .render_ingredient_asset(&ingredient("kale", 0.7), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(rendered, None);
    assert_eq!(h.remote.calls(RemoteOp::DescribeBlueprint), 0);
}

/// Tenet: the session log accumulates across runs and feeds the listener.
#[tokio::test(start_paused = true)]
async fn progress_accumulates_across_runs() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let session = Session::builder(
        Arc::new(ScriptedRemote::new()),
        Arc::new(StaticPerceiver::detecting(vec![ingredient("pear", 0.8)])),
        Arc::new(StaticNetwork::new(true)),
        Arc::new(StaticCredential::present()),
    )
    .with_config(fast_config())
    .with_listener(tx)
    .build()
    .unwrap();
    let cancel = CancelToken::new();

    let perceived = session.run_perception_pipeline(&capture(), &cancel).await.unwrap();
    let synthesized = session
        .run_synthesis_pipeline(&perceived.ingredients, &Preferences::default(), &cancel)
        .await
        .unwrap();

    let total = perceived.events.len() + synthesized.events.len();
    assert_eq!(total, 18);
    assert_eq!(session.progress_log().len(), total);

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }
    assert_eq!(received, session.progress_log().events());
}

/// Tenet: draining the session log between runs keeps it to one run's events.
#[tokio::test(start_paused = true)]
async fn drained_log_only_holds_the_latest_run() {
    let h = Harness::new();
    h.perceiver.set(Ok(vec![ingredient("pear", 0.8)]));
    let cancel = CancelToken::new();

    let first = h.session.run_perception_pipeline(&capture(), &cancel).await.unwrap();
    let drained = h.session.progress_log().drain();
    assert_eq!(drained, first.events);
    assert!(h.session.progress_log().is_empty());

    let second = h.session.run_perception_pipeline(&capture(), &cancel).await.unwrap();
    assert_eq!(h.session.progress_log().events(), second.events);
}

/// Tenet: invalid settings are rejected at build time.
#[test]
fn invalid_config_fails_build() {
    let config = GalleyConfig::new().with_perception(PerceptionConfig {
        min_hypothesis_confidence: 1.5,
        ..PerceptionConfig::default()
    });
    let err = Harness::try_build(config).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let config = GalleyConfig::new().with_asset_retry(RetryPolicy::asset().with_max_attempts(0));
    assert!(Harness::try_build(config).is_err());
}

/// Tenet: one session's latch is invisible to another.
#[tokio::test(start_paused = true)]
async fn sessions_are_isolated() {
    let first = Harness::new();
    let second = Harness::new();
    assert_ne!(first.session.id(), second.session.id());

    latch(&first).await;

    assert!(!first.session.is_reachable());
    assert!(second.session.is_reachable());

    let outcome = second
        .session
        .run_synthesis_pipeline(&[ingredient("leek", 0.6)], &Preferences::default(), &CancelToken::new())
        .await
        .unwrap();
    assert!(!outcome.is_offline());
}
