//! Galley Simulator - chaos harness for the session pipelines
//!
//! Drives full perception and synthesis runs against a seeded
//! [`ChaosRemote`](crate::chaos::ChaosRemote) and checks after every session
//! that failures stayed where they belong.

use crate::chaos::{AlwaysOnline, ChaosRates, ChaosRemote, ChaosTally, PantryPerceiver};
use galley_core::{
    GalleyConfig, PipelineError, ProgressEvent, Session, StageId, StageStatus, SynthesisOutcome,
};
use galley_model::{Capture, Preferences};
use galley_resilience::CancelToken;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Sessions to run, each with one perception and one synthesis run
    pub sessions: u64,
    /// Failure injection rates
    pub rates: ChaosRates,
    /// Session configuration
    pub galley: GalleyConfig,
    /// Stop conditions
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            sessions: 100,
            rates: ChaosRates::default(),
            galley: compressed_backoff(GalleyConfig::default()),
            stop_on_first_violation: false,
        }
    }
}

/// Shrink retry delays to a millisecond so long runs finish quickly
#[must_use]
pub fn compressed_backoff(config: GalleyConfig) -> GalleyConfig {
    let critical = config.critical_retry;
    let asset = config.asset_retry;
    config
        .with_critical_retry(critical.with_initial_delay(Duration::from_millis(1)))
        .with_asset_retry(asset.with_initial_delay(Duration::from_millis(1)))
}

/// Types of invariant checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum InvariantCheck {
    /// Perception never touches the failover latch
    PerceptionNeverLatches,
    /// The latch is set exactly when synthesis saw a quota answer
    LatchOnlyFromCriticalQuota,
    /// The protocol is offline exactly when no synthesis attempt succeeded
    OfflineIffCriticalFailed,
    /// Every protocol has a title and at least one step
    ProtocolAlwaysUsable,
    /// Every visual stage produced an image or a blueprint
    VisualsAlwaysPresent,
    /// Every stage went Active first and ended Complete
    StagesSettleComplete,
    /// Percentages never decrease and end at 100
    ProgressIsMonotonic,
}

/// A violation detected during simulation
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// Session index
    pub session: u64,
    /// Failed check
    pub check: InvariantCheck,
    /// What was observed
    pub details: String,
}

/// Statistics collected during simulation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationStats {
    /// Sessions completed
    pub sessions: u64,
    /// Protocols produced by the offline synthesizer
    pub offline_protocols: u64,
    /// Visuals that fell back to a blueprint
    pub blueprint_fallbacks: u64,
    /// Sessions whose failover latch was tripped
    pub latch_trips: u64,
    /// Degraded stages by name
    pub degraded_by_stage: BTreeMap<String, u64>,
    /// Remote attempts made
    pub remote_attempts: u64,
    /// Sum of composite scores
    pub composite_total: u64,
}

impl SimulationStats {
    fn record(&mut self, outcome: &SynthesisOutcome, latched: bool, tally: ChaosTally) {
        self.sessions += 1;
        self.offline_protocols += u64::from(outcome.is_offline());
        self.blueprint_fallbacks += outcome.visuals.blueprint_count() as u64;
        self.latch_trips += u64::from(latched);
        let attempts = tally.synthesize_ok + tally.synthesize_failed + tally.other_calls;
        self.remote_attempts += u64::from(attempts);
        self.composite_total += u64::from(outcome.composite());
    }

    fn record_degraded(&mut self, stage: StageId) {
        *self.degraded_by_stage.entry(stage.label().to_string()).or_insert(0) += 1;
    }

    /// Mean composite score
    #[must_use]
    pub fn mean_composite(&self) -> f64 {
        if self.sessions == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = self.composite_total as f64 / self.sessions as f64;
        mean
    }
}

/// Final report from the simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Seed used
    pub seed: u64,
    /// Failure rates used
    pub rates: ChaosRates,
    /// Collected statistics
    pub stats: SimulationStats,
    /// Violations found
    pub violations: Vec<Violation>,
}

impl SimulationReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate a text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        let s = &self.stats;

        report.push_str("=== Galley Simulator Report ===\n\n");
        let _ = writeln!(report, "Seed: {}", self.seed);
        let _ = writeln!(
            report,
            "Rates: quota {:.2}, transient {:.2}, permanent {:.2}",
            self.rates.quota, self.rates.transient, self.rates.permanent
        );
        let _ = writeln!(report, "Sessions: {}", s.sessions);
        let _ = writeln!(report, "Remote attempts: {}", s.remote_attempts);
        let _ = writeln!(report, "Offline protocols: {}", s.offline_protocols);
        let _ = writeln!(report, "Blueprint fallbacks: {}", s.blueprint_fallbacks);
        let _ = writeln!(report, "Latch trips: {}", s.latch_trips);
        let _ = writeln!(report, "Mean composite: {:.1}", s.mean_composite());

        if !s.degraded_by_stage.is_empty() {
            report.push_str("\n=== Degraded stages ===\n");
            for (stage, count) in &s.degraded_by_stage {
                let _ = writeln!(report, "{stage}: {count}");
            }
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(
                    report,
                    "{}. session {} {:?}: {}",
                    i + 1,
                    v.session,
                    v.check,
                    v.details
                );
            }
        }

        let _ = writeln!(
            report,
            "\n=== Result: {} ===",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }
}

/// Run the simulator
///
/// # Errors
/// Fails when the session configuration is invalid or a pipeline reports a
/// hard error.
pub async fn run_simulator(config: SimulatorConfig) -> anyhow::Result<SimulationReport> {
    config.rates.validate().map_err(anyhow::Error::msg)?;

    let mut stats = SimulationStats::default();
    let mut violations = Vec::new();
    let capture = Capture::new("image/jpeg", vec![0xFF, 0xD8, 0xFF]);
    let cancel = CancelToken::new();

    for index in 0..config.sessions {
        let seed = config.seed.wrapping_add(index);
        let remote = Arc::new(ChaosRemote::new(seed, config.rates));
        let session = Session::builder(
            remote.clone(),
            Arc::new(PantryPerceiver::new(seed)),
            Arc::new(AlwaysOnline),
            Arc::new(AlwaysOnline),
        )
        .with_config(config.galley.clone())
        .build()?;

        let found = run_session(index, &session, &remote, &capture, &cancel, &mut stats).await?;
        tracing::debug!(session = index, violations = found.len(), "session checked");
        violations.extend(found);

        if config.stop_on_first_violation && !violations.is_empty() {
            tracing::warn!(session = index, "stopping on first violation");
            break;
        }
    }

    tracing::info!(
        sessions = stats.sessions,
        latch_trips = stats.latch_trips,
        violations = violations.len(),
        "simulation finished"
    );

    Ok(SimulationReport {
        seed: config.seed,
        rates: config.rates,
        stats,
        violations,
    })
}

async fn run_session(
    index: u64,
    session: &Session,
    remote: &ChaosRemote,
    capture: &Capture,
    cancel: &CancelToken,
    stats: &mut SimulationStats,
) -> Result<Vec<Violation>, PipelineError> {
    let mut violations = Vec::new();
    let mut flag = |check: InvariantCheck, details: String| {
        violations.push(Violation {
            session: index,
            check,
            details,
        });
    };

    let perceived = session.run_perception_pipeline(capture, cancel).await?;
    if session.health().failover_latched {
        flag(
            InvariantCheck::PerceptionNeverLatches,
            "latch set after perception".to_string(),
        );
    }
    check_events(&perceived.events, &StageId::PERCEPTION, &mut flag);

    let outcome = session
        .run_synthesis_pipeline(&perceived.ingredients, &Preferences::default(), cancel)
        .await?;
    check_events(&outcome.events, &StageId::SYNTHESIS, &mut flag);

    let tally = remote.tally();
    let latched = session.health().failover_latched;
    if latched != (tally.synthesize_quota > 0) {
        flag(
            InvariantCheck::LatchOnlyFromCriticalQuota,
            format!("latched={latched}, synthesis quota answers={}", tally.synthesize_quota),
        );
    }
    if outcome.is_offline() != (tally.synthesize_ok == 0) {
        flag(
            InvariantCheck::OfflineIffCriticalFailed,
            format!(
                "offline={}, successful synthesis answers={}",
                outcome.is_offline(),
                tally.synthesize_ok
            ),
        );
    }
    if outcome.protocol.title.trim().is_empty() || outcome.protocol.instructions.is_empty() {
        flag(
            InvariantCheck::ProtocolAlwaysUsable,
            format!("unusable protocol {:?}", outcome.protocol.title),
        );
    }
    let visuals = outcome.visuals.iter().count();
    if visuals != 3 {
        flag(
            InvariantCheck::VisualsAlwaysPresent,
            format!("{visuals} of 3 visuals produced"),
        );
    }

    for degraded in perceived.degraded.iter().chain(&outcome.degraded) {
        stats.record_degraded(degraded.stage);
    }
    stats.record(&outcome, latched, tally);

    Ok(violations)
}

fn check_events(
    events: &[ProgressEvent],
    stages: &[StageId],
    flag: &mut impl FnMut(InvariantCheck, String),
) {
    for stage in stages {
        let statuses: Vec<StageStatus> = events
            .iter()
            .filter(|e| e.stage == *stage)
            .map(|e| e.status)
            .collect();
        let settled = statuses.first() == Some(&StageStatus::Active)
            && statuses.last() == Some(&StageStatus::Complete)
            && statuses.iter().filter(|s| **s == StageStatus::Complete).count() == 1;
        if !settled {
            flag(
                InvariantCheck::StagesSettleComplete,
                format!("{stage} went through {statuses:?}"),
            );
        }
    }

    let monotonic = events.windows(2).all(|w| w[0].percent <= w[1].percent);
    if !monotonic || events.last().map(|e| e.percent) != Some(100) {
        let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
        flag(
            InvariantCheck::ProgressIsMonotonic,
            format!("percent sequence {percents:?}"),
        );
    }
}
