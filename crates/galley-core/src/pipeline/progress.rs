//! Progress events
//!
//! Every stage transition produces one [`ProgressEvent`]. Events go to the
//! run's own list (returned in the pipeline outcome), to the session-wide
//! [`ProgressLog`] and, when one is attached, to a listener channel.

use super::state_machine::validate_transition;
use super::{StageId, StageStatus};
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// One stage transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Stage
    pub stage: StageId,
    /// Status entered
    pub status: StageStatus,
    /// Pipeline progress in `[0, 100]`
    pub percent: u8,
    /// Human-readable text
    pub label: String,
    /// Whether the stage is running on a fallback
    pub degraded: bool,
    /// When the transition happened
    pub at: DateTime<Utc>,
}

/// Ordered, replayable log of the events in a session since the last drain
#[derive(Debug, Default)]
pub struct ProgressLog {
    inner: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn append(&self, event: ProgressEvent) {
        self.inner.lock().push(event);
    }

    /// Copy of every event, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.inner.lock().clone()
    }

    /// Take every event logged so far, leaving the log empty
    ///
    /// Long-lived sessions call this after persisting or forwarding events so
    /// the log only holds what has not been consumed yet.
    #[must_use]
    pub fn drain(&self) -> Vec<ProgressEvent> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing has been logged
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Validates and records the stage transitions of one pipeline run
pub(crate) struct StageTracker {
    stages: &'static [StageId],
    statuses: Vec<StageStatus>,
    events: Vec<ProgressEvent>,
    log: Arc<ProgressLog>,
    listener: Option<UnboundedSender<ProgressEvent>>,
}

impl StageTracker {
    pub(crate) fn new(
        stages: &'static [StageId],
        log: Arc<ProgressLog>,
        listener: Option<UnboundedSender<ProgressEvent>>,
    ) -> Self {
        Self {
            stages,
            statuses: vec![StageStatus::Pending; stages.len()],
            events: Vec::with_capacity(stages.len() * 2),
            log,
            listener,
        }
    }

    /// `Pending -> Active`
    pub(crate) fn begin(&mut self, stage: StageId) -> Result<(), PipelineError> {
        tracing::info!(stage = %stage, "stage started");
        self.transition(stage, StageStatus::Active, false)
    }

    /// `Active -> Complete`
    pub(crate) fn complete(&mut self, stage: StageId, degraded: bool) -> Result<(), PipelineError> {
        tracing::info!(stage = %stage, degraded, "stage complete");
        self.transition(stage, StageStatus::Complete, degraded)
    }

    /// `Active -> Failed`
    pub(crate) fn fail(&mut self, stage: StageId) -> Result<(), PipelineError> {
        self.transition(stage, StageStatus::Failed, true)
    }

    /// `Failed -> Complete` through a fallback
    pub(crate) fn compensate(&mut self, stage: StageId) -> Result<(), PipelineError> {
        tracing::info!(stage = %stage, "stage compensated");
        self.transition(stage, StageStatus::Complete, true)
    }

    /// Current status of `stage`
    #[cfg(test)]
    pub(crate) fn status(&self, stage: StageId) -> StageStatus {
        self.index(stage)
            .map_or(StageStatus::Pending, |i| self.statuses[i])
    }

    pub(crate) fn into_events(self) -> Vec<ProgressEvent> {
        self.events
    }

    fn index(&self, stage: StageId) -> Option<usize> {
        self.stages.iter().position(|s| *s == stage)
    }

    fn transition(
        &mut self,
        stage: StageId,
        to: StageStatus,
        degraded: bool,
    ) -> Result<(), PipelineError> {
        let Some(index) = self.index(stage) else {
            // a stage outside this pipeline has no legal transitions here
            return Err(PipelineError::IllegalTransition {
                stage,
                from: StageStatus::Pending,
                to,
            });
        };
        validate_transition(stage, self.statuses[index], to)?;
        self.statuses[index] = to;

        let total = self.stages.len();
        let reached = if to == StageStatus::Complete {
            index + 1
        } else {
            index
        };
        #[allow(clippy::cast_possible_truncation)]
        let percent = (reached * 100 / total).min(100) as u8;

        let label = match to {
            StageStatus::Failed => format!("{}: using fallback", stage.description()),
            StageStatus::Complete if degraded => format!("{} (fallback)", stage.description()),
            _ => stage.description().to_string(),
        };

        let event = ProgressEvent {
            stage,
            status: to,
            percent,
            label,
            degraded,
            at: Utc::now(),
        };

        if let Some(listener) = &self.listener {
            if listener.send(event.clone()).is_err() {
                tracing::debug!(stage = %stage, "progress listener dropped");
            }
        }
        self.log.append(event.clone());
        self.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(listener: Option<UnboundedSender<ProgressEvent>>) -> (StageTracker, Arc<ProgressLog>) {
        let log = Arc::new(ProgressLog::new());
        (
            StageTracker::new(&StageId::SYNTHESIS, log.clone(), listener),
            log,
        )
    }

    #[test]
    fn percent_advances_by_stage_index() {
        let (mut t, _) = tracker(None);
        for stage in StageId::SYNTHESIS {
            t.begin(stage).unwrap();
            t.complete(stage, false).unwrap();
        }
        let percents: Vec<u8> = t.into_events().iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![0, 25, 25, 50, 50, 75, 75, 100]);
    }

    #[test]
    fn compensation_emits_failed_then_complete() {
        let (mut t, log) = tracker(None);
        t.begin(StageId::ManifestAlignment).unwrap();
        t.fail(StageId::ManifestAlignment).unwrap();
        assert_eq!(t.status(StageId::ManifestAlignment), StageStatus::Failed);
        t.compensate(StageId::ManifestAlignment).unwrap();

        let statuses: Vec<StageStatus> = log.events().iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![StageStatus::Active, StageStatus::Failed, StageStatus::Complete]
        );
        assert!(log.events()[2].degraded);
        assert!(log.events()[2].label.contains("fallback"));
    }

    #[test]
    fn drain_empties_the_log_and_keeps_order() {
        let (mut t, log) = tracker(None);
        t.begin(StageId::ManifestAlignment).unwrap();
        t.complete(StageId::ManifestAlignment, false).unwrap();

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].status, StageStatus::Active);
        assert!(log.is_empty());
        assert!(log.drain().is_empty());

        t.begin(StageId::PlatingAsset).unwrap();
        assert_eq!(log.events().len(), 1);
        assert_eq!(log.events()[0].stage, StageId::PlatingAsset);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let (mut t, log) = tracker(None);
        assert!(t.complete(StageId::PlatingAsset, false).is_err());
        assert!(t.begin(StageId::Detect).is_err(), "not a synthesis stage");
        t.begin(StageId::PlatingAsset).unwrap();
        assert!(t.begin(StageId::PlatingAsset).is_err());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn listener_receives_events_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (mut t, _) = tracker(Some(tx));
        t.begin(StageId::ManifestAlignment).unwrap();
        t.complete(StageId::ManifestAlignment, false).unwrap();
        drop(t);

        assert_eq!(rx.recv().await.unwrap().status, StageStatus::Active);
        assert_eq!(rx.recv().await.unwrap().status, StageStatus::Complete);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn dropped_listener_does_not_fail_the_run() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let (mut t, log) = tracker(Some(tx));
        t.begin(StageId::ManifestAlignment).unwrap();
        assert_eq!(log.len(), 1);
    }
}
