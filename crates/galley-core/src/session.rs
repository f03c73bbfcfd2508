//! Galley session
//!
//! A session owns everything that is shared between pipeline runs for one
//! user: the failover latch, both call strategies, the health monitor, the
//! confirmation memory and the progress log. Nothing is global, so two
//! sessions never observe each other's failover state.

use crate::config::GalleyConfig;
use crate::error::{ConfigError, PipelineError};
use crate::fallback::PantrySynthesizer;
use crate::memory::ConfirmationMemory;
use crate::pipeline::progress::StageTracker;
use crate::pipeline::{
    perception, synthesis, PerceptionOutcome, ProgressEvent, ProgressLog, StageContext, StageId,
    SynthesisOutcome,
};
use crate::remote::{OfflineSynthesizer, Perceiver, RemoteIntelligence};
use galley_fusion::MemoryBias;
use galley_model::{
    AssetKind, Capture, Ingredient, Preferences, SessionId, VerificationStatus, VisualArtifact,
};
use galley_resilience::{
    AssetCaller, CallError, CallPolicy, CancelToken, CredentialProvider, CriticalCaller,
    FailoverLatch, HealthMonitor, HealthSignal, NetworkProbe,
};
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, watch};

/// Builder for [`Session`]
pub struct SessionBuilder {
    remote: Arc<dyn RemoteIntelligence>,
    perceiver: Arc<dyn Perceiver>,
    network: Arc<dyn NetworkProbe>,
    credentials: Arc<dyn CredentialProvider>,
    offline: Option<Arc<dyn OfflineSynthesizer>>,
    config: GalleyConfig,
    memory: MemoryBias,
    listener: Option<UnboundedSender<ProgressEvent>>,
}

impl SessionBuilder {
    /// Start a builder with the required collaborators
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteIntelligence>,
        perceiver: Arc<dyn Perceiver>,
        network: Arc<dyn NetworkProbe>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            remote,
            perceiver,
            network,
            credentials,
            offline: None,
            config: GalleyConfig::default(),
            memory: MemoryBias::new(),
            listener: None,
        }
    }

    /// With configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: GalleyConfig) -> Self {
        self.config = config;
        self
    }

    /// With a custom offline synthesizer (defaults to [`PantrySynthesizer`])
    #[inline]
    #[must_use]
    pub fn with_offline(mut self, offline: Arc<dyn OfflineSynthesizer>) -> Self {
        self.offline = Some(offline);
        self
    }

    /// With a progress listener
    #[inline]
    #[must_use]
    pub fn with_listener(mut self, listener: UnboundedSender<ProgressEvent>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// With confirmation counts carried over from earlier sessions
    #[inline]
    #[must_use]
    pub fn with_memory(mut self, memory: MemoryBias) -> Self {
        self.memory = memory;
        self
    }

    /// Validate the configuration and build the session
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the configuration is invalid.
    pub fn build(self) -> Result<Session, ConfigError> {
        self.config.validate()?;

        let latch = Arc::new(FailoverLatch::new());
        let health = HealthMonitor::new(self.network, self.credentials, latch.clone());
        let critical = CriticalCaller::new(self.config.critical_retry, latch);
        let asset = AssetCaller::new(self.config.asset_retry);
        let id = SessionId::new();

        tracing::info!(session = %id, "session created");

        Ok(Session {
            id,
            remote: self.remote,
            perceiver: self.perceiver,
            offline: self
                .offline
                .unwrap_or_else(|| Arc::new(PantrySynthesizer)),
            health,
            critical,
            asset,
            memory: ConfirmationMemory::with_bias(self.memory),
            progress: Arc::new(ProgressLog::new()),
            listener: self.listener,
            config: self.config,
        })
    }
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One user session
pub struct Session {
    id: SessionId,
    config: GalleyConfig,
    remote: Arc<dyn RemoteIntelligence>,
    perceiver: Arc<dyn Perceiver>,
    offline: Arc<dyn OfflineSynthesizer>,
    health: HealthMonitor,
    critical: CriticalCaller,
    asset: AssetCaller,
    memory: ConfirmationMemory,
    progress: Arc<ProgressLog>,
    listener: Option<UnboundedSender<ProgressEvent>>,
}

impl Session {
    /// Start building a session
    #[must_use]
    pub fn builder(
        remote: Arc<dyn RemoteIntelligence>,
        perceiver: Arc<dyn Perceiver>,
        network: Arc<dyn NetworkProbe>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> SessionBuilder {
        SessionBuilder::new(remote, perceiver, network, credentials)
    }

    /// Session identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GalleyConfig {
        &self.config
    }

    /// Progress events of this session not yet drained, oldest first
    #[inline]
    #[must_use]
    pub fn progress_log(&self) -> &ProgressLog {
        &self.progress
    }

    /// Confirmation memory
    #[inline]
    #[must_use]
    pub fn memory(&self) -> &ConfirmationMemory {
        &self.memory
    }

    /// Turn a capture into a refined ingredient set
    ///
    /// # Errors
    /// Fails only on cancellation or an illegal stage transition; remote
    /// failures degrade individual stages instead.
    pub async fn run_perception_pipeline(
        &self,
        capture: &Capture,
        cancel: &CancelToken,
    ) -> Result<PerceptionOutcome, PipelineError> {
        tracing::info!(session = %self.id, capture = %capture.id, "perception pipeline started");
        let tracker = StageTracker::new(
            &StageId::PERCEPTION,
            self.progress.clone(),
            self.listener.clone(),
        );
        perception::run(&self.context(cancel), capture, tracker).await
    }

    /// Turn an ingredient set into a protocol, visuals and a confidence score
    ///
    /// Dismissed ingredients are left out of synthesis and scoring.
    ///
    /// # Errors
    /// Fails only on cancellation or an illegal stage transition; a failed
    /// critical call falls back to the offline synthesizer.
    pub async fn run_synthesis_pipeline(
        &self,
        ingredients: &[Ingredient],
        preferences: &Preferences,
        cancel: &CancelToken,
    ) -> Result<SynthesisOutcome, PipelineError> {
        tracing::info!(
            session = %self.id,
            ingredients = ingredients.len(),
            "synthesis pipeline started"
        );
        let tracker = StageTracker::new(
            &StageId::SYNTHESIS,
            self.progress.clone(),
            self.listener.clone(),
        );
        synthesis::run(&self.context(cancel), ingredients, preferences, tracker).await
    }

    /// Whether remote stages will be attempted
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.health.is_reachable()
    }

    /// Every input to the reachability signal
    #[must_use]
    pub fn health(&self) -> HealthSignal {
        self.health.signal()
    }

    /// Clear the failover latch; returns whether it was set
    pub fn reset_failover(&self) -> bool {
        let was_latched = self.health.latch().reset();
        if was_latched {
            tracing::info!(session = %self.id, "failover latch reset");
        }
        was_latched
    }

    /// Observe latch trips and resets
    #[must_use]
    pub fn subscribe_failover(&self) -> watch::Receiver<bool> {
        self.health.subscribe_failover()
    }

    /// Check the current credential with the remote service
    ///
    /// Runs on the asset path, so a quota answer here cannot trip the latch.
    /// On success the failover latch is reset. Returns `Ok(false)` when no
    /// credential is configured.
    ///
    /// # Errors
    /// Returns the [`CallError`] of the validation call.
    pub async fn revalidate_credential(&self, cancel: &CancelToken) -> Result<bool, CallError> {
        let Some(credential) = self.health.credential() else {
            tracing::warn!(session = %self.id, "no credential to validate");
            return Ok(false);
        };

        self.asset
            .call("validate_credential", cancel, || {
                self.remote.validate_credential(&credential)
            })
            .await?;

        self.reset_failover();
        tracing::info!(session = %self.id, "credential validated");
        Ok(true)
    }

    /// Mark an ingredient as confirmed and remember the confirmation
    pub fn confirm_ingredient(&self, ingredient: &mut Ingredient) {
        if ingredient.is_confirmed() {
            return;
        }
        ingredient.verification = VerificationStatus::Confirmed;
        self.memory.record(&ingredient.name);
        tracing::debug!(ingredient = %ingredient.name, "ingredient confirmed");
    }

    /// Mark an ingredient as dismissed; it is left out of synthesis
    pub fn dismiss_ingredient(&self, ingredient: &mut Ingredient) {
        ingredient.verification = VerificationStatus::Dismissed;
        tracing::debug!(ingredient = %ingredient.name, "ingredient dismissed");
    }

    /// Render a single ingredient on demand
    ///
    /// Uses the same fallback chain as the synthesis visuals. Returns `None`
    /// only when image generation fails and blueprint fallback is disabled.
    ///
    /// # Errors
    /// Fails only on cancellation.
    pub async fn render_ingredient_asset(
        &self,
        ingredient: &Ingredient,
        cancel: &CancelToken,
    ) -> Result<Option<VisualArtifact>, PipelineError> {
        let ctx = self.context(cancel);
        ctx.checkpoint(StageId::IngredientAsset)?;

        let name = ingredient.name.trim();
        let brief = format!("a single fresh {name}");
        let rendered = synthesis::render(
            &ctx,
            StageId::IngredientAsset,
            AssetKind::Ingredient,
            name,
            &brief,
            &[name.to_string()],
        )
        .await?;

        if let Some(reason) = &rendered.failure {
            tracing::warn!(ingredient = %name, reason = %reason, "ingredient image unavailable");
        }
        Ok(rendered.artifact)
    }

    fn context<'a>(&'a self, cancel: &'a CancelToken) -> StageContext<'a> {
        StageContext {
            remote: self.remote.as_ref(),
            perceiver: self.perceiver.as_ref(),
            offline: self.offline.as_ref(),
            health: &self.health,
            critical: &self.critical,
            asset: &self.asset,
            config: &self.config,
            memory: &self.memory,
            cancel,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("health", &self.health)
            .field("events", &self.progress.len())
            .finish_non_exhaustive()
    }
}
