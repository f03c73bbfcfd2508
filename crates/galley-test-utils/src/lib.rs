//! Testing utilities for the Galley workspace
//!
//! Scripted collaborators, fixtures and a session harness.

#![allow(missing_docs)]

use async_trait::async_trait;
use galley_core::{ConfigError, GalleyConfig, Perceiver, RemoteIntelligence, Session};
use galley_model::{
    AssetKind, Capture, DescriptiveBlueprint, Hypothesis, ImageBytes, Ingredient, Preferences,
    ProtocolDraft,
};
use galley_resilience::{CredentialProvider, NetworkProbe, ProbeError, RemoteError, RetryPolicy};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Remote operations, for scripting and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Synthesize,
    Hypothesize,
    Rescan,
    Refine,
    GenerateAsset,
    DescribeBlueprint,
    ValidateCredential,
}

pub fn quota_error() -> RemoteError {
    RemoteError::with_status(429, "resource exhausted")
}

pub fn transient_error() -> RemoteError {
    RemoteError::with_status(503, "service unavailable")
}

pub fn permanent_error() -> RemoteError {
    RemoteError::with_status(400, "invalid argument")
}

#[derive(Debug)]
struct Script<T> {
    queue: VecDeque<Result<T, RemoteError>>,
    always: Option<RemoteError>,
    calls: usize,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            always: None,
            calls: 0,
        }
    }
}

impl<T> Script<T> {
    /// Scripted answer, or `None` to use the default answer
    fn next(&mut self) -> Option<Result<T, RemoteError>> {
        self.calls += 1;
        self.queue
            .pop_front()
            .or_else(|| self.always.clone().map(Err))
    }
}

#[derive(Debug, Default)]
struct Scripts {
    synthesize: Script<ProtocolDraft>,
    hypothesize: Script<Vec<Hypothesis>>,
    rescan: Script<Vec<Ingredient>>,
    refine: Script<Vec<Ingredient>>,
    generate_asset: Script<ImageBytes>,
    describe_blueprint: Script<DescriptiveBlueprint>,
    validate_credential: Script<()>,
}

/// Remote service answering from per-operation scripts
///
/// Scripted answers are consumed in order. Once a script is empty the
/// operation either keeps failing with the error set by
/// [`ScriptedRemote::fail_always`] or returns a well-formed default answer.
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    scripts: Mutex<Scripts>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer (use with paused time)
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn script_synthesize(&self, answer: Result<ProtocolDraft, RemoteError>) {
        self.scripts.lock().synthesize.queue.push_back(answer);
    }

    pub fn script_hypothesize(&self, answer: Result<Vec<Hypothesis>, RemoteError>) {
        self.scripts.lock().hypothesize.queue.push_back(answer);
    }

    pub fn script_rescan(&self, answer: Result<Vec<Ingredient>, RemoteError>) {
        self.scripts.lock().rescan.queue.push_back(answer);
    }

    pub fn script_refine(&self, answer: Result<Vec<Ingredient>, RemoteError>) {
        self.scripts.lock().refine.queue.push_back(answer);
    }

    pub fn script_asset(&self, answer: Result<ImageBytes, RemoteError>) {
        self.scripts.lock().generate_asset.queue.push_back(answer);
    }

    pub fn script_blueprint(&self, answer: Result<DescriptiveBlueprint, RemoteError>) {
        self.scripts.lock().describe_blueprint.queue.push_back(answer);
    }

    pub fn script_validation(&self, answer: Result<(), RemoteError>) {
        self.scripts.lock().validate_credential.queue.push_back(answer);
    }

    /// Fail `op` with `error` whenever its script is empty
    pub fn fail_always(&self, op: RemoteOp, error: RemoteError) {
        let mut scripts = self.scripts.lock();
        let always = Some(error);
        match op {
            RemoteOp::Synthesize => scripts.synthesize.always = always,
            RemoteOp::Hypothesize => scripts.hypothesize.always = always,
            RemoteOp::Rescan => scripts.rescan.always = always,
            RemoteOp::Refine => scripts.refine.always = always,
            RemoteOp::GenerateAsset => scripts.generate_asset.always = always,
            RemoteOp::DescribeBlueprint => scripts.describe_blueprint.always = always,
            RemoteOp::ValidateCredential => scripts.validate_credential.always = always,
        }
    }

    /// Attempts made against `op`
    pub fn calls(&self, op: RemoteOp) -> usize {
        let scripts = self.scripts.lock();
        match op {
            RemoteOp::Synthesize => scripts.synthesize.calls,
            RemoteOp::Hypothesize => scripts.hypothesize.calls,
            RemoteOp::Rescan => scripts.rescan.calls,
            RemoteOp::Refine => scripts.refine.calls,
            RemoteOp::GenerateAsset => scripts.generate_asset.calls,
            RemoteOp::DescribeBlueprint => scripts.describe_blueprint.calls,
            RemoteOp::ValidateCredential => scripts.validate_credential.calls,
        }
    }

    async fn pause(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteIntelligence for ScriptedRemote {
    async fn synthesize(
        &self,
        ingredients: &[Ingredient],
        _preferences: &Preferences,
    ) -> Result<ProtocolDraft, RemoteError> {
        self.pause().await;
        let scripted = self.scripts.lock().synthesize.next();
        scripted.unwrap_or_else(|| {
            let names: Vec<&str> = ingredients.iter().map(|i| i.name.as_str()).collect();
            Ok(draft("Remote Supper", 5, &names))
        })
    }

    async fn hypothesize(&self, _ingredients: &[Ingredient]) -> Result<Vec<Hypothesis>, RemoteError> {
        self.pause().await;
        let scripted = self.scripts.lock().hypothesize.next();
        scripted.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn rescan(
        &self,
        _capture: &Capture,
        _hypotheses: &[Hypothesis],
    ) -> Result<Vec<Ingredient>, RemoteError> {
        self.pause().await;
        let scripted = self.scripts.lock().rescan.next();
        scripted.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn refine(&self, ingredients: &[Ingredient]) -> Result<Vec<Ingredient>, RemoteError> {
        self.pause().await;
        let scripted = self.scripts.lock().refine.next();
        scripted.unwrap_or_else(|| Ok(ingredients.to_vec()))
    }

    async fn generate_asset(&self, kind: AssetKind, _subject: &str) -> Result<ImageBytes, RemoteError> {
        self.pause().await;
        let scripted = self.scripts.lock().generate_asset.next();
        scripted.unwrap_or_else(|| Ok(ImageBytes::new("image/png", kind.label().as_bytes().to_vec())))
    }

    async fn describe_blueprint(
        &self,
        subject: &str,
        _description: &str,
    ) -> Result<DescriptiveBlueprint, RemoteError> {
        self.pause().await;
        let scripted = self.scripts.lock().describe_blueprint.next();
        scripted.unwrap_or_else(|| Ok(remote_blueprint(subject)))
    }

    async fn validate_credential(&self, _credential: &str) -> Result<(), RemoteError> {
        self.pause().await;
        let scripted = self.scripts.lock().validate_credential.next();
        scripted.unwrap_or(Ok(()))
    }
}

/// Network probe with a switchable answer
#[derive(Debug)]
pub struct StaticNetwork {
    up: AtomicBool,
}

impl StaticNetwork {
    pub fn new(up: bool) -> Self {
        Self {
            up: AtomicBool::new(up),
        }
    }

    pub fn set(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

impl NetworkProbe for StaticNetwork {
    fn network_up(&self) -> Result<bool, ProbeError> {
        Ok(self.up.load(Ordering::SeqCst))
    }
}

/// Credential provider with a replaceable value
#[derive(Debug)]
pub struct StaticCredential {
    value: Mutex<Option<String>>,
}

impl StaticCredential {
    pub fn present() -> Self {
        Self {
            value: Mutex::new(Some("test-key".to_string())),
        }
    }

    pub fn absent() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    pub fn set(&self, value: Option<&str>) {
        *self.value.lock() = value.map(str::to_string);
    }
}

impl CredentialProvider for StaticCredential {
    fn credential(&self) -> Result<Option<String>, ProbeError> {
        Ok(self.value.lock().clone())
    }
}

/// Perceiver returning a fixed detection result
#[derive(Debug)]
pub struct StaticPerceiver {
    answer: Mutex<Result<Vec<Ingredient>, RemoteError>>,
}

impl StaticPerceiver {
    pub fn detecting(items: Vec<Ingredient>) -> Self {
        Self {
            answer: Mutex::new(Ok(items)),
        }
    }

    pub fn failing(error: RemoteError) -> Self {
        Self {
            answer: Mutex::new(Err(error)),
        }
    }

    pub fn set(&self, answer: Result<Vec<Ingredient>, RemoteError>) {
        *self.answer.lock() = answer;
    }
}

#[async_trait]
impl Perceiver for StaticPerceiver {
    async fn detect(&self, _capture: &Capture) -> Result<Vec<Ingredient>, RemoteError> {
        self.answer.lock().clone()
    }
}

pub fn ingredient(name: &str, confidence: f64) -> Ingredient {
    Ingredient::new(name, confidence)
}

pub fn draft(title: &str, steps: usize, uses: &[&str]) -> ProtocolDraft {
    let mut draft = ProtocolDraft::new(title).cites("scripted remote");
    for i in 1..=steps {
        draft = draft.step(format!("Step {i}"));
    }
    for name in uses {
        draft = draft.uses(*name);
    }
    draft
}

pub fn capture() -> Capture {
    Capture::new("image/jpeg", vec![0xFF, 0xD8, 0xFF])
}

pub fn remote_blueprint(subject: &str) -> DescriptiveBlueprint {
    DescriptiveBlueprint {
        plating: format!("remote plating for {subject}"),
        colors: "remote colors".into(),
        textures: "remote textures".into(),
        garnish: "remote garnish".into(),
        lighting: "remote lighting".into(),
        composition: "remote composition".into(),
    }
}

/// Default configuration with short backoff delays
pub fn fast_config() -> GalleyConfig {
    GalleyConfig::new()
        .with_critical_retry(RetryPolicy::critical().with_initial_delay(Duration::from_millis(10)))
        .with_asset_retry(RetryPolicy::asset().with_initial_delay(Duration::from_millis(5)))
}

/// A session wired to scripted collaborators
#[derive(Debug)]
pub struct Harness {
    pub remote: Arc<ScriptedRemote>,
    pub perceiver: Arc<StaticPerceiver>,
    pub network: Arc<StaticNetwork>,
    pub credentials: Arc<StaticCredential>,
    pub session: Session,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: GalleyConfig) -> Self {
        Self::try_build(config).unwrap()
    }

    pub fn try_build(config: GalleyConfig) -> Result<Self, ConfigError> {
        let remote = Arc::new(ScriptedRemote::new());
        let perceiver = Arc::new(StaticPerceiver::detecting(Vec::new()));
        let network = Arc::new(StaticNetwork::new(true));
        let credentials = Arc::new(StaticCredential::present());

        let session = Session::builder(
            remote.clone(),
            perceiver.clone(),
            network.clone(),
            credentials.clone(),
        )
        .with_config(config)
        .build()?;

        Ok(Self {
            remote,
            perceiver,
            network,
            credentials,
            session,
        })
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
