//! Collaborator interfaces
//!
//! The remote intelligence service, the on-device perceiver and the offline
//! synthesizer are external to Galley. Pipelines only see these traits.

use galley_model::{
    AssetKind, Capture, DescriptiveBlueprint, Hypothesis, ImageBytes, Ingredient, Preferences,
    ProtocolDraft,
};
use galley_resilience::RemoteError;

/// The unreliable, rate-limited remote intelligence service
///
/// Each method is one attempt; retries and failure isolation are applied by
/// the caller.
#[async_trait::async_trait]
pub trait RemoteIntelligence: Send + Sync {
    /// Synthesize a protocol (critical path)
    async fn synthesize(
        &self,
        ingredients: &[Ingredient],
        preferences: &Preferences,
    ) -> Result<ProtocolDraft, RemoteError>;

    /// Propose ingredients perception may have missed
    async fn hypothesize(&self, ingredients: &[Ingredient]) -> Result<Vec<Hypothesis>, RemoteError>;

    /// Re-examine the capture for the hypothesized ingredients
    async fn rescan(
        &self,
        capture: &Capture,
        hypotheses: &[Hypothesis],
    ) -> Result<Vec<Ingredient>, RemoteError>;

    /// Canonicalize and deduplicate an ingredient set
    async fn refine(&self, ingredients: &[Ingredient]) -> Result<Vec<Ingredient>, RemoteError>;

    /// Generate an image
    async fn generate_asset(&self, kind: AssetKind, subject: &str) -> Result<ImageBytes, RemoteError>;

    /// Describe a visual in words
    async fn describe_blueprint(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<DescriptiveBlueprint, RemoteError>;

    /// Check that a credential is accepted by the service
    async fn validate_credential(&self, credential: &str) -> Result<(), RemoteError>;
}

/// Local ingredient detection
#[async_trait::async_trait]
pub trait Perceiver: Send + Sync {
    /// Detect ingredients in a capture
    async fn detect(&self, capture: &Capture) -> Result<Vec<Ingredient>, RemoteError>;
}

/// Local protocol synthesis used when the remote path is unavailable
///
/// Must always produce a draft.
pub trait OfflineSynthesizer: Send + Sync {
    /// Synthesize a protocol draft
    fn synthesize(&self, ingredients: &[Ingredient], preferences: &Preferences) -> ProtocolDraft;
}
