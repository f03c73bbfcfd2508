//! Galley Core - staged culinary pipelines over an unreliable remote service
//!
//! The core:
//! - Turns a capture into an ingredient set (perception pipeline)
//! - Turns an ingredient set into a protocol, visuals and a composite
//!   confidence score (synthesis pipeline)
//! - Keeps making progress when the remote service fails, substituting a
//!   fallback at every stage
//! - Isolates failures: only protocol synthesis can trip the session's
//!   failover latch
//!
//! # Example
//!
//! ```rust,ignore
//! use galley_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::builder(remote, perceiver, network, credentials)
//!     .with_config(GalleyConfig::load("galley.toml")?)
//!     .build()?;
//!
//! let cancel = CancelToken::new();
//! let perceived = session.run_perception_pipeline(&capture, &cancel).await?;
//! let outcome = session
//!     .run_synthesis_pipeline(&perceived.ingredients, &Preferences::default(), &cancel)
//!     .await?;
//!
//! println!("{} ({}%)", outcome.protocol.title, outcome.composite());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod fallback;
pub mod memory;
pub mod pipeline;
pub mod remote;
pub mod session;

pub use config::{GalleyConfig, PerceptionConfig, SynthesisConfig};
pub use error::{ConfigError, PipelineError};
pub use fallback::{BlueprintWriter, PantrySynthesizer};
pub use memory::ConfirmationMemory;
pub use pipeline::{
    DegradeReason, PerceptionOutcome, ProgressEvent, ProgressLog, StageDegradation, StageId,
    StageOutcome, StageStatus, SynthesisOutcome, VisualSet,
};
pub use remote::{OfflineSynthesizer, Perceiver, RemoteIntelligence};
pub use session::{Session, SessionBuilder};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Galley Core
    pub use crate::{
        GalleyConfig, OfflineSynthesizer, PerceptionOutcome, Perceiver, PipelineError,
        RemoteIntelligence, Session, SessionBuilder, StageId, StageStatus, SynthesisOutcome,
    };
    pub use galley_model::{Capture, Ingredient, Preferences, Protocol, VisualArtifact};
    pub use galley_resilience::{CancelToken, CredentialProvider, NetworkProbe, RemoteError};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
