//! Galley Fusion - composite confidence scoring
//!
//! Blends three signals into one integer score in `[0, 100]`:
//! - perception: per-ingredient confidence, lifted by confirmation and by
//!   how often the session has confirmed that ingredient before
//! - coherence: whether the protocol is detailed enough to trust
//! - constraint satisfaction: how many referenced ingredients were actually perceived
//!
//! Scoring is deterministic and total: degenerate inputs resolve by
//! convention, never by error.

#![warn(unreachable_pub)]

pub mod bias;
pub mod params;
pub mod score;

pub use bias::MemoryBias;
pub use params::{FusionError, FusionParams};
pub use score::{composite_confidence, ConfidenceBreakdown, ConfidenceFusion};
