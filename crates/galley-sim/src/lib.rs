//! Galley Sim - chaos simulation and offline scoring for Galley sessions

#![warn(unreachable_pub)]

pub mod chaos;
pub mod score;
pub mod simulator;

pub use chaos::{AlwaysOnline, ChaosRates, ChaosRemote, ChaosTally, PantryPerceiver};
pub use score::ScoreInput;
pub use simulator::{
    compressed_backoff, run_simulator, InvariantCheck, SimulationReport, SimulationStats,
    SimulatorConfig, Violation,
};
