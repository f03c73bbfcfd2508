//! Galley Resilience - failure isolation for remote calls
//!
//! Two call strategies share one retry loop but differ in what they may touch:
//! - [`CriticalCaller`] retries transient failures and trips the session's
//!   [`FailoverLatch`] on quota exhaustion
//! - [`AssetCaller`] retries transient failures and never reads or writes the latch
//!
//! The [`HealthMonitor`] derives the session's reachability from the network
//! probe, the credential provider and the latch.
//!
//! # Example
//!
//! ```rust,ignore
//! use galley_resilience::{CallPolicy, CancelToken, CriticalCaller, FailoverLatch, RetryPolicy};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let latch = Arc::new(FailoverLatch::new());
//! let caller = CriticalCaller::new(RetryPolicy::critical(), latch.clone());
//!
//! let answer = caller
//!     .call("synthesize", &CancelToken::new(), || async { remote_call().await })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod cancel;
pub mod caller;
pub mod classify;
pub mod error;
pub mod health;
pub mod latch;
pub mod policy;

pub use cancel::CancelToken;
pub use caller::{AssetCaller, CallClass, CallPolicy, CriticalCaller};
pub use classify::classify;
pub use error::{CallError, FailureClass, PolicyError, ProbeError, RemoteError};
pub use health::{CredentialProvider, EnvCredentialProvider, HealthMonitor, HealthSignal, NetworkProbe};
pub use latch::FailoverLatch;
pub use policy::RetryPolicy;
