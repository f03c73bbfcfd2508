//! Call strategies
//!
//! Both strategies run the same retry loop. They differ only in the gate
//! checked before each attempt and in how a terminal failure is reported:
//! the critical strategy consults and trips the failover latch, the asset
//! strategy holds no reference to it at all.

use crate::cancel::CancelToken;
use crate::classify::classify;
use crate::error::{CallError, FailureClass, RemoteError};
use crate::latch::FailoverLatch;
use crate::policy::RetryPolicy;
use std::future::Future;
use std::sync::Arc;

/// Which class of call a strategy serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallClass {
    /// Authoritative for the session's reachability
    Critical,
    /// Cosmetic or optional; never affects session state
    Asset,
}

/// Retry-with-backoff wrapper around a remote attempt
#[async_trait::async_trait]
pub trait CallPolicy: Send + Sync + std::fmt::Debug {
    /// Class of calls this strategy serves
    fn class(&self) -> CallClass;

    /// Attempt budget and backoff schedule
    fn policy(&self) -> &RetryPolicy;

    /// Whether a failure of this class ends the call without retrying
    fn is_fatal(&self, class: FailureClass) -> bool {
        class != FailureClass::Transient
    }

    /// Run `attempt` until it succeeds, fails terminally, or the budget runs out
    ///
    /// # Errors
    /// Returns the terminal [`CallError`] for this strategy.
    async fn call<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancelToken,
        attempt: F,
    ) -> Result<T, CallError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, RemoteError>> + Send;
}

/// Strategy for the authoritative synthesis path
#[derive(Debug, Clone)]
pub struct CriticalCaller {
    policy: RetryPolicy,
    latch: Arc<FailoverLatch>,
}

impl CriticalCaller {
    /// Create a critical caller bound to a session latch
    #[must_use]
    pub fn new(policy: RetryPolicy, latch: Arc<FailoverLatch>) -> Self {
        Self { policy, latch }
    }

    /// The latch this caller may trip
    #[inline]
    #[must_use]
    pub fn latch(&self) -> &Arc<FailoverLatch> {
        &self.latch
    }
}

#[async_trait::async_trait]
impl CallPolicy for CriticalCaller {
    fn class(&self) -> CallClass {
        CallClass::Critical
    }

    fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn call<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancelToken,
        attempt: F,
    ) -> Result<T, CallError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, RemoteError>> + Send,
    {
        let gate = || {
            if self.latch.is_latched() {
                tracing::debug!(call = label, "critical call pre-empted by failover latch");
                Err(CallError::SessionFailoverActive)
            } else {
                Ok(())
            }
        };

        let terminal = |class: FailureClass, error: RemoteError| match class {
            FailureClass::QuotaExceeded => {
                if self.latch.trip() {
                    tracing::error!(call = label, error = %error, "quota exhausted, session failover latched");
                }
                CallError::QuotaExceeded(error)
            }
            FailureClass::Transient | FailureClass::Permanent => CallError::Permanent(error),
        };

        retry_loop(
            &self.policy,
            label,
            cancel,
            attempt,
            gate,
            |class| self.is_fatal(class),
            terminal,
        )
        .await
    }
}

/// Strategy for optional enhancement and visual calls
#[derive(Debug, Clone)]
pub struct AssetCaller {
    policy: RetryPolicy,
}

impl AssetCaller {
    /// Create an asset caller
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl Default for AssetCaller {
    fn default() -> Self {
        Self::new(RetryPolicy::asset())
    }
}

#[async_trait::async_trait]
impl CallPolicy for AssetCaller {
    fn class(&self) -> CallClass {
        CallClass::Asset
    }

    fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn call<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancelToken,
        attempt: F,
    ) -> Result<T, CallError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, RemoteError>> + Send,
    {
        retry_loop(
            &self.policy,
            label,
            cancel,
            attempt,
            || Ok(()),
            |class| self.is_fatal(class),
            |_, error| CallError::Permanent(error),
        )
        .await
    }
}

async fn retry_loop<T, F, Fut, G, P, H>(
    policy: &RetryPolicy,
    label: &str,
    cancel: &CancelToken,
    mut attempt: F,
    gate: G,
    is_fatal: P,
    terminal: H,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
    G: Fn() -> Result<(), CallError>,
    P: Fn(FailureClass) -> bool,
    H: Fn(FailureClass, RemoteError) -> CallError,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay();
    let mut attempts = 0u32;

    loop {
        cancel.checkpoint()?;
        gate()?;
        attempts += 1;

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CallError::Cancelled),
            outcome = attempt() => outcome,
        };

        let error = match outcome {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(call = label, attempts, "call recovered after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let class = classify(&error);
        if is_fatal(class) {
            tracing::debug!(call = label, attempts, ?class, error = %error, "terminal failure");
            return Err(terminal(class, error));
        }

        if attempts >= max_attempts {
            tracing::warn!(call = label, attempts, error = %error, "retry budget exhausted");
            return Err(CallError::RetriesExhausted {
                attempts,
                last: error,
            });
        }

        tracing::debug!(
            call = label,
            attempt = attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "transient failure, backing off"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CallError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
        delay = policy.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Replays a fixed script of outcomes and counts attempts
    #[derive(Debug, Default)]
    struct Script {
        outcomes: Mutex<VecDeque<Result<u32, RemoteError>>>,
        attempts: AtomicU32,
    }

    impl Script {
        fn new(outcomes: Vec<Result<u32, RemoteError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                attempts: AtomicU32::new(0),
            })
        }

        fn attempt(self: &Arc<Self>) -> impl Future<Output = Result<u32, RemoteError>> + Send {
            let this = Arc::clone(self);
            async move {
                this.attempts.fetch_add(1, Ordering::SeqCst);
                this.outcomes
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Err(RemoteError::new("script exhausted")))
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    fn transient() -> Result<u32, RemoteError> {
        Err(RemoteError::with_status(503, "service unavailable"))
    }

    fn quota() -> Result<u32, RemoteError> {
        Err(RemoteError::new("RESOURCE_EXHAUSTED: quota exceeded"))
    }

    fn critical() -> (CriticalCaller, Arc<FailoverLatch>) {
        let latch = Arc::new(FailoverLatch::new());
        (CriticalCaller::new(RetryPolicy::critical(), latch.clone()), latch)
    }

    #[tokio::test(start_paused = true)]
    async fn critical_success_first_try() {
        let (caller, latch) = critical();
        let script = Script::new(vec![Ok(7)]);
        let result = caller.call("t", &CancelToken::new(), || script.attempt()).await;
        assert_eq!(result, Ok(7));
        assert_eq!(script.attempts(), 1);
        assert!(!latch.is_latched());
    }

    #[tokio::test(start_paused = true)]
    async fn critical_retries_transient_with_growing_delay() {
        let (caller, latch) = critical();
        let script = Script::new(vec![transient(), transient(), transient(), transient()]);
        let start = Instant::now();

        let result = caller.call("t", &CancelToken::new(), || script.attempt()).await;

        assert!(matches!(result, Err(CallError::RetriesExhausted { attempts: 4, .. })));
        assert_eq!(script.attempts(), 4);
        let expected: Duration = RetryPolicy::critical().delay_schedule().iter().sum();
        assert_eq!(start.elapsed(), expected);
        assert!(!latch.is_latched());
    }

    #[tokio::test(start_paused = true)]
    async fn critical_recovers_after_transient() {
        let (caller, _) = critical();
        let script = Script::new(vec![transient(), Ok(3)]);
        let start = Instant::now();
        let result = caller.call("t", &CancelToken::new(), || script.attempt()).await;
        assert_eq!(result, Ok(3));
        assert_eq!(start.elapsed(), Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn critical_quota_trips_latch_without_retry() {
        let (caller, latch) = critical();
        let script = Script::new(vec![quota(), Ok(1)]);

        let result = caller.call("t", &CancelToken::new(), || script.attempt()).await;

        assert!(matches!(result, Err(CallError::QuotaExceeded(_))));
        assert_eq!(script.attempts(), 1);
        assert!(latch.is_latched());
    }

    #[tokio::test(start_paused = true)]
    async fn latched_critical_makes_no_attempt() {
        let (caller, latch) = critical();
        latch.trip();
        let script = Script::new(vec![Ok(1)]);

        let result = caller.call("t", &CancelToken::new(), || script.attempt()).await;

        assert_eq!(result, Err(CallError::SessionFailoverActive));
        assert_eq!(script.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn critical_permanent_is_not_retried() {
        let (caller, latch) = critical();
        let script = Script::new(vec![Err(RemoteError::new("invalid argument")), Ok(1)]);
        let result = caller.call("t", &CancelToken::new(), || script.attempt()).await;
        assert!(matches!(result, Err(CallError::Permanent(_))));
        assert_eq!(script.attempts(), 1);
        assert!(!latch.is_latched());
    }

    #[tokio::test(start_paused = true)]
    async fn asset_quota_is_terminal_and_never_latches() {
        let (critical, latch) = critical();
        let asset = AssetCaller::default();
        let failover = latch.subscribe();
        let cancel = CancelToken::new();
        let script = Script::new(vec![quota(), Ok(1)]);

        let result = asset.call("asset", &cancel, || script.attempt()).await;

        assert!(matches!(result, Err(CallError::Permanent(_))));
        assert_eq!(script.attempts(), 1);
        assert!(!failover.has_changed().unwrap());

        let follow_up = Script::new(vec![Ok(2)]);
        let result = critical.call("critical", &cancel, || follow_up.attempt()).await;
        assert_eq!(result, Ok(2));
        assert_eq!(follow_up.attempts(), 1);
        assert!(!latch.is_latched());
    }

    #[tokio::test(start_paused = true)]
    async fn asset_uses_smaller_budget() {
        let caller = AssetCaller::default();
        let script = Script::new(vec![transient(), transient(), transient(), Ok(1)]);
        let start = Instant::now();

        let result = caller.call("asset", &CancelToken::new(), || script.attempt()).await;

        assert!(matches!(result, Err(CallError::RetriesExhausted { attempts: 3, .. })));
        assert_eq!(start.elapsed(), Duration::from_millis(500 + 750));
    }

    #[tokio::test(start_paused = true)]
    async fn asset_calls_succeed_while_latched() {
        let (critical, latch) = critical();
        let trip = Script::new(vec![quota()]);
        let _ = critical.call("c", &CancelToken::new(), || trip.attempt()).await;
        assert!(latch.is_latched());

        let asset = AssetCaller::default();
        let script = Script::new(vec![Ok(9)]);
        assert_eq!(asset.call("a", &CancelToken::new(), || script.attempt()).await, Ok(9));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_makes_no_attempt() {
        let caller = AssetCaller::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let script = Script::new(vec![Ok(1)]);
        assert_eq!(
            caller.call("a", &cancel, || script.attempt()).await,
            Err(CallError::Cancelled)
        );
        assert_eq!(script.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_backoff() {
        let (caller, _) = critical();
        let cancel = CancelToken::new();
        let script = Script::new(vec![transient(), Ok(1)]);

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
            })
        };

        let result = caller.call("t", &cancel, || script.attempt()).await;
        canceller.await.unwrap();

        assert_eq!(result, Err(CallError::Cancelled));
        assert_eq!(script.attempts(), 1);
    }

    #[test]
    fn classes() {
        let (critical, _) = critical();
        assert_eq!(critical.class(), CallClass::Critical);
        assert_eq!(AssetCaller::default().class(), CallClass::Asset);
        assert!(!critical.is_fatal(FailureClass::Transient));
        assert!(critical.is_fatal(FailureClass::QuotaExceeded));
        assert!(AssetCaller::default().is_fatal(FailureClass::Permanent));
    }
}
