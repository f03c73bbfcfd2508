//! Session failover latch
//!
//! Once tripped, every critical call short-circuits without touching the
//! network until [`FailoverLatch::reset`]. Tripping is crate-private: only
//! [`crate::CriticalCaller`] can set the latch.

use tokio::sync::watch;

/// Session-scoped failover flag
///
/// Backed by a watch channel so observers can react to trips and resets;
/// `send_if_modified` makes each transition an atomic read-modify-write.
#[derive(Debug)]
pub struct FailoverLatch {
    state: watch::Sender<bool>,
}

impl FailoverLatch {
    /// Create a cleared latch
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self { state }
    }

    /// Whether the latch is set
    #[inline]
    #[must_use]
    pub fn is_latched(&self) -> bool {
        *self.state.borrow()
    }

    /// Set the latch. Returns `true` if this call changed its state.
    pub(crate) fn trip(&self) -> bool {
        self.state.send_if_modified(|latched| {
            if *latched {
                false
            } else {
                *latched = true;
                true
            }
        })
    }

    /// Clear the latch. Returns `true` if it was set.
    pub fn reset(&self) -> bool {
        self.state.send_if_modified(|latched| {
            if *latched {
                *latched = false;
                true
            } else {
                false
            }
        })
    }

    /// Observe trips and resets
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for FailoverLatch {
    fn default() -> Self {
        Self::new()
    }
}
