//! Session confirmation memory

use galley_fusion::MemoryBias;
use parking_lot::RwLock;

/// In-memory tally of confirmed ingredient names for one session
#[derive(Debug, Default)]
pub struct ConfirmationMemory {
    inner: RwLock<MemoryBias>,
}

impl ConfirmationMemory {
    /// Empty memory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an existing tally
    #[must_use]
    pub fn with_bias(bias: MemoryBias) -> Self {
        Self {
            inner: RwLock::new(bias),
        }
    }

    /// Record one confirmation of `name`
    pub fn record(&self, name: &str) {
        self.inner.write().record(name);
    }

    /// Prior confirmations of `name`
    #[must_use]
    pub fn count(&self, name: &str) -> u32 {
        self.inner.read().count(name)
    }

    /// Copy of the current tally
    #[must_use]
    pub fn snapshot(&self) -> MemoryBias {
        self.inner.read().clone()
    }
}
