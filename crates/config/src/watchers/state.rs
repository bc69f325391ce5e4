//! Once-only watch lifecycle tracking

use crate::core::{ConfigError, ConfigResult};
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a provider's watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// `watch()` has not been called
    Unarmed,
    /// A watch is delivering notifications
    Armed,
    /// Delivery stopped (closed, removed or failed); cannot be re-armed
    Terminated,
}

const UNARMED: u8 = 0;
const ARMED: u8 = 1;
const TERMINATED: u8 = 2;

/// Atomic guard enforcing that `watch()` succeeds at most once per provider
#[derive(Debug, Default)]
pub struct WatchLatch(AtomicU8);

impl WatchLatch {
    /// A latch in the [`WatchState::Unarmed`] state
    pub const fn new() -> Self {
        Self(AtomicU8::new(UNARMED))
    }

    /// Move from unarmed to armed
    ///
    /// Fails with [`ConfigError::WatchAlreadyActive`] from any other state,
    /// including after termination.
    pub fn arm(&self, provider: &str) -> ConfigResult<()> {
        self.0
            .compare_exchange(UNARMED, ARMED, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ConfigError::already_watching(provider))
    }

    /// Mark the watch as finished for good
    pub fn terminate(&self) {
        self.0.store(TERMINATED, Ordering::Release);
    }

    /// Current state
    pub fn state(&self) -> WatchState {
        match self.0.load(Ordering::Acquire) {
            UNARMED => WatchState::Unarmed,
            ARMED => WatchState::Armed,
            _ => WatchState::Terminated,
        }
    }
}
