//! Cooperative cancellation tokens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared between a session owner and its in-flight
/// tasks.
///
/// Cancellation is cooperative, not preemptive: an in-flight network
/// call cannot be aborted, only its result discarded. Holders must
/// re-check the token immediately after every suspension point, before
/// touching shared state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Synchronous from the caller's perspective;
    /// in-flight work observes it at its next check.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}
