//! Cooperative cancellation shared between a borrow handle and its pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared, idempotent cancellation flag.
///
/// Cloning yields a handle to the same flag. Nothing is preempted: long
/// operations poll [`is_cancelled`](Self::is_cancelled) at chunk boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Safe to call any number of times from any thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(flag.is_cancelled());
    }
}
