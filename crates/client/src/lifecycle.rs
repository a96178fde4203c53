//! Owner liveness tracking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag telling asynchronous continuations whether their owner is
/// still around.
///
/// Created alive. Once [`Liveness::invalidate`] is called, every clone
/// observes the owner as gone and must skip further state writes.
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the owner as gone. Idempotent.
    pub fn invalidate(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_is_shared_between_clones() {
        let liveness = Liveness::new();
        let clone = liveness.clone();
        assert!(clone.is_alive());

        liveness.invalidate();
        assert!(!clone.is_alive());

        clone.invalidate();
        assert!(!liveness.is_alive());
    }
}
