// Single-run guard - at most one generation run at a time
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    active: Arc<AtomicBool>,
}

/// Ownership of the active run. Dropping it ends the run, whatever the exit path.
#[derive(Debug)]
pub struct RunToken {
    active: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the run, or `None` if another run holds it
    pub fn try_acquire(&self) -> Option<RunToken> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunToken {
                active: self.active.clone(),
            })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for RunToken {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
