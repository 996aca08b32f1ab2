//! Progress reporting.
//!
//! Searches report their phase, a progress counter and status messages
//! through a [`Progress`] collaborator. [`TracingProgress`] forwards
//! everything to `tracing`.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

/// Receiver of phase, progress and status updates.
pub trait Progress: Send + Sync + Debug {
    /// Starts a new phase whose progress runs up to `total`.
    fn set_phase(&self, phase: &str, total: u64);

    /// Updates the progress counter of the current phase.
    fn set_progress(&self, progress: u64);

    fn info(&self, message: &str);

    fn debug(&self, message: &str);
}

/// Progress that logs through `tracing` and remembers the current state.
#[derive(Debug, Default)]
pub struct TracingProgress {
    phase: Mutex<String>,
    progress: AtomicU64,
    total: AtomicU64,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the current phase.
    pub fn phase(&self) -> String {
        self.phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Progress of the current phase in percent.
    pub fn percent(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            (100.0 * self.progress() as f64 / total as f64).min(100.0)
        }
    }
}

impl Progress for TracingProgress {
    fn set_phase(&self, phase: &str, total: u64) {
        let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != phase {
            info!(event = "phase", phase = phase);
            *current = phase.to_string();
        }
        self.total.store(total, Ordering::Relaxed);
        self.progress.store(0, Ordering::Relaxed);
    }

    fn set_progress(&self, progress: u64) {
        self.progress.store(progress, Ordering::Relaxed);
    }

    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn debug(&self, message: &str) {
        debug!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let progress = TracingProgress::new();
        assert_eq!(progress.percent(), 0.0);

        progress.set_phase("Hill Climbing...", 200);
        progress.set_progress(50);
        assert_eq!(progress.phase(), "Hill Climbing...");
        assert_eq!(progress.percent(), 25.0);

        progress.set_progress(500);
        assert_eq!(progress.percent(), 100.0);

        progress.set_phase("Great Deluge...", 10);
        assert_eq!(progress.progress(), 0);
    }
}
