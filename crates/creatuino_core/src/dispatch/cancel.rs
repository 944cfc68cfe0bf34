//! Cooperative cancellation shared between the CLI and the workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Handle for requesting and observing a stop.
///
/// Clones share state. Once cancelled, workers stop claiming jobs; jobs
/// already running may finish within the shutdown grace period.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    requested_at: Arc<Mutex<Option<Instant>>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Repeated calls keep the first request time.
    pub fn cancel(&self) {
        let mut requested_at = self.requested_at.lock();
        if requested_at.is_none() {
            *requested_at = Some(Instant::now());
        }
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Whether in-flight work has outlived the grace period after a stop request.
    pub fn grace_expired(&self, grace: Duration) -> bool {
        match *self.requested_at.lock() {
            Some(at) => at.elapsed() >= grace,
            None => false,
        }
    }
}
