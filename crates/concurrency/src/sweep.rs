//! The periodic expiration sweep (spec §4.1 "Timeout/cleanup sweep").
//!
//! `TransactionManager::expire_timed_out` does the actual work under the
//! state lock; this module only owns the background thread that calls it
//! on `tx_cleanup_interval_seconds`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, trace};

use crate::manager::TransactionManager;

/// Handle to a running sweep thread. Dropping it does not stop the
/// thread — call `stop` explicitly, mirroring the teacher's background
/// tasks, which are shut down by their owner rather than on drop.
pub struct SweepHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Signal the sweep thread to stop and wait for it to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn a thread that calls `expire_timed_out` every `interval`.
pub fn spawn(manager: Arc<TransactionManager>, interval: Duration) -> SweepHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let join = std::thread::spawn(move || {
        while !stop_flag.load(Ordering::SeqCst) {
            std::thread::sleep(interval);
            if stop_flag.load(Ordering::SeqCst) {
                break;
            }
            match manager.expire_timed_out() {
                Ok(0) => trace!("expiration sweep found nothing to invalidate"),
                Ok(n) => trace!(invalidated = n, "expiration sweep invalidated timed-out transactions"),
                Err(e) => error!(error = %e, "expiration sweep failed"),
            }
        }
    });

    SweepHandle {
        stop,
        join: Some(join),
    }
}
