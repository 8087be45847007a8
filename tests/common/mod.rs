use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::Level;

/// Routes the crate's trace output through the test harness so it shows up
/// next to failing tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_test_writer()
        .with_thread_ids(true)
        .try_init();
}

/// Aborts the test binary if a deadlocked test outlives `duration`.
pub struct DeadlockGuard {
    finished: Arc<AtomicBool>,
}

impl Drop for DeadlockGuard {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

pub fn deadlock_guard(duration: Duration) -> DeadlockGuard {
    let finished = Arc::new(AtomicBool::new(false));
    let watched = Arc::clone(&finished);
    std::thread::spawn(move || {
        std::thread::sleep(duration);
        if !watched.load(Ordering::SeqCst) {
            eprintln!("test still blocked after {}s, aborting", duration.as_secs());
            std::process::abort();
        }
    });
    DeadlockGuard { finished }
}
