//! Cooperative cancellation (§4.8 "Cancellation").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Shared flag plus a `Condvar` so suspension points (bandwidth sleep,
/// connection-pool wait, volume-request wait, §4.8 "Suspension points") can
/// be woken the instant cancellation is raised, instead of only noticing it
/// on their next poll tick.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    pair: Arc<(Mutex<()>, Condvar)>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)), pair: Arc::new((Mutex::new(()), Condvar::new())) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raises cancellation and wakes every thread parked in `wait_timeout`.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        let (_lock, cvar) = &*self.pair;
        cvar.notify_all();
    }

    /// Sleeps up to `timeout`, returning early the moment `cancel()` is
    /// called elsewhere. Used by bandwidth throttling and volume-request
    /// waits instead of a plain `thread::sleep` so cancellation is prompt.
    pub fn wait_timeout(&self, timeout: Duration) {
        if self.is_cancelled() {
            return;
        }
        let (lock, cvar) = &*self.pair;
        let guard = lock.lock().unwrap();
        let _ = cvar.wait_timeout_while(guard, timeout, |_| !self.is_cancelled());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_wakes_a_waiting_thread_immediately() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = std::thread::spawn(move || {
            let start = std::time::Instant::now();
            waiter.wait_timeout(Duration::from_secs(30));
            start.elapsed()
        });
        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        let elapsed = handle.join().unwrap();
        assert!(elapsed < Duration::from_secs(5));
        assert!(token.is_cancelled());
    }

    #[test]
    fn wait_timeout_returns_immediately_if_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let start = std::time::Instant::now();
        token.wait_timeout(Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
