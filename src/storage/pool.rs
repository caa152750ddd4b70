//! Per-server connection pool (§4.6 "Connection pool").
//!
//! A `(Mutex<PoolState>, Condvar)` pair with two FIFO waiter queues. Release
//! always wakes the highest-priority *waiting* request first; it never
//! preempts a connection already handed out, matching the spec's explicit
//! "high-priority requests preempt low-priority *waiters* (never running
//! ones)" rule.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    High,
}

struct PoolState {
    /// 0 means unlimited.
    cap: usize,
    in_use: usize,
    high_waiters: VecDeque<u64>,
    low_waiters: VecDeque<u64>,
    next_ticket: u64,
}

/// A per-server concurrency cap with priority-ordered waiters.
pub struct ConnectionPool {
    state: Mutex<PoolState>,
    cond: Condvar,
}

/// RAII handle: dropping it releases the slot and wakes the next waiter.
pub struct ConnectionGuard<'a> {
    pool: &'a ConnectionPool,
}

impl ConnectionPool {
    pub fn new(cap: usize) -> Self {
        Self {
            state: Mutex::new(PoolState {
                cap,
                in_use: 0,
                high_waiters: VecDeque::new(),
                low_waiters: VecDeque::new(),
                next_ticket: 0,
            }),
            cond: Condvar::new(),
        }
    }

    /// Blocks until a slot is available, then returns a guard that releases
    /// it on drop. `cap == 0` means unlimited: always granted immediately.
    pub fn acquire(&self, priority: Priority) -> ConnectionGuard<'_> {
        let mut state = self.state.lock().unwrap();
        if state.cap == 0 {
            state.in_use += 1;
            drop(state);
            return ConnectionGuard { pool: self };
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        match priority {
            Priority::High => state.high_waiters.push_back(ticket),
            Priority::Low => state.low_waiters.push_back(ticket),
        }

        loop {
            let can_run = state.in_use < state.cap
                && state
                    .high_waiters
                    .front()
                    .or_else(|| state.low_waiters.front())
                    .map(|&t| t == ticket)
                    .unwrap_or(false);
            if can_run {
                match priority {
                    Priority::High => {
                        state.high_waiters.pop_front();
                    }
                    Priority::Low => {
                        state.low_waiters.pop_front();
                    }
                };
                state.in_use += 1;
                break;
            }
            state = self.cond.wait(state).unwrap();
        }
        drop(state);
        ConnectionGuard { pool: self }
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.in_use = state.in_use.saturating_sub(1);
        drop(state);
        // Wake everyone; each re-checks whether it's at the front of its
        // queue and whether a slot is actually free. High-priority waiters
        // are woken the same way — the ticket-order check above already
        // favors the head of high_waiters over low_waiters.
        self.cond.notify_all();
    }

    pub fn in_use(&self) -> usize {
        self.state.lock().unwrap().in_use
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn unlimited_pool_never_blocks() {
        let pool = ConnectionPool::new(0);
        let _a = pool.acquire(Priority::Low);
        let _b = pool.acquire(Priority::Low);
        assert_eq!(pool.in_use(), 2);
    }

    #[test]
    fn capped_pool_serializes_and_releases() {
        let pool = Arc::new(ConnectionPool::new(1));
        let first = pool.acquire(Priority::Low);
        assert_eq!(pool.in_use(), 1);

        let pool2 = Arc::clone(&pool);
        let handle = thread::spawn(move || {
            let _g = pool2.acquire(Priority::High);
            assert_eq!(pool2.in_use(), 1);
        });

        thread::sleep(Duration::from_millis(50));
        drop(first);
        handle.join().unwrap();
        assert_eq!(pool.in_use(), 0);
    }
}
