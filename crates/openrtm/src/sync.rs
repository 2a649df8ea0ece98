// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wake signal for worker threads.
//!
//! Publisher threads sleep on a [`Signal`] between work items. A producer sets the atomic flag and only
//! touches the condvar when the worker is actually asleep, so `notify()` on
//! the write path costs an atomic store in the common case.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Signal {
    /// Set by `notify`, cleared by the waiter that consumes it.
    ready: AtomicBool,
    /// True while a waiter is parked on the condvar.
    sleeping: Mutex<bool>,
    condvar: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn notify(&self) {
        self.ready.store(true, Ordering::Release);
        if *self.sleeping.lock() {
            self.condvar.notify_all();
        }
    }

    /// Wait until notified or `timeout` elapses. Returns `true` if a
    /// notification was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.ready.swap(false, Ordering::Acquire) {
            return true;
        }

        let mut sleeping = self.sleeping.lock();
        // Re-check under the lock so a notify between the swap above and
        // the park below is not lost.
        if self.ready.swap(false, Ordering::Acquire) {
            return true;
        }
        *sleeping = true;
        let _ = self.condvar.wait_for(&mut sleeping, timeout);
        *sleeping = false;

        self.ready.swap(false, Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_pending_notify_returns_immediately() {
        let signal = Signal::new();
        signal.notify();
        let start = Instant::now();
        assert!(signal.wait_timeout(Duration::from_millis(100)));
        assert!(start.elapsed() < Duration::from_millis(50));
        assert!(!signal.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn test_notify_wakes_sleeper() {
        let signal = Arc::new(Signal::new());
        let s = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            s.notify();
        });
        assert!(signal.wait_timeout(Duration::from_secs(2)));
        handle.join().unwrap();
    }

    #[test]
    fn test_timeout_without_notify() {
        let signal = Signal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(9));
    }
}
