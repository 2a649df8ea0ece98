// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-process sleep/wake on a `u32` word inside a shared segment.
//!
//! Only the shared `FUTEX_WAIT`/`FUTEX_WAKE` ops are used; the `_PRIVATE`
//! forms are keyed per process and would miss the peer.

use std::sync::atomic::AtomicU32;
use std::time::Duration;

const FUTEX_WAIT: libc::c_int = 0;
const FUTEX_WAKE: libc::c_int = 1;

fn sys_futex(
    word: &AtomicU32,
    op: libc::c_int,
    val: u32,
    ts: Option<&libc::timespec>,
) -> libc::c_long {
    let ts = ts.map_or(std::ptr::null(), |t| t as *const libc::timespec);
    // SAFETY: word outlives the call; the trailing uaddr2/val3 arguments are
    // ignored by WAIT and WAKE.
    unsafe { libc::syscall(libc::SYS_futex, word.as_ptr(), op, val, ts, 0usize, 0u32) }
}

/// Block while `*word == current`, for at most `timeout` when given.
///
/// Returns `true` when the sleep ended by a wake (spurious ones included),
/// `false` when the word had already moved on or the timeout ran out.
/// Callers re-check the word either way.
pub fn futex_wait(word: &AtomicU32, current: u32, timeout: Option<Duration>) -> bool {
    let ts = timeout.map(|d| libc::timespec {
        tv_sec: libc::time_t::try_from(d.as_secs()).unwrap_or(libc::time_t::MAX),
        tv_nsec: d.subsec_nanos() as libc::c_long,
    });
    sys_futex(word, FUTEX_WAIT, current, ts.as_ref()) == 0
}

/// Wake everyone sleeping on `word`; returns how many were woken.
pub fn futex_wake_all(word: &AtomicU32) -> usize {
    usize::try_from(sys_futex(word, FUTEX_WAKE, i32::MAX as u32, None)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_stale_value_does_not_sleep() {
        let word = AtomicU32::new(42);
        let start = Instant::now();
        assert!(!futex_wait(&word, 0, Some(Duration::from_secs(5))));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_times_out() {
        let word = AtomicU32::new(7);
        let start = Instant::now();
        assert!(!futex_wait(&word, 7, Some(Duration::from_millis(30))));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wake_with_nobody_waiting() {
        assert_eq!(futex_wake_all(&AtomicU32::new(0)), 0);
    }

    #[test]
    fn test_wake_waiter() {
        let word = Arc::new(AtomicU32::new(0));
        let waiter = Arc::clone(&word);
        let handle = thread::spawn(move || {
            while waiter.load(Ordering::Acquire) == 0 {
                futex_wait(&waiter, 0, Some(Duration::from_secs(1)));
            }
            waiter.load(Ordering::Acquire)
        });
        thread::sleep(Duration::from_millis(10));
        word.store(9, Ordering::Release);
        futex_wake_all(&word);
        assert_eq!(handle.join().unwrap(), 9);
    }
}
