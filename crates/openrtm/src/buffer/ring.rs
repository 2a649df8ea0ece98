// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded FIFO ring with configurable full/empty policies.
//!
//! One mutex guards the ring; two condvars wake blocked writers (space
//! freed) and blocked readers (data arrived). `close()` wakes everyone and
//! makes further operations fail with `PreconditionNotMet`.

use super::{Buffer, Record, Timeout, WriteOutcome};
use crate::config::{BufferConfig, EmptyPolicy, FullPolicy};
use crate::error::Result;
use crate::properties::Properties;
use crate::status::BufferStatus;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct Ring<T> {
    slots: VecDeque<T>,
    config: BufferConfig,
    /// Most recently consumed record (readback policy only).
    last_read: Option<T>,
    closed: bool,
}

impl<T> Ring<T> {
    #[inline]
    fn is_full(&self) -> bool {
        self.slots.len() >= self.config.length
    }
}

/// How a single write or read behaves once the fast path fails.
#[derive(Clone, Copy)]
enum Wait {
    No,
    Until(Instant),
    Forever,
}

impl Wait {
    fn after(d: Duration) -> Self {
        match Instant::now().checked_add(d) {
            Some(deadline) => Wait::Until(deadline),
            None => Wait::Forever,
        }
    }
}

pub struct RingBuffer<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T: Clone + Send> RingBuffer<T> {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            ring: Mutex::new(Ring {
                slots: VecDeque::with_capacity(config.length),
                config,
                last_read: None,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn with_capacity(length: usize) -> Self {
        Self::new(BufferConfig {
            length: length.max(1),
            ..BufferConfig::default()
        })
    }

    /// Replace the configuration. Stored records are discarded.
    pub fn configure(&self, config: BufferConfig) {
        let mut ring = self.ring.lock();
        log::debug!(
            "[RingBuffer] configure length={} full={:?} empty={:?}",
            config.length,
            config.full_policy,
            config.empty_policy
        );
        ring.slots = VecDeque::with_capacity(config.length);
        ring.config = config;
        ring.last_read = None;
        drop(ring);
        self.not_full.notify_all();
    }

    pub fn write(&self, record: T, timeout: Timeout) -> WriteOutcome {
        let mut ring = self.ring.lock();
        if ring.closed {
            return WriteOutcome::status(BufferStatus::PreconditionNotMet);
        }

        let mut overwrote = false;
        if ring.is_full() {
            let wait = match timeout {
                Timeout::Default => match ring.config.full_policy {
                    FullPolicy::Overwrite => {
                        ring.slots.pop_front();
                        overwrote = true;
                        Wait::No
                    }
                    FullPolicy::DoNothing => return WriteOutcome::status(BufferStatus::Full),
                    FullPolicy::Block => Wait::after(ring.config.write_timeout),
                },
                Timeout::After(d) => Wait::after(d),
                Timeout::Forever => Wait::Forever,
            };

            if !overwrote && !Self::wait_while(&self.not_full, &mut ring, wait, Ring::is_full) {
                if ring.closed {
                    return WriteOutcome::status(BufferStatus::PreconditionNotMet);
                }
                return WriteOutcome::status(BufferStatus::Timeout);
            }
        }

        ring.slots.push_back(record);
        drop(ring);
        self.not_empty.notify_one();
        WriteOutcome {
            status: BufferStatus::Ok,
            overwrote,
        }
    }

    pub fn read(&self, timeout: Timeout) -> std::result::Result<T, BufferStatus> {
        let mut ring = self.ring.lock();
        if ring.closed {
            return Err(BufferStatus::PreconditionNotMet);
        }

        if ring.slots.is_empty() {
            let wait = match timeout {
                Timeout::Default => match ring.config.empty_policy {
                    EmptyPolicy::DoNothing => return Err(BufferStatus::Empty),
                    EmptyPolicy::Readback => {
                        return ring.last_read.clone().ok_or(BufferStatus::Empty);
                    }
                    EmptyPolicy::Block => Wait::after(ring.config.read_timeout),
                },
                Timeout::After(d) => Wait::after(d),
                Timeout::Forever => Wait::Forever,
            };

            if !Self::wait_while(&self.not_empty, &mut ring, wait, |r| r.slots.is_empty()) {
                if ring.closed {
                    return Err(BufferStatus::PreconditionNotMet);
                }
                return Err(BufferStatus::Timeout);
            }
        }

        let record = match ring.slots.pop_front() {
            Some(r) => r,
            None => return Err(BufferStatus::Empty),
        };
        if ring.config.empty_policy == EmptyPolicy::Readback {
            ring.last_read = Some(record.clone());
        }
        drop(ring);
        self.not_full.notify_one();
        Ok(record)
    }

    /// Block on `cv` while `blocked` holds. Returns `true` once it no longer
    /// holds, `false` on timeout or close.
    fn wait_while(
        cv: &Condvar,
        ring: &mut MutexGuard<'_, Ring<T>>,
        wait: Wait,
        blocked: impl Fn(&Ring<T>) -> bool,
    ) -> bool {
        while blocked(&**ring) {
            if ring.closed {
                return false;
            }
            match wait {
                Wait::No => return false,
                Wait::Until(deadline) => {
                    if cv.wait_until(ring, deadline).timed_out() {
                        return !ring.closed && !blocked(&**ring);
                    }
                }
                Wait::Forever => cv.wait(ring),
            }
        }
        !ring.closed
    }

    /// Capacity.
    pub fn length(&self) -> usize {
        self.ring.lock().config.length
    }

    /// Unread records.
    pub fn readable(&self) -> usize {
        self.ring.lock().slots.len()
    }

    /// Free slots.
    pub fn writable(&self) -> usize {
        let ring = self.ring.lock();
        ring.config.length.saturating_sub(ring.slots.len())
    }

    pub fn is_full(&self) -> bool {
        self.ring.lock().is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().slots.is_empty()
    }

    /// Drop every stored record.
    pub fn reset(&self) {
        let mut ring = self.ring.lock();
        ring.slots.clear();
        ring.last_read = None;
        drop(ring);
        self.not_full.notify_all();
    }

    pub fn close(&self) {
        let mut ring = self.ring.lock();
        if ring.closed {
            return;
        }
        ring.closed = true;
        ring.slots.clear();
        ring.last_read = None;
        drop(ring);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.ring.lock().closed
    }
}

impl Buffer for RingBuffer<Record> {
    fn init(&self, props: &Properties) -> Result<()> {
        self.configure(BufferConfig::from_properties(props)?);
        Ok(())
    }

    fn write(&self, record: Record, timeout: Timeout) -> WriteOutcome {
        RingBuffer::write(self, record, timeout)
    }

    fn read(&self, timeout: Timeout) -> std::result::Result<Record, BufferStatus> {
        RingBuffer::read(self, timeout)
    }

    fn length(&self) -> usize {
        RingBuffer::length(self)
    }

    fn readable(&self) -> usize {
        RingBuffer::readable(self)
    }

    fn writable(&self) -> usize {
        RingBuffer::writable(self)
    }

    fn is_full(&self) -> bool {
        RingBuffer::is_full(self)
    }

    fn is_empty(&self) -> bool {
        RingBuffer::is_empty(self)
    }

    fn reset(&self) {
        RingBuffer::reset(self)
    }

    fn close(&self) {
        RingBuffer::close(self)
    }
}
