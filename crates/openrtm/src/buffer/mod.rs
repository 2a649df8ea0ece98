// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connector buffers.
//!
//! Every connector owns exactly one buffer of serialized records. The
//! buffer kind is chosen by `dataport.buffer_type` through a
//! [`BufferFactory`]; the only built-in kind is [`RING_BUFFER`].

mod ring;

pub use ring::RingBuffer;

use crate::error::Result;
use crate::factory::Factory;
use crate::properties::Properties;
use crate::status::BufferStatus;
use std::time::Duration;

/// A serialized data record as it travels through buffers and transports.
pub type Record = Vec<u8>;

/// Factory key of [`RingBuffer`].
pub const RING_BUFFER: &str = "ring_buffer";

/// Per-call wait override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Use the configured full/empty policy.
    #[default]
    Default,
    /// Block up to the given duration, whatever the policy.
    After(Duration),
    /// Block until the operation can proceed or the buffer is closed.
    Forever,
}

/// Result of a buffer write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub status: BufferStatus,
    /// The oldest record was dropped to make room.
    pub overwrote: bool,
}

impl WriteOutcome {
    #[inline]
    pub fn status(status: BufferStatus) -> Self {
        Self {
            status,
            overwrote: false,
        }
    }
}

/// Byte-record buffer shared between a connector's writer and reader sides.
pub trait Buffer: Send + Sync {
    /// Apply the `dataport.buffer` property node.
    fn init(&self, props: &Properties) -> Result<()>;
    fn write(&self, record: Record, timeout: Timeout) -> WriteOutcome;
    fn read(&self, timeout: Timeout) -> std::result::Result<Record, BufferStatus>;
    fn length(&self) -> usize;
    fn readable(&self) -> usize;
    fn writable(&self) -> usize;
    fn is_full(&self) -> bool;
    fn is_empty(&self) -> bool;
    fn reset(&self);
    /// Wake all waiters and refuse further operations.
    fn close(&self);
}

pub type BufferFactory = Factory<dyn Buffer>;

impl Factory<dyn Buffer> {
    /// Factory with the built-in buffer kinds registered.
    pub fn with_defaults() -> Self {
        let factory = Self::new();
        factory.register(RING_BUFFER, || {
            Box::new(RingBuffer::<Record>::with_capacity(
                crate::config::DEFAULT_BUFFER_LENGTH,
            ))
        });
        factory
    }
}
