// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::InPortBase;
use crate::buffer::Timeout;
use crate::cdr::{self, CdrCodec};
use crate::connector::Registries;
use crate::status::DataPortStatus;
use parking_lot::Mutex;
use std::sync::Arc;

/// Typed InPort.
///
/// `read()` returns the newest record when one is waiting. When the buffer
/// is empty (or the read times out) the last successfully read value is
/// returned instead, so a component polling at its own rate always sees a
/// value once anything has arrived.
pub struct InPort<T> {
    base: Arc<InPortBase>,
    last: Mutex<Option<T>>,
}

impl<T: CdrCodec + Clone> InPort<T> {
    pub fn new(name: impl Into<String>, registries: Arc<Registries>) -> Self {
        Self {
            base: Arc::new(InPortBase::new(name, registries)),
            last: Mutex::new(None),
        }
    }

    pub fn base(&self) -> &Arc<InPortBase> {
        &self.base
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// True if at least one unread record is buffered locally.
    pub fn is_new(&self) -> bool {
        self.base.readable() > 0
    }

    pub fn read(&self) -> Result<T, DataPortStatus> {
        self.read_timeout(Timeout::Default)
    }

    pub fn read_timeout(&self, timeout: Timeout) -> Result<T, DataPortStatus> {
        match self.base.read_record(timeout) {
            Ok((bytes, endian)) => {
                let value: T = cdr::from_bytes(&bytes, endian).map_err(|e| {
                    log::warn!("[InPort] {} decode failed: {}", self.base.name(), e);
                    DataPortStatus::PortError
                })?;
                *self.last.lock() = Some(value.clone());
                Ok(value)
            }
            Err(status @ (DataPortStatus::BufferEmpty | DataPortStatus::BufferTimeout)) => {
                self.last.lock().clone().ok_or(status)
            }
            Err(status) => Err(status),
        }
    }

    /// Last successfully read value.
    pub fn last(&self) -> Option<T> {
        self.last.lock().clone()
    }
}
