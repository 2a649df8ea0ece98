// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{Drain, Parts, Publisher, Worker};
use crate::buffer::{Buffer, Record, Timeout};
use crate::config::PublisherConfig;
use crate::error::Result;
use crate::listener::ListenerBinding;
use crate::properties::Properties;
use crate::status::DataPortStatus;
use crate::transport::InPortConsumer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Idle wait between wake-ups. Records left behind by a failed send are
/// retried at this pace.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Buffers each write and wakes a dedicated thread that drains the buffer
/// according to `push_policy`.
#[derive(Default)]
pub struct NewPublisher {
    parts: Parts,
    config: PublisherConfig,
    drain: Option<Arc<Drain>>,
    worker: Option<Worker>,
}

impl NewPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Publisher for NewPublisher {
    fn init(&mut self, props: &Properties) -> Result<()> {
        self.config = PublisherConfig::from_properties(props)?;
        Ok(())
    }

    fn set_consumer(&mut self, consumer: Arc<dyn InPortConsumer>) {
        self.parts.consumer = Some(consumer);
    }

    fn set_buffer(&mut self, buffer: Arc<dyn Buffer>) {
        self.parts.buffer = Some(buffer);
    }

    fn set_listener(&mut self, listener: Arc<ListenerBinding>) {
        self.parts.listener = Some(listener);
    }

    fn write(&self, data: Record, timeout: Timeout) -> DataPortStatus {
        let (Some(drain), Some(worker)) = (&self.drain, &self.worker) else {
            return DataPortStatus::PreconditionNotMet;
        };
        let status = drain.enqueue(data, timeout);
        // Wake even on a full buffer so the thread makes room.
        if status != DataPortStatus::ConnectionLost {
            worker.wake();
        }
        status
    }

    fn activate(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let drain = Arc::new(self.parts.drain(&self.config)?);
        let d = Arc::clone(&drain);
        let worker = Worker::spawn("openrtm-pub-new", move |running, signal| {
            log::debug!("[PublisherNew] thread started");
            while running.load(Ordering::Acquire) {
                let woken = signal.wait_timeout(IDLE_WAIT);
                if !woken && d.is_empty() {
                    continue;
                }
                // Wake-ups coalesce, so drain until empty or a send fails.
                while running.load(Ordering::Acquire) && !d.is_empty() {
                    if !d.pump().is_ok() {
                        break;
                    }
                }
            }
            log::debug!("[PublisherNew] thread stopped");
        })?;
        self.drain = Some(drain);
        self.worker = Some(worker);
        Ok(())
    }

    fn deactivate(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        self.drain = None;
    }

    fn is_active(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for NewPublisher {
    fn drop(&mut self) {
        self.deactivate();
    }
}
