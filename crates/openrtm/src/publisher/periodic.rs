// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{Drain, Parts, Publisher, Worker};
use crate::buffer::{Buffer, Record, Timeout};
use crate::config::PublisherConfig;
use crate::error::Result;
use crate::listener::{ConnectorListenerType, ListenerBinding};
use crate::properties::Properties;
use crate::status::DataPortStatus;
use crate::transport::InPortConsumer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Buffers each write; a thread drains the buffer every `1 / push_rate`
/// seconds and raises `ON_SENDER_EMPTY` on ticks that find nothing.
#[derive(Default)]
pub struct PeriodicPublisher {
    parts: Parts,
    config: PublisherConfig,
    drain: Option<Arc<Drain>>,
    worker: Option<Worker>,
}

impl PeriodicPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Publisher for PeriodicPublisher {
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
        match &self.drain {
            Some(drain) if self.worker.is_some() => drain.enqueue(data, timeout),
            _ => DataPortStatus::PreconditionNotMet,
        }
    }

    fn activate(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let drain = Arc::new(self.parts.drain(&self.config)?);
        let d = Arc::clone(&drain);
        let period = self.config.push_period()?;

        let worker = Worker::spawn("openrtm-pub-periodic", move |running, signal| {
            log::debug!("[PublisherPeriodic] thread started, period {:?}", period);
            let mut next = Instant::now() + period;
            while running.load(Ordering::Acquire) {
                let now = Instant::now();
                if now < next {
                    // Woken early only by stop.
                    signal.wait_timeout(next - now);
                    continue;
                }
                if d.is_empty() {
                    d.listener().notify(ConnectorListenerType::OnSenderEmpty);
                } else {
                    d.pump();
                }
                next += period;
                let now = Instant::now();
                if next < now {
                    next = now + period;
                }
            }
            log::debug!("[PublisherPeriodic] thread stopped");
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

impl Drop for PeriodicPublisher {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::ScriptedConsumer;
    use super::*;
    use crate::buffer::RingBuffer;
    use crate::connector::ConnectorProfile;
    use crate::listener::{ConnectorListeners, ListenerStatus};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_ticks_deliver_and_report_empty() {
        let listeners = Arc::new(ConnectorListeners::new());
        let empty_ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&empty_ticks);
        listeners.add_listener(
            ConnectorListenerType::OnSenderEmpty,
            Arc::new(move |_: &mut ConnectorProfile| {
                counter.fetch_add(1, Ordering::Relaxed);
                ListenerStatus::NO_CHANGE
            }),
            false,
        );

        let consumer = ScriptedConsumer::with_script(&[]);
        let mut p = PeriodicPublisher::new();
        p.init(&Properties::new().with("push_rate", "200")).unwrap();
        p.set_consumer(Arc::clone(&consumer) as Arc<dyn InPortConsumer>);
        p.set_buffer(Arc::new(RingBuffer::<Record>::with_capacity(8)));
        p.set_listener(Arc::new(ListenerBinding::new(
            ConnectorProfile::new("periodic"),
            listeners,
        )));
        p.activate().unwrap();

        assert_eq!(p.write(vec![1], Timeout::Default), DataPortStatus::PortOk);
        assert_eq!(p.write(vec![2], Timeout::Default), DataPortStatus::PortOk);

        let deadline = Instant::now() + Duration::from_secs(2);
        while (consumer.sent().len() < 2 || empty_ticks.load(Ordering::Relaxed) == 0)
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        p.deactivate();
        assert_eq!(consumer.sent(), vec![vec![1], vec![2]]);
        assert!(empty_ticks.load(Ordering::Relaxed) > 0);
    }
}
