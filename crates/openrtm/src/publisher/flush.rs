// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{send, Parts, Publisher};
use crate::buffer::{Buffer, Record, Timeout};
use crate::error::{Error, Result};
use crate::listener::{ConnectorListenerType, ListenerBinding};
use crate::properties::Properties;
use crate::status::DataPortStatus;
use crate::transport::InPortConsumer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sends on the writer's thread and returns the transport status.
///
/// The buffer is accepted for interface symmetry but never used.
#[derive(Default)]
pub struct FlushPublisher {
    parts: Parts,
    active: bool,
    lost: AtomicBool,
}

impl FlushPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Publisher for FlushPublisher {
    fn init(&mut self, _props: &Properties) -> Result<()> {
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

    fn write(&self, data: Record, _timeout: Timeout) -> DataPortStatus {
        let (Some(consumer), Some(listener)) = (&self.parts.consumer, &self.parts.listener) else {
            return DataPortStatus::PreconditionNotMet;
        };
        if !self.active {
            return DataPortStatus::PreconditionNotMet;
        }
        if self.lost.load(Ordering::Acquire) {
            return DataPortStatus::ConnectionLost;
        }

        let status = send(&**consumer, listener, data);
        if status == DataPortStatus::ConnectionLost {
            self.lost.store(true, Ordering::Release);
            log::warn!(
                "[PublisherFlush] connection lost on {}",
                listener.profile().connector_id
            );
            listener.notify(ConnectorListenerType::OnSenderError);
        }
        status
    }

    fn activate(&mut self) -> Result<()> {
        if self.parts.consumer.is_none() || self.parts.listener.is_none() {
            return Err(Error::InvalidState("flush publisher is not wired".into()));
        }
        self.active = true;
        Ok(())
    }

    fn deactivate(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::ScriptedConsumer;
    use super::*;
    use crate::connector::ConnectorProfile;

    fn publisher(consumer: Arc<ScriptedConsumer>) -> FlushPublisher {
        let mut p = FlushPublisher::new();
        p.set_consumer(consumer);
        p.set_listener(Arc::new(ListenerBinding::detached(ConnectorProfile::new("flush"))));
        p
    }

    #[test]
    fn test_inactive_write_rejected() {
        let consumer = ScriptedConsumer::with_script(&[]);
        let mut p = publisher(Arc::clone(&consumer));
        assert_eq!(p.write(vec![1], Timeout::Default), DataPortStatus::PreconditionNotMet);
        p.activate().unwrap();
        assert_eq!(p.write(vec![1], Timeout::Default), DataPortStatus::PortOk);
        p.deactivate();
        assert!(!p.is_active());
        assert_eq!(consumer.sent(), vec![vec![1]]);
    }

    #[test]
    fn test_status_passthrough_and_lost_latch() {
        let consumer = ScriptedConsumer::with_script(&[
            DataPortStatus::SendFull,
            DataPortStatus::ConnectionLost,
        ]);
        let mut p = publisher(Arc::clone(&consumer));
        p.activate().unwrap();
        assert_eq!(p.write(vec![1], Timeout::Default), DataPortStatus::SendFull);
        assert_eq!(p.write(vec![2], Timeout::Default), DataPortStatus::ConnectionLost);
        assert_eq!(p.write(vec![3], Timeout::Default), DataPortStatus::ConnectionLost);
        assert_eq!(consumer.sent().len(), 2);
    }

    #[test]
    fn test_activate_requires_consumer() {
        let mut p = FlushPublisher::new();
        assert!(p.activate().is_err());
    }
}
