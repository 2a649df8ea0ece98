// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{ConnectorProfile, OutPortConnector, Registries};
use crate::buffer::{Buffer, Record, Timeout};
use crate::error::Result;
use crate::listener::{ConnectorListenerType, ConnectorListeners, ListenerBinding};
use crate::publisher::Publisher;
use crate::status::DataPortStatus;
use crate::transport::InPortConsumer;
use std::sync::Arc;

/// Push-side OutPort connector: publisher -> consumer, with the buffer the
/// publisher drains.
pub struct OutPortPushConnector {
    id: String,
    publisher: Box<dyn Publisher>,
    consumer: Arc<dyn InPortConsumer>,
    buffer: Arc<dyn Buffer>,
    binding: Arc<ListenerBinding>,
    connected: bool,
}

impl OutPortPushConnector {
    /// Subscribe to the provider address published in `profile` and start
    /// the publisher.
    pub fn new(
        mut profile: ConnectorProfile,
        listeners: Arc<ConnectorListeners>,
        registries: &Registries,
    ) -> Result<Self> {
        let id = profile.ensure_id().to_string();
        let interface_type = profile.interface_type().to_string();

        let buffer = registries.create_buffer(&profile)?;
        let mut publisher = registries.create_publisher(&profile)?;

        let mut consumer = registries.transports.create_inport_consumer(&interface_type)?;
        consumer.init(&profile.properties)?;
        consumer.subscribe_interface(&profile.properties)?;
        let consumer: Arc<dyn InPortConsumer> = Arc::from(consumer);

        let binding = Arc::new(ListenerBinding::new(profile, listeners));
        publisher.set_consumer(Arc::clone(&consumer));
        publisher.set_buffer(Arc::clone(&buffer));
        publisher.set_listener(Arc::clone(&binding));
        if let Err(e) = publisher.activate() {
            consumer.unsubscribe_interface();
            return Err(e);
        }

        log::debug!(
            "[OutPortPushConnector] {} connected over {}",
            id,
            interface_type
        );
        binding.notify(ConnectorListenerType::OnConnect);
        Ok(Self {
            id,
            publisher,
            consumer,
            buffer,
            binding,
            connected: true,
        })
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }
}

impl OutPortConnector for OutPortPushConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn profile(&self) -> ConnectorProfile {
        self.binding.profile()
    }

    fn write(&self, data: Record) -> DataPortStatus {
        if !self.connected {
            return DataPortStatus::PreconditionNotMet;
        }
        self.publisher.write(data, Timeout::Default)
    }

    fn disconnect(&mut self) -> DataPortStatus {
        if !self.connected {
            return DataPortStatus::PortOk;
        }
        self.connected = false;
        self.publisher.deactivate();
        self.consumer.unsubscribe_interface();
        self.buffer.close();
        self.binding.notify(ConnectorListenerType::OnDisconnect);
        log::debug!("[OutPortPushConnector] {} disconnected", self.id);
        DataPortStatus::PortOk
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Drop for OutPortPushConnector {
    fn drop(&mut self) {
        self.disconnect();
    }
}
