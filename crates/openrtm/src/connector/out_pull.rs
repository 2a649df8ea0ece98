// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{ConnectorProfile, OutPortConnector, Registries};
use crate::buffer::{Buffer, Record, Timeout};
use crate::error::Result;
use crate::listener::{ConnectorListenerType, ConnectorListeners, ListenerBinding};
use crate::publisher::buffer_write_status;
use crate::status::DataPortStatus;
use crate::transport::OutPortProvider;
use std::sync::Arc;

/// Pull-side OutPort connector: writes land in the buffer and the provider
/// serves them to whoever fetches.
pub struct OutPortPullConnector {
    id: String,
    provider: Box<dyn OutPortProvider>,
    buffer: Arc<dyn Buffer>,
    binding: Arc<ListenerBinding>,
    connected: bool,
}

impl OutPortPullConnector {
    pub fn new(
        mut profile: ConnectorProfile,
        listeners: Arc<ConnectorListeners>,
        registries: &Registries,
    ) -> Result<Self> {
        let id = profile.ensure_id().to_string();
        let interface_type = profile.interface_type().to_string();

        let buffer = registries.create_buffer(&profile)?;
        let mut provider = registries.transports.create_outport_provider(&interface_type)?;
        provider.init(&profile.properties)?;
        provider.set_buffer(Arc::clone(&buffer));

        let binding = Arc::new(ListenerBinding::new(profile.clone(), listeners));
        provider.set_listener(Arc::clone(&binding));
        provider.publish_interface(&mut profile.properties)?;
        binding.merge_properties(&profile.properties);

        log::debug!(
            "[OutPortPullConnector] {} serving over {}",
            id,
            interface_type
        );
        binding.notify(ConnectorListenerType::OnConnect);
        Ok(Self {
            id,
            provider,
            buffer,
            binding,
            connected: true,
        })
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }
}

impl OutPortConnector for OutPortPullConnector {
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
        let (status, _) = self
            .binding
            .write_buffer(&*self.buffer, data, Timeout::Default, &[]);
        buffer_write_status(status)
    }

    fn disconnect(&mut self) -> DataPortStatus {
        if !self.connected {
            return DataPortStatus::PortOk;
        }
        self.connected = false;
        self.provider.shutdown();
        self.buffer.close();
        self.binding.notify(ConnectorListenerType::OnDisconnect);
        log::debug!("[OutPortPullConnector] {} disconnected", self.id);
        DataPortStatus::PortOk
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Drop for OutPortPullConnector {
    fn drop(&mut self) {
        self.disconnect();
    }
}
