// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{buffer_read_status, ConnectorProfile, InPortConnector, Registries};
use crate::buffer::{Buffer, Record, Timeout};
use crate::error::Result;
use crate::listener::{ConnectorListenerType, ConnectorListeners, ListenerBinding};
use crate::status::DataPortStatus;
use crate::transport::InPortProvider;
use std::sync::Arc;

/// Push-side InPort connector: the provider fills the buffer, the port
/// reads it.
pub struct InPortPushConnector {
    id: String,
    provider: Box<dyn InPortProvider>,
    buffer: Arc<dyn Buffer>,
    binding: Arc<ListenerBinding>,
    connected: bool,
}

impl InPortPushConnector {
    /// Start a provider and publish its address into the profile, available
    /// afterwards through [`InPortConnector::profile`].
    pub fn new(
        mut profile: ConnectorProfile,
        listeners: Arc<ConnectorListeners>,
        registries: &Registries,
    ) -> Result<Self> {
        let id = profile.ensure_id().to_string();
        let interface_type = profile.interface_type().to_string();

        let buffer = registries.create_buffer(&profile)?;
        let mut provider = registries.transports.create_inport_provider(&interface_type)?;
        provider.init(&profile.properties)?;
        provider.set_buffer(Arc::clone(&buffer));

        // The binding must exist before publish so the serving side can
        // raise events; the published address is merged back afterwards.
        let binding = Arc::new(ListenerBinding::new(profile.clone(), listeners));
        provider.set_listener(Arc::clone(&binding));
        provider.publish_interface(&mut profile.properties)?;
        binding.merge_properties(&profile.properties);

        log::debug!(
            "[InPortPushConnector] {} serving over {}",
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

impl InPortConnector for InPortPushConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn profile(&self) -> ConnectorProfile {
        self.binding.profile()
    }

    fn read(&self, timeout: Timeout) -> std::result::Result<Record, DataPortStatus> {
        if !self.connected {
            return Err(DataPortStatus::PreconditionNotMet);
        }
        self.binding
            .read_buffer(&*self.buffer, timeout)
            .map_err(buffer_read_status)
    }

    fn disconnect(&mut self) -> DataPortStatus {
        if !self.connected {
            return DataPortStatus::PortOk;
        }
        self.connected = false;
        self.provider.shutdown();
        self.buffer.close();
        self.binding.notify(ConnectorListenerType::OnDisconnect);
        log::debug!("[InPortPushConnector] {} disconnected", self.id);
        DataPortStatus::PortOk
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn readable(&self) -> usize {
        self.buffer.readable()
    }
}

impl Drop for InPortPushConnector {
    fn drop(&mut self) {
        self.disconnect();
    }
}
