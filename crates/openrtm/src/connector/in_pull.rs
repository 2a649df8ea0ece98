// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{ConnectorProfile, InPortConnector, Registries};
use crate::buffer::{Record, Timeout};
use crate::error::Result;
use crate::listener::{
    ConnectorDataListenerType, ConnectorListenerType, ConnectorListeners, ListenerBinding,
};
use crate::status::DataPortStatus;
use crate::transport::OutPortConsumer;
use std::sync::Arc;

/// Pull-side InPort connector: every read fetches from the remote provider.
/// There is no local buffer.
pub struct InPortPullConnector {
    id: String,
    consumer: Box<dyn OutPortConsumer>,
    binding: Arc<ListenerBinding>,
    connected: bool,
}

impl InPortPullConnector {
    /// Subscribe to the provider address published in `profile`.
    pub fn new(
        mut profile: ConnectorProfile,
        listeners: Arc<ConnectorListeners>,
        registries: &Registries,
    ) -> Result<Self> {
        let id = profile.ensure_id().to_string();
        let interface_type = profile.interface_type().to_string();

        let mut consumer = registries.transports.create_outport_consumer(&interface_type)?;
        consumer.init(&profile.properties)?;
        consumer.subscribe_interface(&profile.properties)?;

        let binding = Arc::new(ListenerBinding::new(profile, listeners));
        log::debug!(
            "[InPortPullConnector] {} fetching over {}",
            id,
            interface_type
        );
        binding.notify(ConnectorListenerType::OnConnect);
        Ok(Self {
            id,
            consumer,
            binding,
            connected: true,
        })
    }
}

impl InPortConnector for InPortPullConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn profile(&self) -> ConnectorProfile {
        self.binding.profile()
    }

    /// `timeout` is ignored; the provider side applies its own buffer policy.
    fn read(&self, _timeout: Timeout) -> std::result::Result<Record, DataPortStatus> {
        if !self.connected {
            return Err(DataPortStatus::PreconditionNotMet);
        }
        match self.consumer.get() {
            Ok(mut data) => {
                self.binding
                    .notify_data(ConnectorDataListenerType::OnReceived, &mut data);
                Ok(data)
            }
            Err(DataPortStatus::BufferEmpty) => {
                self.binding.notify(ConnectorListenerType::OnSenderEmpty);
                Err(DataPortStatus::BufferEmpty)
            }
            Err(status @ (DataPortStatus::BufferTimeout | DataPortStatus::SendTimeout)) => {
                self.binding.notify(ConnectorListenerType::OnSenderTimeout);
                Err(status)
            }
            Err(status) => {
                self.binding.notify(ConnectorListenerType::OnSenderError);
                Err(status)
            }
        }
    }

    fn disconnect(&mut self) -> DataPortStatus {
        if !self.connected {
            return DataPortStatus::PortOk;
        }
        self.connected = false;
        self.consumer.unsubscribe_interface();
        self.binding.notify(ConnectorListenerType::OnDisconnect);
        log::debug!("[InPortPullConnector] {} disconnected", self.id);
        DataPortStatus::PortOk
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Drop for InPortPullConnector {
    fn drop(&mut self) {
        self.disconnect();
    }
}
