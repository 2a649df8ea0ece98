// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connectors: one end of a port-to-port connection.
//!
//! | Connector                 | Dataflow | Owns                              |
//! |---------------------------|----------|-----------------------------------|
//! | [`OutPortPushConnector`]  | push     | publisher, consumer, buffer       |
//! | [`InPortPushConnector`]   | push     | provider, buffer                  |
//! | [`OutPortPullConnector`]  | pull     | provider, buffer (latest data)    |
//! | [`InPortPullConnector`]   | pull     | consumer                          |
//!
//! `disconnect()` stops the publisher (joining its thread), releases the
//! transport and only then closes the buffer. It raises `ON_DISCONNECT`
//! once; later calls are no-ops. Dropping a connector disconnects it.

mod in_pull;
mod in_push;
mod out_pull;
mod out_push;
mod profile;

pub use in_pull::InPortPullConnector;
pub use in_push::InPortPushConnector;
pub use out_pull::OutPortPullConnector;
pub use out_push::OutPortPushConnector;
pub use profile::{
    generate_connector_id, ConnectorProfile, KEY_BUFFER_TYPE, KEY_CDR_ENDIAN,
    KEY_DATAFLOW_TYPE, KEY_INTERFACE_TYPE, KEY_SUBSCRIPTION_TYPE,
};

use crate::buffer::{Buffer, BufferFactory, Record, Timeout};
use crate::cdr::Endian;
use crate::error::{Error, Result};
use crate::publisher::{Publisher, PublisherFactory};
use crate::status::{BufferStatus, DataPortStatus};
use crate::transport::TransportRegistry;
use std::sync::Arc;

/// Property node handed to `Buffer::init`.
pub const BUFFER_NODE: &str = "dataport.buffer";
/// Property node handed to `Publisher::init`.
pub const PUBLISHER_NODE: &str = "dataport.publisher";

/// OutPort end of a connection.
pub trait OutPortConnector: Send + Sync {
    fn id(&self) -> &str;
    /// Current profile, including edits made by `INFO_CHANGED` listeners.
    fn profile(&self) -> ConnectorProfile;
    fn write(&self, data: Record) -> DataPortStatus;
    fn disconnect(&mut self) -> DataPortStatus;
    fn is_connected(&self) -> bool;

    fn endian(&self) -> Endian {
        Endian::from_properties(&self.profile().properties)
    }
}

/// InPort end of a connection.
pub trait InPortConnector: Send + Sync {
    fn id(&self) -> &str;
    fn profile(&self) -> ConnectorProfile;
    fn read(&self, timeout: Timeout) -> std::result::Result<Record, DataPortStatus>;
    fn disconnect(&mut self) -> DataPortStatus;
    fn is_connected(&self) -> bool;

    /// Records waiting in a local buffer. Pull connectors have none.
    fn readable(&self) -> usize {
        0
    }

    fn endian(&self) -> Endian {
        Endian::from_properties(&self.profile().properties)
    }
}

/// Factories a connector draws its parts from. Built once, shared by `Arc`.
pub struct Registries {
    pub buffers: BufferFactory,
    pub publishers: PublisherFactory,
    pub transports: TransportRegistry,
}

impl Registries {
    pub fn new(
        buffers: BufferFactory,
        publishers: PublisherFactory,
        transports: TransportRegistry,
    ) -> Self {
        Self {
            buffers,
            publishers,
            transports,
        }
    }

    /// Every built-in buffer, publisher and transport.
    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self::new(
            BufferFactory::with_defaults(),
            PublisherFactory::with_defaults(),
            TransportRegistry::with_defaults(),
        ))
    }

    /// Buffer named by `dataport.buffer_type`, initialised from the
    /// `dataport.buffer` node.
    pub(crate) fn create_buffer(&self, profile: &ConnectorProfile) -> Result<Arc<dyn Buffer>> {
        let kind = profile.buffer_type();
        let buffer: Arc<dyn Buffer> = self
            .buffers
            .create(&kind)
            .ok_or(Error::UnknownBufferType(kind))?
            .into();
        buffer.init(&profile.properties.node(BUFFER_NODE))?;
        Ok(buffer)
    }

    /// Publisher named by `dataport.subscription_type`, initialised from the
    /// `dataport.publisher` node.
    pub(crate) fn create_publisher(&self, profile: &ConnectorProfile) -> Result<Box<dyn Publisher>> {
        let kind = profile.subscription_type();
        let mut publisher = self
            .publishers
            .create(&kind)
            .ok_or(Error::UnknownSubscriptionType(kind))?;
        publisher.init(&profile.properties.node(PUBLISHER_NODE))?;
        Ok(publisher)
    }
}

/// Status an InPort read reports for a buffer read failure.
pub(crate) fn buffer_read_status(status: BufferStatus) -> DataPortStatus {
    match status {
        BufferStatus::Empty => DataPortStatus::BufferEmpty,
        BufferStatus::Timeout => DataPortStatus::BufferTimeout,
        BufferStatus::PreconditionNotMet => DataPortStatus::PreconditionNotMet,
        BufferStatus::Ok | BufferStatus::Full | BufferStatus::Error | BufferStatus::NotSupported => {
            DataPortStatus::BufferError
        }
    }
}
