// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte-oriented data-port transports.
//!
//! A transport contributes up to four roles:
//!
//! | Role               | Dataflow | Side     | Job                                   |
//! |--------------------|----------|----------|---------------------------------------|
//! | [`InPortProvider`] | push     | InPort   | receive records into the buffer       |
//! | [`InPortConsumer`] | push     | OutPort  | send records to a provider            |
//! | [`OutPortProvider`]| pull     | OutPort  | serve records out of the buffer       |
//! | [`OutPortConsumer`]| pull     | InPort   | fetch records from a provider         |
//!
//! Providers publish their address into the negotiated property bag under
//! `dataport.<transport>.inport_addr` / `outport_addr`; consumers resolve
//! it from the same bag.
//!
//! # Built-in transports
//!
//! - [`LOCAL`]: in-process endpoint directory, push and pull
//! - [`TCP_STREAM`]: length-prefixed frames with one status byte back, push
//! - [`UDP_DATAGRAM`]: one record per datagram, fire-and-forget, push
//! - [`SHARED_MEMORY`] (Linux): shm segment + futex handshake, push

pub mod local;
#[cfg(target_os = "linux")]
pub mod shm;
pub mod tcp;
pub mod udp;

pub use local::{Endpoint, EndpointDirectory};

use crate::buffer::{Buffer, Record, Timeout};
use crate::error::{Error, Result};
use crate::listener::{ConnectorDataListenerType, ConnectorListenerType, ListenerBinding};
use crate::properties::Properties;
use crate::status::{BufferStatus, DataPortStatus};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const LOCAL: &str = "local";
pub const TCP_STREAM: &str = "tcp_stream";
pub const UDP_DATAGRAM: &str = "udp_datagram";
pub const SHARED_MEMORY: &str = "shared_memory";

/// Property key under which a push provider publishes its address.
pub fn inport_addr_key(interface_type: &str) -> String {
    format!("dataport.{}.inport_addr", interface_type)
}

/// Property key under which a pull provider publishes its address.
pub fn outport_addr_key(interface_type: &str) -> String {
    format!("dataport.{}.outport_addr", interface_type)
}

/// Look up a published address, failing with `AddressMissing`.
pub fn required_addr(props: &Properties, key: &str) -> Result<String> {
    props
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::AddressMissing(key.to_string()))
}

/// Direction in which data moves across a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataflow {
    /// The OutPort sends; the InPort side buffers.
    Push,
    /// The InPort fetches on demand; the OutPort side buffers.
    Pull,
}

impl Dataflow {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "push" => Some(Self::Push),
            "pull" => Some(Self::Pull),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

impl fmt::Display for Dataflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Push receive side, owned by an `InPortPushConnector`.
pub trait InPortProvider: Send + Sync {
    fn init(&mut self, props: &Properties) -> Result<()>;
    fn set_buffer(&mut self, buffer: Arc<dyn Buffer>);
    fn set_listener(&mut self, listener: Arc<ListenerBinding>);
    /// Start serving and write the provider address into `props`.
    fn publish_interface(&mut self, props: &mut Properties) -> Result<()>;
    /// Deliver one record as if it had arrived over the wire.
    fn put(&self, data: Record) -> DataPortStatus;
    /// Stop serving and join any receive thread. Idempotent.
    fn shutdown(&mut self);
}

/// Push send side, shared between an `OutPortPushConnector` and its publisher.
pub trait InPortConsumer: Send + Sync {
    fn init(&mut self, props: &Properties) -> Result<()>;
    /// Resolve the provider address from the negotiated `props`.
    fn subscribe_interface(&mut self, props: &Properties) -> Result<()>;
    /// Release the connection. Later `put` calls return `ConnectionLost`.
    fn unsubscribe_interface(&self);
    fn put(&self, data: &[u8]) -> DataPortStatus;
}

/// Pull serve side, owned by an `OutPortPullConnector`.
pub trait OutPortProvider: Send + Sync {
    fn init(&mut self, props: &Properties) -> Result<()>;
    fn set_buffer(&mut self, buffer: Arc<dyn Buffer>);
    fn set_listener(&mut self, listener: Arc<ListenerBinding>);
    fn publish_interface(&mut self, props: &mut Properties) -> Result<()>;
    fn get(&self) -> std::result::Result<Record, DataPortStatus>;
    fn shutdown(&mut self);
}

/// Pull fetch side, owned by an `InPortPullConnector`.
pub trait OutPortConsumer: Send + Sync {
    fn init(&mut self, props: &Properties) -> Result<()>;
    fn subscribe_interface(&mut self, props: &Properties) -> Result<()>;
    fn unsubscribe_interface(&self);
    fn get(&self) -> std::result::Result<Record, DataPortStatus>;
}

/// Status a push consumer reports for the provider's answer.
pub fn consumer_status(provider: DataPortStatus) -> DataPortStatus {
    match provider {
        DataPortStatus::PortOk => DataPortStatus::PortOk,
        DataPortStatus::BufferFull => DataPortStatus::SendFull,
        DataPortStatus::BufferTimeout => DataPortStatus::SendTimeout,
        DataPortStatus::PortError | DataPortStatus::PreconditionNotMet => {
            DataPortStatus::PortError
        }
        DataPortStatus::ConnectionLost => DataPortStatus::ConnectionLost,
        _ => DataPortStatus::UnknownError,
    }
}

// ============================================================================
// Provider cores
// ============================================================================

/// Receive-side core shared by every push provider: listener events plus
/// the buffer write.
pub struct InPortSink {
    buffer: Arc<dyn Buffer>,
    listener: Arc<ListenerBinding>,
}

impl InPortSink {
    pub fn new(buffer: Arc<dyn Buffer>, listener: Arc<ListenerBinding>) -> Self {
        Self { buffer, listener }
    }

    /// Build from the optional pieces a provider collects before
    /// `publish_interface`.
    pub fn from_parts(
        buffer: &Option<Arc<dyn Buffer>>,
        listener: &Option<Arc<ListenerBinding>>,
    ) -> Result<Arc<Self>> {
        match (buffer, listener) {
            (Some(b), Some(l)) => Ok(Arc::new(Self::new(Arc::clone(b), Arc::clone(l)))),
            (None, _) => Err(Error::InvalidState("provider has no buffer".into())),
            (_, None) => Err(Error::InvalidState("provider has no listener".into())),
        }
    }

    pub fn put(&self, mut data: Record) -> DataPortStatus {
        use ConnectorDataListenerType as D;

        self.listener.notify_data(D::OnReceived, &mut data);
        let (status, rejected) = self.listener.write_buffer(
            &*self.buffer,
            data,
            Timeout::Default,
            &[D::OnReceiverFull, D::OnReceiverTimeout, D::OnReceiverError],
        );
        let mut rejected = rejected.unwrap_or_default();
        match status {
            BufferStatus::Ok => DataPortStatus::PortOk,
            BufferStatus::Full => {
                self.listener.notify_data(D::OnReceiverFull, &mut rejected);
                DataPortStatus::BufferFull
            }
            BufferStatus::Timeout => {
                self.listener.notify_data(D::OnReceiverTimeout, &mut rejected);
                DataPortStatus::BufferTimeout
            }
            BufferStatus::PreconditionNotMet => {
                self.listener.notify_data(D::OnReceiverError, &mut rejected);
                DataPortStatus::PreconditionNotMet
            }
            BufferStatus::Error | BufferStatus::Empty | BufferStatus::NotSupported => {
                self.listener.notify_data(D::OnReceiverError, &mut rejected);
                DataPortStatus::PortError
            }
        }
    }
}

/// Serve-side core shared by pull providers.
pub struct OutPortSource {
    buffer: Arc<dyn Buffer>,
    listener: Arc<ListenerBinding>,
}

impl OutPortSource {
    pub fn new(buffer: Arc<dyn Buffer>, listener: Arc<ListenerBinding>) -> Self {
        Self { buffer, listener }
    }

    pub fn from_parts(
        buffer: &Option<Arc<dyn Buffer>>,
        listener: &Option<Arc<ListenerBinding>>,
    ) -> Result<Arc<Self>> {
        match (buffer, listener) {
            (Some(b), Some(l)) => Ok(Arc::new(Self::new(Arc::clone(b), Arc::clone(l)))),
            (None, _) => Err(Error::InvalidState("provider has no buffer".into())),
            (_, None) => Err(Error::InvalidState("provider has no listener".into())),
        }
    }

    pub fn get(&self) -> std::result::Result<Record, DataPortStatus> {
        match self.listener.read_buffer(&*self.buffer, Timeout::Default) {
            Ok(mut data) => {
                self.listener
                    .notify_data(ConnectorDataListenerType::OnSend, &mut data);
                Ok(data)
            }
            Err(BufferStatus::Empty) => {
                self.listener.notify(ConnectorListenerType::OnSenderEmpty);
                Err(DataPortStatus::BufferEmpty)
            }
            Err(BufferStatus::Timeout) => {
                self.listener.notify(ConnectorListenerType::OnSenderTimeout);
                Err(DataPortStatus::BufferTimeout)
            }
            Err(BufferStatus::PreconditionNotMet) => {
                self.listener.notify(ConnectorListenerType::OnSenderError);
                Err(DataPortStatus::PreconditionNotMet)
            }
            Err(_) => {
                self.listener.notify(ConnectorListenerType::OnSenderError);
                Err(DataPortStatus::UnknownError)
            }
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

type Ctor<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

#[derive(Default)]
struct TransportEntry {
    inport_provider: Option<Ctor<dyn InPortProvider>>,
    inport_consumer: Option<Ctor<dyn InPortConsumer>>,
    outport_provider: Option<Ctor<dyn OutPortProvider>>,
    outport_consumer: Option<Ctor<dyn OutPortConsumer>>,
}

impl TransportEntry {
    fn supports(&self, dataflow: Dataflow) -> bool {
        match dataflow {
            Dataflow::Push => self.inport_provider.is_some() && self.inport_consumer.is_some(),
            Dataflow::Pull => self.outport_provider.is_some() && self.outport_consumer.is_some(),
        }
    }
}

/// Transports keyed by `dataport.interface_type`.
pub struct TransportRegistry {
    entries: RwLock<HashMap<String, TransportEntry>>,
    directory: Arc<EndpointDirectory>,
}

impl TransportRegistry {
    /// Empty registry with its own endpoint directory.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            directory: Arc::new(EndpointDirectory::new()),
        }
    }

    /// Registry with every built-in transport available on this platform.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let dir = Arc::clone(&registry.directory);
        let pull_dir = Arc::clone(&registry.directory);
        let push_dir = Arc::clone(&registry.directory);
        let fetch_dir = Arc::clone(&registry.directory);
        registry.register_push(
            LOCAL,
            move || Box::new(local::LocalInPortProvider::new(Arc::clone(&dir))),
            move || Box::new(local::LocalInPortConsumer::new(Arc::clone(&push_dir))),
        );
        registry.register_pull(
            LOCAL,
            move || Box::new(local::LocalOutPortProvider::new(Arc::clone(&pull_dir))),
            move || Box::new(local::LocalOutPortConsumer::new(Arc::clone(&fetch_dir))),
        );
        registry.register_push(
            TCP_STREAM,
            || Box::new(tcp::TcpInPortProvider::new()),
            || Box::new(tcp::TcpInPortConsumer::new()),
        );
        registry.register_push(
            UDP_DATAGRAM,
            || Box::new(udp::UdpInPortProvider::new()),
            || Box::new(udp::UdpInPortConsumer::new()),
        );
        #[cfg(target_os = "linux")]
        registry.register_push(
            SHARED_MEMORY,
            || Box::new(shm::ShmInPortProvider::new()),
            || Box::new(shm::ShmInPortConsumer::new()),
        );
        registry
    }

    /// Directory backing the `local` transport.
    pub fn directory(&self) -> &Arc<EndpointDirectory> {
        &self.directory
    }

    pub fn register_push<P, C>(&self, name: &str, provider: P, consumer: C)
    where
        P: Fn() -> Box<dyn InPortProvider> + Send + Sync + 'static,
        C: Fn() -> Box<dyn InPortConsumer> + Send + Sync + 'static,
    {
        let mut entries = self.entries.write();
        let entry = entries.entry(name.to_string()).or_default();
        entry.inport_provider = Some(Arc::new(provider));
        entry.inport_consumer = Some(Arc::new(consumer));
    }

    pub fn register_pull<P, C>(&self, name: &str, provider: P, consumer: C)
    where
        P: Fn() -> Box<dyn OutPortProvider> + Send + Sync + 'static,
        C: Fn() -> Box<dyn OutPortConsumer> + Send + Sync + 'static,
    {
        let mut entries = self.entries.write();
        let entry = entries.entry(name.to_string()).or_default();
        entry.outport_provider = Some(Arc::new(provider));
        entry.outport_consumer = Some(Arc::new(consumer));
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn supports(&self, interface_type: &str, dataflow: Dataflow) -> bool {
        self.entries
            .read()
            .get(interface_type)
            .is_some_and(|e| e.supports(dataflow))
    }

    /// Reject unknown transports and unsupported dataflow directions.
    pub fn check(&self, interface_type: &str, dataflow: Dataflow) -> Result<()> {
        let entries = self.entries.read();
        let entry = entries
            .get(interface_type)
            .ok_or_else(|| Error::UnknownInterfaceType(interface_type.to_string()))?;
        if !entry.supports(dataflow) {
            return Err(Error::UnsupportedDataflow {
                interface_type: interface_type.to_string(),
                dataflow_type: dataflow.to_string(),
            });
        }
        Ok(())
    }

    fn ctor<T: ?Sized>(
        &self,
        interface_type: &str,
        dataflow: Dataflow,
        pick: impl Fn(&TransportEntry) -> Option<Ctor<T>>,
    ) -> Result<Ctor<T>> {
        self.check(interface_type, dataflow)?;
        self.entries
            .read()
            .get(interface_type)
            .and_then(pick)
            .ok_or_else(|| Error::UnknownInterfaceType(interface_type.to_string()))
    }

    pub fn create_inport_provider(&self, interface_type: &str) -> Result<Box<dyn InPortProvider>> {
        let ctor = self.ctor(interface_type, Dataflow::Push, |e| e.inport_provider.clone())?;
        Ok(ctor())
    }

    pub fn create_inport_consumer(&self, interface_type: &str) -> Result<Box<dyn InPortConsumer>> {
        let ctor = self.ctor(interface_type, Dataflow::Push, |e| e.inport_consumer.clone())?;
        Ok(ctor())
    }

    pub fn create_outport_provider(
        &self,
        interface_type: &str,
    ) -> Result<Box<dyn OutPortProvider>> {
        let ctor = self.ctor(interface_type, Dataflow::Pull, |e| e.outport_provider.clone())?;
        Ok(ctor())
    }

    pub fn create_outport_consumer(
        &self,
        interface_type: &str,
    ) -> Result<Box<dyn OutPortConsumer>> {
        let ctor = self.ctor(interface_type, Dataflow::Pull, |e| e.outport_consumer.clone())?;
        Ok(ctor())
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
