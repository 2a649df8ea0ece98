// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process request/response transport.
//!
//! Providers register their receive (push) or serve (pull) core in an
//! [`EndpointDirectory`] under an opaque `local:<id>` address. Consumers
//! look the address up on every call, so a provider that has shut down is
//! seen as `ConnectionLost` immediately.

use super::{
    consumer_status, inport_addr_key, outport_addr_key, required_addr, InPortConsumer,
    InPortProvider, InPortSink, OutPortConsumer, OutPortProvider, OutPortSource, LOCAL,
};
use crate::buffer::{Buffer, Record};
use crate::error::{Error, Result};
use crate::listener::ListenerBinding;
use crate::properties::Properties;
use crate::status::DataPortStatus;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A registered provider core.
#[derive(Clone)]
pub enum Endpoint {
    Push(Arc<InPortSink>),
    Pull(Arc<OutPortSource>),
}

/// Address book of in-process providers.
pub struct EndpointDirectory {
    endpoints: DashMap<String, Endpoint>,
    next_id: AtomicU64,
}

impl EndpointDirectory {
    pub fn new() -> Self {
        Self {
            endpoints: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an endpoint and return its fresh address.
    pub fn register(&self, endpoint: Endpoint) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let addr = format!("local:{}", id);
        self.endpoints.insert(addr.clone(), endpoint);
        log::debug!("[Local] registered endpoint {}", addr);
        addr
    }

    pub fn resolve(&self, addr: &str) -> Option<Endpoint> {
        self.endpoints.get(addr).map(|e| e.value().clone())
    }

    pub fn unregister(&self, addr: &str) -> bool {
        let removed = self.endpoints.remove(addr).is_some();
        if removed {
            log::debug!("[Local] unregistered endpoint {}", addr);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl Default for EndpointDirectory {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Push
// ============================================================================

pub struct LocalInPortProvider {
    directory: Arc<EndpointDirectory>,
    buffer: Option<Arc<dyn Buffer>>,
    listener: Option<Arc<ListenerBinding>>,
    sink: Option<Arc<InPortSink>>,
    addr: Option<String>,
}

impl LocalInPortProvider {
    pub fn new(directory: Arc<EndpointDirectory>) -> Self {
        Self {
            directory,
            buffer: None,
            listener: None,
            sink: None,
            addr: None,
        }
    }
}

impl InPortProvider for LocalInPortProvider {
    fn init(&mut self, _props: &Properties) -> Result<()> {
        Ok(())
    }

    fn set_buffer(&mut self, buffer: Arc<dyn Buffer>) {
        self.buffer = Some(buffer);
    }

    fn set_listener(&mut self, listener: Arc<ListenerBinding>) {
        self.listener = Some(listener);
    }

    fn publish_interface(&mut self, props: &mut Properties) -> Result<()> {
        if self.addr.is_some() {
            return Err(Error::InvalidState("local provider already published".into()));
        }
        let sink = InPortSink::from_parts(&self.buffer, &self.listener)?;
        let addr = self.directory.register(Endpoint::Push(Arc::clone(&sink)));
        props.set(inport_addr_key(LOCAL), addr.clone());
        self.sink = Some(sink);
        self.addr = Some(addr);
        Ok(())
    }

    fn put(&self, data: Record) -> DataPortStatus {
        match &self.sink {
            Some(sink) => sink.put(data),
            None => DataPortStatus::PreconditionNotMet,
        }
    }

    fn shutdown(&mut self) {
        if let Some(addr) = self.addr.take() {
            self.directory.unregister(&addr);
        }
        self.sink = None;
    }
}

impl Drop for LocalInPortProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct LocalInPortConsumer {
    directory: Arc<EndpointDirectory>,
    addr: RwLock<Option<String>>,
}

impl LocalInPortConsumer {
    pub fn new(directory: Arc<EndpointDirectory>) -> Self {
        Self {
            directory,
            addr: RwLock::new(None),
        }
    }
}

impl InPortConsumer for LocalInPortConsumer {
    fn init(&mut self, _props: &Properties) -> Result<()> {
        Ok(())
    }

    fn subscribe_interface(&mut self, props: &Properties) -> Result<()> {
        let addr = required_addr(props, &inport_addr_key(LOCAL))?;
        match self.directory.resolve(&addr) {
            Some(Endpoint::Push(_)) => {
                *self.addr.write() = Some(addr);
                Ok(())
            }
            _ => Err(Error::EndpointNotFound(addr)),
        }
    }

    fn unsubscribe_interface(&self) {
        *self.addr.write() = None;
    }

    fn put(&self, data: &[u8]) -> DataPortStatus {
        let addr = self.addr.read();
        let Some(addr) = addr.as_deref() else {
            return DataPortStatus::ConnectionLost;
        };
        match self.directory.resolve(addr) {
            Some(Endpoint::Push(sink)) => consumer_status(sink.put(data.to_vec())),
            _ => DataPortStatus::ConnectionLost,
        }
    }
}

// ============================================================================
// Pull
// ============================================================================

pub struct LocalOutPortProvider {
    directory: Arc<EndpointDirectory>,
    buffer: Option<Arc<dyn Buffer>>,
    listener: Option<Arc<ListenerBinding>>,
    source: Option<Arc<OutPortSource>>,
    addr: Option<String>,
}

impl LocalOutPortProvider {
    pub fn new(directory: Arc<EndpointDirectory>) -> Self {
        Self {
            directory,
            buffer: None,
            listener: None,
            source: None,
            addr: None,
        }
    }
}

impl OutPortProvider for LocalOutPortProvider {
    fn init(&mut self, _props: &Properties) -> Result<()> {
        Ok(())
    }

    fn set_buffer(&mut self, buffer: Arc<dyn Buffer>) {
        self.buffer = Some(buffer);
    }

    fn set_listener(&mut self, listener: Arc<ListenerBinding>) {
        self.listener = Some(listener);
    }

    fn publish_interface(&mut self, props: &mut Properties) -> Result<()> {
        if self.addr.is_some() {
            return Err(Error::InvalidState("local provider already published".into()));
        }
        let source = OutPortSource::from_parts(&self.buffer, &self.listener)?;
        let addr = self.directory.register(Endpoint::Pull(Arc::clone(&source)));
        props.set(outport_addr_key(LOCAL), addr.clone());
        self.source = Some(source);
        self.addr = Some(addr);
        Ok(())
    }

    fn get(&self) -> std::result::Result<Record, DataPortStatus> {
        match &self.source {
            Some(source) => source.get(),
            None => Err(DataPortStatus::PreconditionNotMet),
        }
    }

    fn shutdown(&mut self) {
        if let Some(addr) = self.addr.take() {
            self.directory.unregister(&addr);
        }
        self.source = None;
    }
}

impl Drop for LocalOutPortProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct LocalOutPortConsumer {
    directory: Arc<EndpointDirectory>,
    addr: RwLock<Option<String>>,
}

impl LocalOutPortConsumer {
    pub fn new(directory: Arc<EndpointDirectory>) -> Self {
        Self {
            directory,
            addr: RwLock::new(None),
        }
    }
}

impl OutPortConsumer for LocalOutPortConsumer {
    fn init(&mut self, _props: &Properties) -> Result<()> {
        Ok(())
    }

    fn subscribe_interface(&mut self, props: &Properties) -> Result<()> {
        let addr = required_addr(props, &outport_addr_key(LOCAL))?;
        match self.directory.resolve(&addr) {
            Some(Endpoint::Pull(_)) => {
                *self.addr.write() = Some(addr);
                Ok(())
            }
            _ => Err(Error::EndpointNotFound(addr)),
        }
    }

    fn unsubscribe_interface(&self) {
        *self.addr.write() = None;
    }

    fn get(&self) -> std::result::Result<Record, DataPortStatus> {
        let addr = self.addr.read();
        let Some(addr) = addr.as_deref() else {
            return Err(DataPortStatus::ConnectionLost);
        };
        match self.directory.resolve(addr) {
            Some(Endpoint::Pull(source)) => source.get(),
            _ => Err(DataPortStatus::ConnectionLost),
        }
    }
}
