// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data ports and connection negotiation.
//!
//! [`connect`] wires an OutPort to an InPort. The providing side is built
//! first and publishes its address into the profile; the consuming side is
//! then built from that negotiated profile:
//!
//! | Dataflow | Provider side                 | Consumer side               |
//! |----------|-------------------------------|-----------------------------|
//! | push     | [`InPortPushConnector`]       | [`OutPortPushConnector`]    |
//! | pull     | [`OutPortPullConnector`]      | [`InPortPullConnector`]     |
//!
//! An unknown transport, or one that lacks the requested dataflow, is
//! rejected before anything is built; [`Error::status`] maps it to
//! `InvalidArgs`.

mod inport;
mod outport;

pub use inport::InPort;
pub use outport::OutPort;

use crate::buffer::{Record, Timeout};
use crate::cdr::Endian;
use crate::connector::{
    ConnectorProfile, InPortConnector, InPortPullConnector, InPortPushConnector,
    OutPortConnector, OutPortPullConnector, OutPortPushConnector, Registries,
};
use crate::error::{Error, Result};
use crate::listener::ConnectorListeners;
use crate::status::DataPortStatus;
use crate::transport::Dataflow;
use parking_lot::RwLock;
use std::sync::Arc;

// ============================================================================
// OutPort
// ============================================================================

/// Untyped OutPort: a name, a listener registry and the connectors writes
/// fan out to.
pub struct OutPortBase {
    name: String,
    listeners: Arc<ConnectorListeners>,
    connectors: RwLock<Vec<Box<dyn OutPortConnector>>>,
    registries: Arc<Registries>,
}

impl OutPortBase {
    pub fn new(name: impl Into<String>, registries: Arc<Registries>) -> Self {
        Self {
            name: name.into(),
            listeners: Arc::new(ConnectorListeners::new()),
            connectors: RwLock::new(Vec::new()),
            registries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn listeners(&self) -> &Arc<ConnectorListeners> {
        &self.listeners
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    /// Write the record produced by `encode` for each connector's
    /// negotiated endianness. Returns `PortOk` only if every connector
    /// accepted it, otherwise the first failure.
    pub fn write_with<F>(&self, mut encode: F) -> DataPortStatus
    where
        F: FnMut(Endian) -> std::result::Result<Record, DataPortStatus>,
    {
        let connectors = self.connectors.read();
        let mut result = DataPortStatus::PortOk;
        let mut cache: [Option<Record>; 2] = [None, None];
        for connector in connectors.iter() {
            let endian = connector.endian();
            let slot = &mut cache[endian as usize];
            let record = match slot {
                Some(r) => r.clone(),
                None => match encode(endian) {
                    Ok(r) => {
                        *slot = Some(r.clone());
                        r
                    }
                    Err(status) => return status,
                },
            };
            let status = connector.write(record);
            if !status.is_ok() {
                log::debug!(
                    "[OutPort] {} connector {}: {}",
                    self.name,
                    connector.id(),
                    status
                );
                if result.is_ok() {
                    result = status;
                }
            }
        }
        result
    }

    /// Write the same bytes to every connector.
    pub fn write_record(&self, data: &[u8]) -> DataPortStatus {
        self.write_with(|_| Ok(data.to_vec()))
    }

    pub fn add_connector(&self, connector: Box<dyn OutPortConnector>) -> Result<()> {
        let mut connectors = self.connectors.write();
        if connectors.iter().any(|c| c.id() == connector.id()) {
            return Err(Error::AlreadyConnected(connector.id().to_string()));
        }
        connectors.push(connector);
        Ok(())
    }

    pub fn has_connector(&self, id: &str) -> bool {
        self.connectors.read().iter().any(|c| c.id() == id)
    }

    pub fn connector_ids(&self) -> Vec<String> {
        self.connectors.read().iter().map(|c| c.id().to_string()).collect()
    }

    pub fn connector_profiles(&self) -> Vec<ConnectorProfile> {
        self.connectors.read().iter().map(|c| c.profile()).collect()
    }

    /// Remove and disconnect one connector.
    pub fn disconnect(&self, id: &str) -> Result<()> {
        let mut removed = {
            let mut connectors = self.connectors.write();
            let pos = connectors
                .iter()
                .position(|c| c.id() == id)
                .ok_or_else(|| Error::NotConnected(id.to_string()))?;
            connectors.remove(pos)
        };
        removed.disconnect();
        Ok(())
    }

    pub fn disconnect_all(&self) {
        let drained: Vec<_> = self.connectors.write().drain(..).collect();
        for mut connector in drained {
            connector.disconnect();
        }
    }

    /// Disconnect everything and drop `autoclean` listeners.
    pub fn finalize(&self) {
        self.disconnect_all();
        self.listeners.clear_autoclean();
    }
}

// ============================================================================
// InPort
// ============================================================================

/// Untyped InPort.
pub struct InPortBase {
    name: String,
    listeners: Arc<ConnectorListeners>,
    connectors: RwLock<Vec<Box<dyn InPortConnector>>>,
    registries: Arc<Registries>,
}

impl InPortBase {
    pub fn new(name: impl Into<String>, registries: Arc<Registries>) -> Self {
        Self {
            name: name.into(),
            listeners: Arc::new(ConnectorListeners::new()),
            connectors: RwLock::new(Vec::new()),
            registries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn listeners(&self) -> &Arc<ConnectorListeners> {
        &self.listeners
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    /// Read from the connectors in connection order; the first record wins.
    ///
    /// Without connectors this is `PreconditionNotMet`; when every
    /// connector fails, the first connector's status is returned.
    pub fn read_record(
        &self,
        timeout: Timeout,
    ) -> std::result::Result<(Record, Endian), DataPortStatus> {
        let connectors = self.connectors.read();
        let mut first_err = None;
        for connector in connectors.iter() {
            match connector.read(timeout) {
                Ok(data) => return Ok((data, connector.endian())),
                Err(status) => {
                    first_err.get_or_insert(status);
                }
            }
        }
        Err(first_err.unwrap_or(DataPortStatus::PreconditionNotMet))
    }

    /// Unread records across push connectors.
    pub fn readable(&self) -> usize {
        self.connectors.read().iter().map(|c| c.readable()).sum()
    }

    pub fn add_connector(&self, connector: Box<dyn InPortConnector>) -> Result<()> {
        let mut connectors = self.connectors.write();
        if connectors.iter().any(|c| c.id() == connector.id()) {
            return Err(Error::AlreadyConnected(connector.id().to_string()));
        }
        connectors.push(connector);
        Ok(())
    }

    pub fn has_connector(&self, id: &str) -> bool {
        self.connectors.read().iter().any(|c| c.id() == id)
    }

    pub fn connector_ids(&self) -> Vec<String> {
        self.connectors.read().iter().map(|c| c.id().to_string()).collect()
    }

    pub fn connector_profiles(&self) -> Vec<ConnectorProfile> {
        self.connectors.read().iter().map(|c| c.profile()).collect()
    }

    pub fn disconnect(&self, id: &str) -> Result<()> {
        let mut removed = {
            let mut connectors = self.connectors.write();
            let pos = connectors
                .iter()
                .position(|c| c.id() == id)
                .ok_or_else(|| Error::NotConnected(id.to_string()))?;
            connectors.remove(pos)
        };
        removed.disconnect();
        Ok(())
    }

    pub fn disconnect_all(&self) {
        let drained: Vec<_> = self.connectors.write().drain(..).collect();
        for mut connector in drained {
            connector.disconnect();
        }
    }

    pub fn finalize(&self) {
        self.disconnect_all();
        self.listeners.clear_autoclean();
    }
}

// ============================================================================
// Negotiation
// ============================================================================

/// Connect `out` to `inp`. Returns the negotiated profile (with the
/// connector id and the provider address filled in).
pub fn connect(
    out: &OutPortBase,
    inp: &InPortBase,
    mut profile: ConnectorProfile,
) -> Result<ConnectorProfile> {
    let id = profile.ensure_id().to_string();
    if out.has_connector(&id) || inp.has_connector(&id) {
        return Err(Error::AlreadyConnected(id));
    }
    if profile.ports.is_empty() {
        profile.ports = vec![out.name().to_string(), inp.name().to_string()];
    }

    let dataflow = profile.dataflow_type()?;
    let registries = out.registries();
    registries
        .transports
        .check(profile.interface_type(), dataflow)?;

    let negotiated = match dataflow {
        Dataflow::Push => {
            let provider =
                InPortPushConnector::new(profile, Arc::clone(inp.listeners()), registries)?;
            let negotiated = provider.profile();
            // A consumer failure drops (and so disconnects) the provider.
            let consumer =
                OutPortPushConnector::new(negotiated.clone(), Arc::clone(out.listeners()), registries)?;
            inp.add_connector(Box::new(provider))?;
            if let Err(e) = out.add_connector(Box::new(consumer)) {
                let _ = inp.disconnect(&negotiated.connector_id);
                return Err(e);
            }
            negotiated
        }
        Dataflow::Pull => {
            let provider =
                OutPortPullConnector::new(profile, Arc::clone(out.listeners()), registries)?;
            let negotiated = provider.profile();
            let consumer =
                InPortPullConnector::new(negotiated.clone(), Arc::clone(inp.listeners()), registries)?;
            out.add_connector(Box::new(provider))?;
            if let Err(e) = inp.add_connector(Box::new(consumer)) {
                let _ = out.disconnect(&negotiated.connector_id);
                return Err(e);
            }
            negotiated
        }
    };

    log::info!(
        "[Port] connected {} -> {} ({}, {} over {})",
        out.name(),
        inp.name(),
        negotiated.connector_id,
        dataflow,
        negotiated.interface_type()
    );
    Ok(negotiated)
}

/// Disconnect both ends of connector `id`. Succeeds if either end knew it.
pub fn disconnect(out: &OutPortBase, inp: &InPortBase, id: &str) -> Result<()> {
    // Tear down the sending side first so no publisher thread is mid-send
    // when the provider goes away.
    let out_result = out.disconnect(id);
    let in_result = inp.disconnect(id);
    match (out_result, in_result) {
        (Err(e), Err(_)) => Err(e),
        _ => Ok(()),
    }
}
