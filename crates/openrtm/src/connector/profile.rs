// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connector profile: identity plus the negotiated property bag.

use crate::error::{Error, Result};
use crate::properties::Properties;
use crate::transport::Dataflow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const KEY_INTERFACE_TYPE: &str = "dataport.interface_type";
pub const KEY_DATAFLOW_TYPE: &str = "dataport.dataflow_type";
pub const KEY_SUBSCRIPTION_TYPE: &str = "dataport.subscription_type";
pub const KEY_BUFFER_TYPE: &str = "dataport.buffer_type";
pub const KEY_CDR_ENDIAN: &str = "dataport.serializer.cdr.endian";

static CONNECTOR_SEQ: AtomicU64 = AtomicU64::new(0);

/// Process-unique connector id: `<pid>-<unix nanos>-<sequence>` in hex.
pub fn generate_connector_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let seq = CONNECTOR_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{:08x}-{:016x}-{:08x}", std::process::id(), nanos, seq)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorProfile {
    pub name: String,
    pub connector_id: String,
    /// Names of the ports taking part in the connection.
    pub ports: Vec<String>,
    pub properties: Properties,
}

impl ConnectorProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.connector_id = id.into();
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.ports.push(port.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.set(key, value);
        self
    }

    /// Assign a generated id if none was given.
    pub fn ensure_id(&mut self) -> &str {
        if self.connector_id.is_empty() {
            self.connector_id = generate_connector_id();
        }
        &self.connector_id
    }

    pub fn interface_type(&self) -> &str {
        self.properties.get_or(KEY_INTERFACE_TYPE, crate::transport::LOCAL)
    }

    /// `push` unless the profile says otherwise.
    pub fn dataflow_type(&self) -> Result<Dataflow> {
        let raw = self
            .properties
            .get_lowercase(KEY_DATAFLOW_TYPE)
            .unwrap_or_else(|| "push".to_string());
        Dataflow::parse(&raw).ok_or_else(|| Error::InvalidProperty {
            key: KEY_DATAFLOW_TYPE.to_string(),
            value: raw,
        })
    }

    pub fn subscription_type(&self) -> String {
        self.properties
            .get_lowercase(KEY_SUBSCRIPTION_TYPE)
            .unwrap_or_else(|| crate::publisher::FLUSH.to_string())
    }

    pub fn buffer_type(&self) -> String {
        self.properties
            .get_lowercase(KEY_BUFFER_TYPE)
            .unwrap_or_else(|| crate::buffer::RING_BUFFER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_connector_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_ensure_id_keeps_explicit_id() {
        let mut explicit = ConnectorProfile::new("c").with_id("fixed");
        assert_eq!(explicit.ensure_id(), "fixed");

        let mut generated = ConnectorProfile::new("c");
        let id = generated.ensure_id().to_string();
        assert!(!id.is_empty());
        assert_eq!(generated.ensure_id(), id);
    }

    #[test]
    fn test_defaults() {
        let profile = ConnectorProfile::new("c");
        assert_eq!(profile.interface_type(), "local");
        assert_eq!(profile.dataflow_type().unwrap(), Dataflow::Push);
        assert_eq!(profile.subscription_type(), "flush");
        assert_eq!(profile.buffer_type(), "ring_buffer");

        let bad = ConnectorProfile::new("c").with_property(KEY_DATAFLOW_TYPE, "sideways");
        assert!(bad.dataflow_type().is_err());
    }
}
