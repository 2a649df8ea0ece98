// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::OutPortBase;
use crate::cdr::{self, CdrCodec};
use crate::connector::Registries;
use crate::status::DataPortStatus;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed OutPort. Each write is encoded once per negotiated endianness and
/// fanned out to every connector.
pub struct OutPort<T> {
    base: Arc<OutPortBase>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: CdrCodec> OutPort<T> {
    pub fn new(name: impl Into<String>, registries: Arc<Registries>) -> Self {
        Self {
            base: Arc::new(OutPortBase::new(name, registries)),
            _marker: PhantomData,
        }
    }

    /// Untyped side of the port, used by [`super::connect`].
    pub fn base(&self) -> &Arc<OutPortBase> {
        &self.base
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn write(&self, value: &T) -> DataPortStatus {
        self.base.write_with(|endian| {
            cdr::to_bytes(value, endian).map_err(|e| {
                log::warn!("[OutPort] {} encode failed: {}", self.base.name(), e);
                DataPortStatus::PortError
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorProfile, KEY_CDR_ENDIAN};
    use crate::port::{connect, InPort};

    #[test]
    fn test_write_without_connectors_is_ok() {
        let port: OutPort<i32> = OutPort::new("out", Registries::with_defaults());
        assert_eq!(port.write(&1), DataPortStatus::PortOk);
    }

    #[test]
    fn test_big_endian_connector_receives_big_endian_bytes() {
        let reg = Registries::with_defaults();
        let out: OutPort<u32> = OutPort::new("out", Arc::clone(&reg));
        let inp: InPort<u32> = InPort::new("in", reg);
        let profile = ConnectorProfile::new("be").with_property(KEY_CDR_ENDIAN, "big");
        connect(out.base(), inp.base(), profile).unwrap();

        assert!(out.write(&0x0102_0304).is_ok());
        let (bytes, endian) = inp.base().read_record(Default::default()).unwrap();
        assert_eq!(endian, crate::cdr::Endian::Big);
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }
}
