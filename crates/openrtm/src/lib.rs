// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # openrtm - RT-Component data ports and execution contexts
//!
//! Components exchange typed records over named data ports and are driven
//! by execution contexts that run their lifecycle callbacks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use openrtm::{connect, ConnectorProfile, InPort, OutPort, Registries};
//!
//! let registries = Registries::with_defaults();
//! let out: OutPort<f64> = OutPort::new("velocity", registries.clone());
//! let inp: InPort<f64> = InPort::new("velocity", registries);
//!
//! let profile = ConnectorProfile::new("vel")
//!     .with_property("dataport.interface_type", "tcp_stream")
//!     .with_property("dataport.subscription_type", "new");
//! connect(out.base(), inp.base(), profile)?;
//!
//! out.write(&1.5);
//! # Ok::<(), openrtm::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  RtObject (ComponentAction)  <--  ExecutionContext (ec)      |
//! +--------------------------------------------------------------+
//! |  OutPort<T> / InPort<T>        CDR encode / decode           |
//! +--------------------------------------------------------------+
//! |  Connector: buffer + publisher + provider/consumer           |
//! |             + ConnectorListeners                             |
//! +--------------------------------------------------------------+
//! |  Transports: local | tcp_stream | udp_datagram | shared_mem  |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Registries`] | Buffer, publisher and transport factories, shared by `Arc` |
//! | [`OutPort`] / [`InPort`] | Typed data ports |
//! | [`ConnectorProfile`] | Negotiated connection properties |
//! | [`RingBuffer`] | Bounded FIFO with full/empty policies |
//! | [`PeriodicExecutionContext`] | Fixed-rate scheduler thread |
//! | [`RtObject`] | Component: behaviour, ports, contexts |

pub mod buffer;
/// CDR encoding for values carried by typed ports.
pub mod cdr;
/// Typed configuration derived from property bags.
pub mod config;
pub mod connector;
pub mod ec;
pub mod error;
/// String-keyed constructor registry.
pub mod factory;
pub mod listener;
pub mod port;
/// Dotted-key property bags.
pub mod properties;
pub mod publisher;
pub mod rtobject;
/// Data-port and component return codes.
pub mod status;
mod sync;
pub mod transport;

pub use buffer::{Buffer, Record, RingBuffer, Timeout};
pub use cdr::{CdrCodec, Endian, Time, TimedValue};
pub use config::{BufferConfig, EcConfig, EmptyPolicy, FullPolicy, PublisherConfig, PushPolicy};
pub use connector::{ConnectorProfile, Registries};
pub use ec::{
    EcHandle, ExecutionContext, ExtTrigExecutionContext, LifeCycleState,
    PeriodicExecutionContext,
};
pub use error::{Error, Result};
pub use listener::{
    ConnectorDataListener, ConnectorDataListenerType, ConnectorListener, ConnectorListenerType,
    ConnectorListeners, ListenerStatus,
};
pub use port::{connect, disconnect, InPort, OutPort};
pub use properties::Properties;
pub use rtobject::{ComponentAction, RtObject};
pub use status::{DataPortStatus, ReturnCode};
pub use transport::Dataflow;
