// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error type for construction, configuration and connection
//! failures. Data-path operations report [`DataPortStatus`] instead.

use crate::cdr::CdrError;
use crate::status::DataPortStatus;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A property value could not be parsed or is out of range.
    InvalidProperty { key: String, value: String },
    /// `dataport.buffer_type` names no registered buffer.
    UnknownBufferType(String),
    /// `dataport.subscription_type` names no registered publisher.
    UnknownSubscriptionType(String),
    /// `dataport.interface_type` names no registered transport.
    UnknownInterfaceType(String),
    /// The transport does not implement the requested dataflow direction.
    UnsupportedDataflow {
        interface_type: String,
        dataflow_type: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Negotiated properties lack the transport address (property key).
    AddressMissing(String),
    /// The peer endpoint is not (or no longer) registered.
    EndpointNotFound(String),
    /// A connector with this id already exists on the port.
    AlreadyConnected(String),
    /// No connector with this id exists on the port.
    NotConnected(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// I/O error with underlying cause.
    Io(std::io::Error),
    /// Transport-specific setup failure.
    Transport(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// CDR encoding or decoding failed.
    Codec(CdrError),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Invalid state for the requested operation.
    InvalidState(String),
    /// A worker thread panicked while being joined.
    ThreadPanicked(&'static str),
}

impl Error {
    /// Status a port reports when a connection attempt fails with this error.
    pub fn status(&self) -> DataPortStatus {
        match self {
            Error::InvalidProperty { .. }
            | Error::UnknownBufferType(_)
            | Error::UnknownSubscriptionType(_)
            | Error::UnknownInterfaceType(_)
            | Error::UnsupportedDataflow { .. }
            | Error::AddressMissing(_) => DataPortStatus::InvalidArgs,
            Error::EndpointNotFound(_) => DataPortStatus::ConnectionLost,
            Error::AlreadyConnected(_) | Error::NotConnected(_) | Error::InvalidState(_) => {
                DataPortStatus::PreconditionNotMet
            }
            Error::Io(_) | Error::Transport(_) | Error::ThreadPanicked(_) => {
                DataPortStatus::PortError
            }
            Error::Codec(_) => DataPortStatus::BufferError,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidProperty { key, value } => {
                write!(f, "Invalid property value: {}='{}'", key, value)
            }
            Error::UnknownBufferType(name) => write!(f, "Unknown buffer type: {}", name),
            Error::UnknownSubscriptionType(name) => {
                write!(f, "Unknown subscription type: {}", name)
            }
            Error::UnknownInterfaceType(name) => write!(f, "Unknown interface type: {}", name),
            Error::UnsupportedDataflow {
                interface_type,
                dataflow_type,
            } => write!(
                f,
                "Interface type '{}' does not support {} dataflow",
                interface_type, dataflow_type
            ),
            Error::AddressMissing(key) => write!(f, "Endpoint address missing: {}", key),
            Error::EndpointNotFound(addr) => write!(f, "Endpoint not found: {}", addr),
            Error::AlreadyConnected(id) => write!(f, "Connector already exists: {}", id),
            Error::NotConnected(id) => write!(f, "No such connector: {}", id),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
            Error::Codec(e) => write!(f, "CDR error: {}", e),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::ThreadPanicked(name) => write!(f, "Thread panicked: {}", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CdrError> for Error {
    fn from(e: CdrError) -> Self {
        Error::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_map_to_invalid_args() {
        let err = Error::UnsupportedDataflow {
            interface_type: "udp_datagram".into(),
            dataflow_type: "pull".into(),
        };
        assert_eq!(err.status(), DataPortStatus::InvalidArgs);
        assert!(err.to_string().contains("udp_datagram"));
    }

    #[test]
    fn test_io_error_source() {
        let err = Error::from(std::io::Error::other("boom"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.status(), DataPortStatus::PortError);
    }
}
