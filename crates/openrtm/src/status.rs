// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Status taxonomies shared by buffers, transports, publishers and components.
//!
//! Data-port operations never panic or return `Result` on the hot path; they
//! report one of the [`DataPortStatus`] codes instead, which also travel over
//! the wire as a single byte (stream and shared-memory transports).

use std::fmt;

/// Outcome of a data-port operation (write, read, put, get).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataPortStatus {
    PortOk,
    PortError,
    BufferError,
    BufferFull,
    BufferEmpty,
    BufferTimeout,
    SendFull,
    SendTimeout,
    RecvEmpty,
    RecvTimeout,
    InvalidArgs,
    PreconditionNotMet,
    ConnectionLost,
    UnknownError,
}

impl DataPortStatus {
    /// Stable wire code.
    pub fn code(self) -> u8 {
        match self {
            Self::PortOk => 0,
            Self::PortError => 1,
            Self::BufferError => 2,
            Self::BufferFull => 3,
            Self::BufferEmpty => 4,
            Self::BufferTimeout => 5,
            Self::SendFull => 6,
            Self::SendTimeout => 7,
            Self::RecvEmpty => 8,
            Self::RecvTimeout => 9,
            Self::InvalidArgs => 10,
            Self::PreconditionNotMet => 11,
            Self::ConnectionLost => 12,
            Self::UnknownError => 13,
        }
    }

    /// Decode a wire code. Codes outside the table decode as `UnknownError`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::PortOk,
            1 => Self::PortError,
            2 => Self::BufferError,
            3 => Self::BufferFull,
            4 => Self::BufferEmpty,
            5 => Self::BufferTimeout,
            6 => Self::SendFull,
            7 => Self::SendTimeout,
            8 => Self::RecvEmpty,
            9 => Self::RecvTimeout,
            10 => Self::InvalidArgs,
            11 => Self::PreconditionNotMet,
            12 => Self::ConnectionLost,
            _ => Self::UnknownError,
        }
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self == Self::PortOk
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PortOk => "PORT_OK",
            Self::PortError => "PORT_ERROR",
            Self::BufferError => "BUFFER_ERROR",
            Self::BufferFull => "BUFFER_FULL",
            Self::BufferEmpty => "BUFFER_EMPTY",
            Self::BufferTimeout => "BUFFER_TIMEOUT",
            Self::SendFull => "SEND_FULL",
            Self::SendTimeout => "SEND_TIMEOUT",
            Self::RecvEmpty => "RECV_EMPTY",
            Self::RecvTimeout => "RECV_TIMEOUT",
            Self::InvalidArgs => "INVALID_ARGS",
            Self::PreconditionNotMet => "PRECONDITION_NOT_MET",
            Self::ConnectionLost => "CONNECTION_LOST",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for DataPortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BufferStatus> for DataPortStatus {
    /// Buffer status seen from a port: a full buffer on the sending side is
    /// `BufferFull`, an empty one `BufferEmpty`.
    fn from(status: BufferStatus) -> Self {
        match status {
            BufferStatus::Ok => Self::PortOk,
            BufferStatus::Error => Self::BufferError,
            BufferStatus::Full => Self::BufferFull,
            BufferStatus::Empty => Self::BufferEmpty,
            BufferStatus::PreconditionNotMet => Self::PreconditionNotMet,
            BufferStatus::Timeout => Self::BufferTimeout,
            BufferStatus::NotSupported => Self::PortError,
        }
    }
}

/// Outcome of a ring-buffer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferStatus {
    Ok,
    Error,
    Full,
    Empty,
    PreconditionNotMet,
    Timeout,
    NotSupported,
}

impl fmt::Display for BufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "BUFFER_OK",
            Self::Error => "BUFFER_ERROR",
            Self::Full => "BUFFER_FULL",
            Self::Empty => "BUFFER_EMPTY",
            Self::PreconditionNotMet => "PRECONDITION_NOT_MET",
            Self::Timeout => "TIMEOUT",
            Self::NotSupported => "NOT_SUPPORTED",
        };
        f.write_str(s)
    }
}

/// Result of component callbacks and execution-context requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Ok,
    Error,
    BadParameter,
    Unsupported,
    OutOfResources,
    PreconditionNotMet,
}

impl ReturnCode {
    #[inline]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "RTC_OK",
            Self::Error => "RTC_ERROR",
            Self::BadParameter => "BAD_PARAMETER",
            Self::Unsupported => "UNSUPPORTED",
            Self::OutOfResources => "OUT_OF_RESOURCES",
            Self::PreconditionNotMet => "PRECONDITION_NOT_MET",
        };
        f.write_str(s)
    }
}
