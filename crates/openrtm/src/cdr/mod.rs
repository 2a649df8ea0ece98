// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Minimal CDR codec for typed ports.
//!
//! Transports move opaque byte records; [`OutPort`](crate::port::OutPort)
//! and [`InPort`](crate::port::InPort) turn values into records with
//! [`CdrCodec`] using the endianness negotiated in the connector profile
//! (`dataport.serializer.cdr.endian`).

mod cursor;

pub use cursor::{CdrReader, CdrWriter};

use crate::properties::Properties;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdrError {
    /// Input ended before the value was complete.
    UnexpectedEof { offset: usize, wanted: usize },
    /// A string was not NUL-terminated or not UTF-8.
    InvalidString { offset: usize },
    /// A `bool` byte other than 0 or 1.
    InvalidBool(u8),
    /// Sequence or string longer than a `u32` length prefix allows.
    TooLong { len: usize },
    /// Bytes left over after decoding a complete value.
    TrailingBytes(usize),
}

impl fmt::Display for CdrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CdrError::UnexpectedEof { offset, wanted } => {
                write!(f, "unexpected end of input at offset {} (wanted {})", offset, wanted)
            }
            CdrError::InvalidString { offset } => write!(f, "invalid string at offset {}", offset),
            CdrError::InvalidBool(b) => write!(f, "invalid bool byte 0x{:02x}", b),
            CdrError::TooLong { len } => write!(f, "length {} exceeds u32", len),
            CdrError::TrailingBytes(n) => write!(f, "{} trailing bytes", n),
        }
    }
}

impl std::error::Error for CdrError {}

pub type CdrResult<T> = std::result::Result<T, CdrError>;

/// Byte order of an encoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Endianness negotiated in a connector property bag. Anything other than
    /// `big` (case-insensitive) is little.
    pub fn from_properties(props: &Properties) -> Self {
        match props
            .get_lowercase(crate::connector::KEY_CDR_ENDIAN)
            .as_deref()
        {
            Some("big") => Endian::Big,
            _ => Endian::Little,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Endian::Little => "little",
            Endian::Big => "big",
        }
    }
}

/// Types that can travel through a data port.
pub trait CdrCodec: Sized {
    fn encode(&self, w: &mut CdrWriter) -> CdrResult<()>;
    fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self>;
}

/// Encode one value into a fresh record.
pub fn to_bytes<T: CdrCodec>(value: &T, endian: Endian) -> CdrResult<Vec<u8>> {
    let mut w = CdrWriter::new(endian);
    value.encode(&mut w)?;
    Ok(w.into_inner())
}

/// Decode one value; the whole record must be consumed.
pub fn from_bytes<T: CdrCodec>(bytes: &[u8], endian: Endian) -> CdrResult<T> {
    let mut r = CdrReader::new(bytes, endian);
    let value = T::decode(&mut r)?;
    match r.remaining() {
        0 => Ok(value),
        n => Err(CdrError::TrailingBytes(n)),
    }
}

macro_rules! impl_codec_primitive {
    ($type:ty, $write:ident, $read:ident) => {
        impl CdrCodec for $type {
            fn encode(&self, w: &mut CdrWriter) -> CdrResult<()> {
                w.$write(*self);
                Ok(())
            }

            fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self> {
                r.$read()
            }
        }
    };
}

impl_codec_primitive!(u8, write_u8, read_u8);
impl_codec_primitive!(i8, write_i8, read_i8);
impl_codec_primitive!(u16, write_u16, read_u16);
impl_codec_primitive!(i16, write_i16, read_i16);
impl_codec_primitive!(u32, write_u32, read_u32);
impl_codec_primitive!(i32, write_i32, read_i32);
impl_codec_primitive!(u64, write_u64, read_u64);
impl_codec_primitive!(i64, write_i64, read_i64);
impl_codec_primitive!(f32, write_f32, read_f32);
impl_codec_primitive!(f64, write_f64, read_f64);

impl CdrCodec for bool {
    fn encode(&self, w: &mut CdrWriter) -> CdrResult<()> {
        w.write_u8(u8::from(*self));
        Ok(())
    }

    fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self> {
        match r.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(CdrError::InvalidBool(b)),
        }
    }
}

/// CDR string: u32 length including the NUL terminator, bytes, NUL.
impl CdrCodec for String {
    fn encode(&self, w: &mut CdrWriter) -> CdrResult<()> {
        w.write_len(self.len() + 1)?;
        w.write_bytes(self.as_bytes());
        w.write_u8(0);
        Ok(())
    }

    fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self> {
        let len = r.read_len(1)?;
        let offset = r.offset();
        if len == 0 {
            return Err(CdrError::InvalidString { offset });
        }
        let raw = r.read_bytes(len)?;
        let (body, nul) = raw.split_at(len - 1);
        if nul[0] != 0 {
            return Err(CdrError::InvalidString { offset });
        }
        String::from_utf8(body.to_vec()).map_err(|_| CdrError::InvalidString { offset })
    }
}

/// CDR sequence: u32 element count followed by the elements.
impl<T: CdrCodec> CdrCodec for Vec<T> {
    fn encode(&self, w: &mut CdrWriter) -> CdrResult<()> {
        w.write_len(self.len())?;
        for item in self {
            item.encode(w)?;
        }
        Ok(())
    }

    fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self> {
        let len = r.read_len(1)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(T::decode(r)?);
        }
        Ok(out)
    }
}

/// Timestamp carried by every standard data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

impl Time {
    pub fn now() -> Self {
        let d = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: d.as_secs() as u32,
            nsec: d.subsec_nanos(),
        }
    }
}

impl CdrCodec for Time {
    fn encode(&self, w: &mut CdrWriter) -> CdrResult<()> {
        w.write_u32(self.sec);
        w.write_u32(self.nsec);
        Ok(())
    }

    fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self> {
        Ok(Self {
            sec: r.read_u32()?,
            nsec: r.read_u32()?,
        })
    }
}

/// Value stamped with a [`Time`], e.g. `TimedValue<f64>` for `TimedDouble`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimedValue<T> {
    pub tm: Time,
    pub data: T,
}

impl<T> TimedValue<T> {
    pub fn new(data: T) -> Self {
        Self {
            tm: Time::now(),
            data,
        }
    }
}

impl<T: CdrCodec> CdrCodec for TimedValue<T> {
    fn encode(&self, w: &mut CdrWriter) -> CdrResult<()> {
        self.tm.encode(w)?;
        self.data.encode(w)
    }

    fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self> {
        let tm = Time::decode(r)?;
        let data = T::decode(r)?;
        Ok(Self { tm, data })
    }
}
