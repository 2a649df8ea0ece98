// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endian-aware CDR cursors.
//!
//! Primitives are aligned to their own size relative to the start of the
//! stream, as CDR requires.

use super::{CdrError, CdrResult, Endian};

/// Generate aligned write methods for primitive types.
macro_rules! impl_write {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type) {
            self.align($size);
            let bytes = match self.endian {
                Endian::Little => value.to_le_bytes(),
                Endian::Big => value.to_be_bytes(),
            };
            self.buffer.extend_from_slice(&bytes);
        }
    };
}

/// Generate aligned read methods for primitive types.
macro_rules! impl_read {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> CdrResult<$type> {
            self.align($size)?;
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(match self.endian {
                Endian::Little => <$type>::from_le_bytes(bytes),
                Endian::Big => <$type>::from_be_bytes(bytes),
            })
        }
    };
}

/// Growable writer.
pub struct CdrWriter {
    buffer: Vec<u8>,
    endian: Endian,
}

impl CdrWriter {
    pub fn new(endian: Endian) -> Self {
        Self {
            buffer: Vec::with_capacity(64),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    impl_write!(write_u16, u16, 2);
    impl_write!(write_u32, u32, 4);
    impl_write!(write_u64, u64, 8);
    impl_write!(write_i16, i16, 2);
    impl_write!(write_i32, i32, 4);
    impl_write!(write_i64, i64, 8);
    impl_write!(write_f32, f32, 4);
    impl_write!(write_f64, f64, 8);

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buffer.push(value as u8);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Sequence/string length prefix.
    pub fn write_len(&mut self, len: usize) -> CdrResult<()> {
        let len = u32::try_from(len).map_err(|_| CdrError::TooLong { len })?;
        self.write_u32(len);
        Ok(())
    }

    fn align(&mut self, alignment: usize) {
        let pad = (alignment - self.buffer.len() % alignment) % alignment;
        self.buffer.resize(self.buffer.len() + pad, 0);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Bounds-checked reader.
pub struct CdrReader<'a> {
    buffer: &'a [u8],
    offset: usize,
    endian: Endian,
}

impl<'a> CdrReader<'a> {
    pub fn new(buffer: &'a [u8], endian: Endian) -> Self {
        Self {
            buffer,
            offset: 0,
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    impl_read!(read_u16, u16, 2);
    impl_read!(read_u32, u32, 4);
    impl_read!(read_u64, u64, 8);
    impl_read!(read_i16, i16, 2);
    impl_read!(read_i32, i32, 4);
    impl_read!(read_i64, i64, 8);
    impl_read!(read_f32, f32, 4);
    impl_read!(read_f64, f64, 8);

    pub fn read_u8(&mut self) -> CdrResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> CdrResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bytes(&mut self, len: usize) -> CdrResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(CdrError::UnexpectedEof {
                offset: self.offset,
                wanted: len,
            })?;
        let slice = &self.buffer[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Sequence/string length prefix, checked against the bytes left so a
    /// corrupt length cannot trigger a huge allocation.
    pub fn read_len(&mut self, min_elem_size: usize) -> CdrResult<usize> {
        let len = self.read_u32()? as usize;
        if len.saturating_mul(min_elem_size.max(1)) > self.remaining() {
            return Err(CdrError::UnexpectedEof {
                offset: self.offset,
                wanted: len,
            });
        }
        Ok(len)
    }

    fn align(&mut self, alignment: usize) -> CdrResult<()> {
        let pad = (alignment - self.offset % alignment) % alignment;
        self.read_bytes(pad).map(|_| ())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_padding() {
        let mut w = CdrWriter::new(Endian::Little);
        w.write_u8(0xAB);
        w.write_u32(0x1234_5678);
        w.write_u8(0x01);
        w.write_u64(1);
        let bytes = w.into_inner();
        // u8, 3 pad, u32, u8, 7 pad, u64
        assert_eq!(bytes.len(), 1 + 3 + 4 + 1 + 7 + 8);
        assert_eq!(&bytes[4..8], &0x1234_5678u32.to_le_bytes());

        let mut r = CdrReader::new(&bytes, Endian::Little);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u64().unwrap(), 1);
        assert!(r.is_eof());
    }

    #[test]
    fn test_big_endian_layout() {
        let mut w = CdrWriter::new(Endian::Big);
        w.write_u32(0x0102_0304);
        assert_eq!(w.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_truncated_input_reports_offset() {
        let bytes = [0u8; 6];
        let mut r = CdrReader::new(&bytes, Endian::Little);
        r.read_u32().unwrap();
        match r.read_u32() {
            Err(CdrError::UnexpectedEof { offset, wanted }) => {
                assert_eq!(offset, 4);
                assert_eq!(wanted, 4);
            }
            other => panic!("expected EOF, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_length_is_rejected() {
        let mut w = CdrWriter::new(Endian::Little);
        w.write_u32(u32::MAX);
        let bytes = w.into_inner();
        let mut r = CdrReader::new(&bytes, Endian::Little);
        assert!(r.read_len(1).is_err());
    }
}
