// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefix framing for data records over a byte stream.
//!
//! ```text
//! +----------------+-------------------+
//! | Length (4B BE) | Record bytes      |
//! +----------------+-------------------+
//! ```
//!
//! The provider answers every frame with a single status byte
//! ([`DataPortStatus::code`](crate::status::DataPortStatus::code)).

use std::io::{self, Read};

const LEN_PREFIX: usize = 4;

/// Largest record a connection accepts by default (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Outcome of topping up a partially filled slice.
enum Fill {
    Done,
    Starved,
    Eof,
}

/// Reads into `dst[*at..]` until it is full, the reader would block or EOF.
fn fill<R: Read + ?Sized>(reader: &mut R, dst: &mut [u8], at: &mut usize) -> io::Result<Fill> {
    while *at < dst.len() {
        match reader.read(&mut dst[*at..]) {
            Ok(0) => return Ok(Fill::Eof),
            Ok(n) => *at += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Fill::Starved),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(Fill::Done)
}

fn eof(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, what.to_string())
}

/// Incremental record decoder for a non-blocking socket.
///
/// Keeps whatever part of a frame has arrived between calls.
#[derive(Debug)]
pub struct FrameCodec {
    prefix: [u8; LEN_PREFIX],
    prefix_len: usize,
    /// Body being assembled once the prefix is complete.
    body: Option<(Vec<u8>, usize)>,
    limit: usize,
}

impl FrameCodec {
    /// `limit` bounds the announced record length.
    pub fn new(limit: usize) -> Self {
        Self {
            prefix: [0; LEN_PREFIX],
            prefix_len: 0,
            body: None,
            limit,
        }
    }

    pub fn encode(record: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(LEN_PREFIX + record.len());
        out.extend_from_slice(&(record.len() as u32).to_be_bytes());
        out.extend_from_slice(record);
        out
    }

    /// Pull the next record off `reader`.
    ///
    /// `Ok(None)` means the reader ran dry mid-frame or between frames; call
    /// again on the next readiness event. EOF, I/O failures and records above
    /// the limit are errors.
    pub fn decode<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<Option<Vec<u8>>> {
        if self.body.is_none() {
            match fill(reader, &mut self.prefix, &mut self.prefix_len)? {
                Fill::Starved => return Ok(None),
                Fill::Eof if self.prefix_len == 0 => return Err(eof("connection closed")),
                Fill::Eof => return Err(eof("incomplete frame header")),
                Fill::Done => {}
            }
            self.prefix_len = 0;
            let announced = u32::from_be_bytes(self.prefix) as usize;
            if announced > self.limit {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame too large: {} bytes (max {})", announced, self.limit),
                ));
            }
            self.body = Some((vec![0u8; announced], 0));
        }

        let Some((record, got)) = self.body.as_mut() else {
            return Ok(None);
        };
        match fill(reader, record, got)? {
            Fill::Starved => Ok(None),
            Fill::Eof => Err(eof("incomplete frame body")),
            Fill::Done => Ok(self.body.take().map(|(record, _)| record)),
        }
    }

    /// Whether some bytes of the next frame have already been consumed.
    pub fn is_partial(&self) -> bool {
        self.prefix_len > 0 || self.body.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out its data in fixed-size chunks, then WouldBlock.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos >= self.data.len() {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "drained"));
            }
            let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_decode_across_partial_reads() {
        let mut data = FrameCodec::encode(b"first");
        data.extend(FrameCodec::encode(b""));
        data.extend(FrameCodec::encode(b"second record"));
        let mut reader = Trickle { data, pos: 0, chunk: 3 };

        let mut codec = FrameCodec::new(1024);
        assert_eq!(codec.decode(&mut reader).unwrap(), Some(b"first".to_vec()));
        assert_eq!(codec.decode(&mut reader).unwrap(), Some(Vec::new()));
        assert_eq!(
            codec.decode(&mut reader).unwrap(),
            Some(b"second record".to_vec())
        );
        assert_eq!(codec.decode(&mut reader).unwrap(), None);
        assert!(!codec.is_partial());
    }

    #[test]
    fn test_starved_mid_body_resumes() {
        let frame = FrameCodec::encode(b"abcdef");
        let mut codec = FrameCodec::new(1024);

        let mut head = Trickle { data: frame[..6].to_vec(), pos: 0, chunk: 6 };
        assert_eq!(codec.decode(&mut head).unwrap(), None);
        assert!(codec.is_partial());

        let mut tail = Trickle { data: frame[6..].to_vec(), pos: 0, chunk: 1 };
        assert_eq!(codec.decode(&mut tail).unwrap(), Some(b"abcdef".to_vec()));
        assert!(!codec.is_partial());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut reader = Trickle {
            data: FrameCodec::encode(&[0u8; 64]),
            pos: 0,
            chunk: 64,
        };
        let mut codec = FrameCodec::new(16);
        let err = codec.decode(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_eof_mid_frame() {
        let mut frame = FrameCodec::encode(b"abcdef");
        frame.truncate(6);
        let mut codec = FrameCodec::new(1024);
        let err = codec.decode(&mut frame.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_clean_close_between_frames() {
        let mut codec = FrameCodec::new(1024);
        let err = codec.decode(&mut io::empty()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!codec.is_partial());
    }
}
