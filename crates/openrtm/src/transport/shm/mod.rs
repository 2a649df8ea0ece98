// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `shared_memory` push transport (Linux).
//!
//! The provider owns a POSIX segment holding one record slot:
//!
//! ```text
//! +--------------------------- header (64B) ---------------------------+
//! | magic | capacity | seq | ack | status | len | closed | reserved    |
//! +---------------------------------------------------------------------+
//! | data area (capacity bytes)                                          |
//! +---------------------------------------------------------------------+
//! ```
//!
//! A put is a rendezvous. The consumer copies the record, stores `len` and
//! bumps `seq`. The provider thread delivers the record to its sink, stores
//! the status code and sets `ack = seq`. Both sides sleep on futexes.
//!
//! # Properties
//!
//! | Key                                      | Default       |
//! |------------------------------------------|---------------|
//! | `dataport.shared_memory.buffer_size`     | 65536         |
//! | `dataport.shared_memory.timeout` (sec)   | 1.0           |
//! | `dataport.shared_memory.inport_addr`     | segment name, written by the provider |

pub mod futex;
pub mod segment;

use super::{
    consumer_status, inport_addr_key, required_addr, InPortConsumer, InPortProvider, InPortSink,
    SHARED_MEMORY,
};
use crate::buffer::{Buffer, Record};
use crate::error::{Error, Result};
use crate::listener::ListenerBinding;
use crate::properties::Properties;
use crate::status::DataPortStatus;
use futex::{futex_wait, futex_wake_all};
use parking_lot::Mutex;
use segment::ShmSegment;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const KEY_BUFFER_SIZE: &str = "dataport.shared_memory.buffer_size";
const KEY_TIMEOUT: &str = "dataport.shared_memory.timeout";

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

const MAGIC: u32 = 0x4F52_544D; // "ORTM"
const HEADER_SIZE: usize = 64;
const POLL_SLICE: Duration = Duration::from_millis(100);

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ShmError {
    SegmentCreate(io::Error),
    SegmentOpen(io::Error),
    Mmap(io::Error),
    InvalidName(String),
    NotFound(String),
    /// The mapped header does not carry our magic.
    BadMagic(String),
}

impl fmt::Display for ShmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SegmentCreate(e) => write!(f, "shared memory segment creation failed: {e}"),
            Self::SegmentOpen(e) => write!(f, "shared memory segment open failed: {e}"),
            Self::Mmap(e) => write!(f, "memory mapping failed: {e}"),
            Self::InvalidName(name) => write!(f, "invalid segment name: {name}"),
            Self::NotFound(name) => write!(f, "segment not found: {name}"),
            Self::BadMagic(name) => write!(f, "segment {name} is not an openrtm channel"),
        }
    }
}

impl std::error::Error for ShmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SegmentCreate(e) | Self::SegmentOpen(e) | Self::Mmap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShmError> for Error {
    fn from(e: ShmError) -> Self {
        match e {
            ShmError::NotFound(name) => Error::EndpointNotFound(name),
            other => Error::Transport(other.to_string()),
        }
    }
}

// ============================================================================
// Channel
// ============================================================================

#[repr(C)]
struct Header {
    magic: AtomicU32,
    capacity: AtomicU32,
    seq: AtomicU32,
    ack: AtomicU32,
    status: AtomicU32,
    len: AtomicU32,
    closed: AtomicU32,
}

/// Typed view over a mapped segment.
struct Channel {
    segment: ShmSegment,
}

impl Channel {
    fn create(name: &str, capacity: usize) -> Result<Self> {
        let segment = ShmSegment::create(name, HEADER_SIZE + capacity)?;
        let channel = Self { segment };
        let header = channel.header();
        header.capacity.store(capacity as u32, Ordering::Relaxed);
        header.magic.store(MAGIC, Ordering::Release);
        Ok(channel)
    }

    fn open(name: &str, capacity: usize) -> Result<Self> {
        let segment = ShmSegment::open(name, HEADER_SIZE + capacity)?;
        let channel = Self { segment };
        let header = channel.header();
        if header.magic.load(Ordering::Acquire) != MAGIC
            || header.capacity.load(Ordering::Relaxed) as usize != capacity
        {
            return Err(ShmError::BadMagic(name.to_string()).into());
        }
        Ok(channel)
    }

    fn header(&self) -> &Header {
        // SAFETY: the mapping is page aligned and at least HEADER_SIZE
        // bytes; Header is all atomics so shared access is sound.
        unsafe { &*(self.segment.as_ptr() as *const Header) }
    }

    fn capacity(&self) -> usize {
        self.segment.size() - HEADER_SIZE
    }

    /// Caller must hold the slot (seq == ack on the consumer side).
    fn store_payload(&self, data: &[u8]) {
        // SAFETY: data.len() <= capacity was checked by the caller and the
        // provider does not read the data area until seq moves.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.segment.as_ptr().add(HEADER_SIZE),
                data.len(),
            );
        }
        self.header().len.store(data.len() as u32, Ordering::Relaxed);
    }

    fn load_payload(&self) -> Record {
        let len = (self.header().len.load(Ordering::Relaxed) as usize).min(self.capacity());
        let mut record = vec![0u8; len];
        // SAFETY: len is clamped to the data area and the consumer does not
        // write it again until ack moves.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.segment.as_ptr().add(HEADER_SIZE),
                record.as_mut_ptr(),
                len,
            );
        }
        record
    }

    fn is_closed(&self) -> bool {
        self.header().closed.load(Ordering::Acquire) != 0
    }
}

/// `/openrtm_<pid>_<fnv(connector id)>_<seq>`; the sequence keeps a
/// reconnect under the same id from colliding with a segment being unlinked.
fn segment_name(connector_id: &str) -> String {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    let hash = connector_id
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
            (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
        });
    format!(
        "/openrtm_{:x}_{:016x}_{:x}",
        std::process::id(),
        hash,
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

// ============================================================================
// Provider
// ============================================================================

struct Server {
    channel: Arc<Channel>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Server {
    fn spawn(channel: Arc<Channel>, sink: Arc<InPortSink>) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let ch = Arc::clone(&channel);

        let handle = thread::Builder::new()
            .name("openrtm-shm-rx".to_string())
            .spawn(move || {
                let header = ch.header();
                let mut served = header.ack.load(Ordering::Acquire);
                while flag.load(Ordering::Relaxed) {
                    let seq = header.seq.load(Ordering::Acquire);
                    if seq == served {
                        futex_wait(&header.seq, seq, Some(POLL_SLICE));
                        continue;
                    }
                    let status = sink.put(ch.load_payload());
                    header.status.store(status.code() as u32, Ordering::Relaxed);
                    header.ack.store(seq, Ordering::Release);
                    futex_wake_all(&header.ack);
                    served = seq;
                }
            })?;

        Ok(Self {
            channel,
            running,
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        let header = self.channel.header();
        header.closed.store(1, Ordering::Release);
        futex_wake_all(&header.seq);
        futex_wake_all(&header.ack);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("[SHM] receive thread panicked");
            }
        }
        if let Err(e) = ShmSegment::unlink(self.channel.segment.name()) {
            log::warn!("[SHM] unlink {}: {}", self.channel.segment.name(), e);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct ShmInPortProvider {
    buffer_size: usize,
    buffer: Option<Arc<dyn Buffer>>,
    listener: Option<Arc<ListenerBinding>>,
    sink: Option<Arc<InPortSink>>,
    server: Option<Server>,
}

impl ShmInPortProvider {
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer: None,
            listener: None,
            sink: None,
            server: None,
        }
    }
}

impl Default for ShmInPortProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InPortProvider for ShmInPortProvider {
    fn init(&mut self, props: &Properties) -> Result<()> {
        if let Some(size) = props.get_usize(KEY_BUFFER_SIZE)? {
            if size == 0 || size > u32::MAX as usize {
                return Err(Error::InvalidProperty {
                    key: KEY_BUFFER_SIZE.to_string(),
                    value: size.to_string(),
                });
            }
            self.buffer_size = size;
        }
        Ok(())
    }

    fn set_buffer(&mut self, buffer: Arc<dyn Buffer>) {
        self.buffer = Some(buffer);
    }

    fn set_listener(&mut self, listener: Arc<ListenerBinding>) {
        self.listener = Some(listener);
    }

    fn publish_interface(&mut self, props: &mut Properties) -> Result<()> {
        if self.server.is_some() {
            return Err(Error::InvalidState("shm provider already published".into()));
        }
        let sink = InPortSink::from_parts(&self.buffer, &self.listener)?;
        let connector_id = self
            .listener
            .as_ref()
            .map(|l| l.profile().connector_id)
            .unwrap_or_default();
        let name = segment_name(&connector_id);
        let channel = Arc::new(Channel::create(&name, self.buffer_size)?);
        let server = Server::spawn(channel, Arc::clone(&sink))?;
        props.set(inport_addr_key(SHARED_MEMORY), name.clone());
        props.set(KEY_BUFFER_SIZE, self.buffer_size.to_string());
        log::debug!("[SHM] provider serving {} ({} bytes)", name, self.buffer_size);
        self.sink = Some(sink);
        self.server = Some(server);
        Ok(())
    }

    fn put(&self, data: Record) -> DataPortStatus {
        match &self.sink {
            Some(sink) => sink.put(data),
            None => DataPortStatus::PreconditionNotMet,
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.stop();
        }
        self.sink = None;
    }
}

impl Drop for ShmInPortProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Consumer
// ============================================================================

pub struct ShmInPortConsumer {
    timeout: Duration,
    channel: Mutex<Option<Channel>>,
}

impl ShmInPortConsumer {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            channel: Mutex::new(None),
        }
    }

    /// Wait until the provider has answered `seq`. `None` waits without a
    /// deadline.
    fn wait_ack(
        channel: &Channel,
        seq: u32,
        deadline: Option<Instant>,
    ) -> std::result::Result<(), DataPortStatus> {
        let header = channel.header();
        loop {
            let ack = header.ack.load(Ordering::Acquire);
            if ack == seq {
                return Ok(());
            }
            if channel.is_closed() {
                return Err(DataPortStatus::ConnectionLost);
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DataPortStatus::SendTimeout);
                    }
                    (deadline - now).min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };
            futex_wait(&header.ack, ack, Some(slice));
        }
    }
}

impl Default for ShmInPortConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl InPortConsumer for ShmInPortConsumer {
    fn init(&mut self, props: &Properties) -> Result<()> {
        if let Some(timeout) = props.get_duration_secs(KEY_TIMEOUT)? {
            if !timeout.is_zero() {
                self.timeout = timeout;
            }
        }
        Ok(())
    }

    fn subscribe_interface(&mut self, props: &Properties) -> Result<()> {
        let name = required_addr(props, &inport_addr_key(SHARED_MEMORY))?;
        let size = props.get_usize(KEY_BUFFER_SIZE)?.unwrap_or(DEFAULT_BUFFER_SIZE);
        let channel = Channel::open(&name, size)?;
        log::debug!("[SHM] consumer attached to {}", name);
        *self.channel.lock() = Some(channel);
        Ok(())
    }

    fn unsubscribe_interface(&self) {
        *self.channel.lock() = None;
    }

    fn put(&self, data: &[u8]) -> DataPortStatus {
        let guard = self.channel.lock();
        let Some(channel) = guard.as_ref() else {
            return DataPortStatus::ConnectionLost;
        };
        if channel.is_closed() {
            return DataPortStatus::ConnectionLost;
        }
        if data.len() > channel.capacity() {
            log::warn!(
                "[SHM] record of {} bytes exceeds segment capacity {}",
                data.len(),
                channel.capacity()
            );
            return DataPortStatus::PortError;
        }

        let header = channel.header();
        let deadline = Instant::now().checked_add(self.timeout);

        // A previous put that timed out may still be in flight.
        let pending = header.seq.load(Ordering::Acquire);
        if let Err(status) = Self::wait_ack(channel, pending, deadline) {
            return status;
        }

        channel.store_payload(data);
        let seq = pending.wrapping_add(1);
        header.seq.store(seq, Ordering::Release);
        futex_wake_all(&header.seq);

        match Self::wait_ack(channel, seq, deadline) {
            Ok(()) => {
                let code = header.status.load(Ordering::Relaxed) as u8;
                consumer_status(DataPortStatus::from_code(code))
            }
            Err(status) => status,
        }
    }
}
