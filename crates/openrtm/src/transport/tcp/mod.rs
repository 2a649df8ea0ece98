// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `tcp_stream` push transport.
//!
//! The InPort side runs a mio [`IoThread`](io_thread::IoThread) that accepts
//! OutPort consumers and feeds every decoded frame into its
//! [`InPortSink`]. The OutPort side is a plain blocking [`std::net::TcpStream`]:
//! one frame out, one status byte back.
//!
//! # Properties
//!
//! | Key                                      | Default          |
//! |------------------------------------------|------------------|
//! | `dataport.tcp_stream.bind_addr`          | `127.0.0.1:0`    |
//! | `dataport.tcp_stream.max_message_size`   | 16 MiB           |
//! | `dataport.tcp_stream.timeout` (seconds)  | 1.0              |
//! | `dataport.tcp_stream.inport_addr`        | written by the provider |

pub mod frame_codec;
pub mod io_thread;

pub use frame_codec::{FrameCodec, DEFAULT_MAX_MESSAGE_SIZE};

use super::{
    consumer_status, inport_addr_key, required_addr, InPortConsumer, InPortProvider, InPortSink,
    TCP_STREAM,
};
use crate::buffer::{Buffer, Record};
use crate::error::{Error, Result};
use crate::listener::ListenerBinding;
use crate::properties::Properties;
use crate::status::DataPortStatus;
use io_thread::{IoThread, IoThreadHandle};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

const KEY_BIND_ADDR: &str = "dataport.tcp_stream.bind_addr";
const KEY_MAX_MESSAGE_SIZE: &str = "dataport.tcp_stream.max_message_size";
const KEY_TIMEOUT: &str = "dataport.tcp_stream.timeout";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:0";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::Transport(format!("cannot resolve {}", addr)))
}

// ============================================================================
// Provider
// ============================================================================

pub struct TcpInPortProvider {
    bind_addr: String,
    max_message_size: usize,
    buffer: Option<Arc<dyn Buffer>>,
    listener: Option<Arc<ListenerBinding>>,
    sink: Option<Arc<InPortSink>>,
    io: Option<IoThreadHandle>,
}

impl TcpInPortProvider {
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            buffer: None,
            listener: None,
            sink: None,
            io: None,
        }
    }

    /// Bound address once published.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.io.as_ref().map(IoThreadHandle::local_addr)
    }
}

impl Default for TcpInPortProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InPortProvider for TcpInPortProvider {
    fn init(&mut self, props: &Properties) -> Result<()> {
        self.bind_addr = props.get_or(KEY_BIND_ADDR, DEFAULT_BIND_ADDR).trim().to_string();
        if let Some(max) = props.get_usize(KEY_MAX_MESSAGE_SIZE)? {
            self.max_message_size = max;
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
        if self.io.is_some() {
            return Err(Error::InvalidState("tcp provider already published".into()));
        }
        let sink = InPortSink::from_parts(&self.buffer, &self.listener)?;
        let addr = resolve(&self.bind_addr)?;
        let io = IoThread::spawn(addr, Arc::clone(&sink), self.max_message_size)?;
        props.set(inport_addr_key(TCP_STREAM), io.local_addr().to_string());
        self.sink = Some(sink);
        self.io = Some(io);
        Ok(())
    }

    fn put(&self, data: Record) -> DataPortStatus {
        match &self.sink {
            Some(sink) => sink.put(data),
            None => DataPortStatus::PreconditionNotMet,
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut io) = self.io.take() {
            if let Err(e) = io.shutdown() {
                log::warn!("[TCP] provider shutdown: {}", e);
            }
        }
        self.sink = None;
    }
}

impl Drop for TcpInPortProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Consumer
// ============================================================================

#[derive(Default)]
struct Link {
    addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
}

pub struct TcpInPortConsumer {
    timeout: Duration,
    link: Mutex<Link>,
}

impl TcpInPortConsumer {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            link: Mutex::new(Link::default()),
        }
    }

    fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }

    fn exchange(stream: &mut TcpStream, frame: &[u8]) -> io::Result<u8> {
        stream.write_all(frame)?;
        let mut reply = [0u8; 1];
        stream.read_exact(&mut reply)?;
        Ok(reply[0])
    }
}

impl Default for TcpInPortConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl InPortConsumer for TcpInPortConsumer {
    fn init(&mut self, props: &Properties) -> Result<()> {
        if let Some(timeout) = props.get_duration_secs(KEY_TIMEOUT)? {
            if !timeout.is_zero() {
                self.timeout = timeout;
            }
        }
        Ok(())
    }

    fn subscribe_interface(&mut self, props: &Properties) -> Result<()> {
        let raw = required_addr(props, &inport_addr_key(TCP_STREAM))?;
        let addr = resolve(&raw)?;
        let stream = self
            .connect(addr)
            .map_err(|e| Error::Transport(format!("connect {}: {}", addr, e)))?;
        let mut link = self.link.lock();
        link.addr = Some(addr);
        link.stream = Some(stream);
        log::debug!("[TCP] consumer connected to {}", addr);
        Ok(())
    }

    fn unsubscribe_interface(&self) {
        let mut link = self.link.lock();
        if let Some(stream) = link.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        link.addr = None;
    }

    fn put(&self, data: &[u8]) -> DataPortStatus {
        let mut link = self.link.lock();
        let Some(addr) = link.addr else {
            return DataPortStatus::ConnectionLost;
        };

        if link.stream.is_none() {
            match self.connect(addr) {
                Ok(stream) => link.stream = Some(stream),
                Err(e) => {
                    log::debug!("[TCP] reconnect to {} failed: {}", addr, e);
                    return DataPortStatus::ConnectionLost;
                }
            }
        }
        let Some(stream) = link.stream.as_mut() else {
            return DataPortStatus::ConnectionLost;
        };

        let frame = FrameCodec::encode(data);
        match Self::exchange(stream, &frame) {
            Ok(code) => consumer_status(DataPortStatus::from_code(code)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                // The reply byte may still arrive; the stream is out of step.
                link.stream = None;
                DataPortStatus::SendTimeout
            }
            Err(e) => {
                log::debug!("[TCP] send to {} failed: {}", addr, e);
                link.stream = None;
                DataPortStatus::ConnectionLost
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RingBuffer;
    use crate::connector::ConnectorProfile;

    fn provider(buf: &Arc<dyn Buffer>) -> (TcpInPortProvider, Properties) {
        let mut provider = TcpInPortProvider::new();
        provider.init(&Properties::new()).unwrap();
        provider.set_buffer(Arc::clone(buf));
        provider.set_listener(Arc::new(ListenerBinding::detached(ConnectorProfile::new("tcp"))));
        let mut props = Properties::new();
        provider.publish_interface(&mut props).unwrap();
        (provider, props)
    }

    #[test]
    fn test_push_round_trip() {
        let buf: Arc<dyn Buffer> = Arc::new(RingBuffer::<Record>::with_capacity(4));
        let (mut provider, props) = provider(&buf);
        assert!(props.get("dataport.tcp_stream.inport_addr").is_some());

        let mut consumer = TcpInPortConsumer::new();
        consumer.init(&props).unwrap();
        consumer.subscribe_interface(&props).unwrap();
        assert_eq!(consumer.put(b"one"), DataPortStatus::PortOk);
        assert_eq!(consumer.put(b""), DataPortStatus::PortOk);
        assert_eq!(buf.readable(), 2);
        assert_eq!(buf.read(crate::buffer::Timeout::Default), Ok(b"one".to_vec()));

        provider.shutdown();
        consumer.unsubscribe_interface();
        assert_eq!(consumer.put(b"late"), DataPortStatus::ConnectionLost);
    }

    #[test]
    fn test_full_buffer_reported_as_send_full() {
        let buf: Arc<dyn Buffer> = Arc::new(RingBuffer::<Record>::new(crate::config::BufferConfig {
            length: 1,
            full_policy: crate::config::FullPolicy::DoNothing,
            ..Default::default()
        }));
        let (_provider, props) = provider(&buf);
        let mut consumer = TcpInPortConsumer::new();
        consumer.subscribe_interface(&props).unwrap();
        assert_eq!(consumer.put(b"a"), DataPortStatus::PortOk);
        assert_eq!(consumer.put(b"b"), DataPortStatus::SendFull);
    }

    #[test]
    fn test_provider_gone_is_connection_lost() {
        let buf: Arc<dyn Buffer> = Arc::new(RingBuffer::<Record>::with_capacity(4));
        let (mut provider, props) = provider(&buf);
        let mut consumer = TcpInPortConsumer::new();
        consumer.subscribe_interface(&props).unwrap();
        provider.shutdown();
        drop(provider);

        // First send may still be written into the kernel buffer; the reply
        // read fails either way.
        let status = consumer.put(b"x");
        assert!(matches!(
            status,
            DataPortStatus::ConnectionLost | DataPortStatus::SendTimeout
        ));
        assert_eq!(consumer.put(b"y"), DataPortStatus::ConnectionLost);
    }
}
