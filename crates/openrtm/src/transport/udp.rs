// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `udp_datagram` push transport: one record per datagram, no reply.
//!
//! The consumer reports `PortOk` as soon as the datagram leaves the socket;
//! loss and full receive buffers are invisible to the sender.

use super::{inport_addr_key, required_addr, InPortConsumer, InPortProvider, InPortSink, UDP_DATAGRAM};
use crate::buffer::{Buffer, Record};
use crate::error::{Error, Result};
use crate::listener::ListenerBinding;
use crate::properties::Properties;
use crate::status::DataPortStatus;
use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const KEY_BIND_ADDR: &str = "dataport.udp_datagram.bind_addr";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:0";

/// Largest payload an IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

const RECV_POLL: Duration = Duration::from_millis(100);

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::Transport(format!("cannot resolve {}", addr)))
}

fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

// ============================================================================
// Provider
// ============================================================================

struct Receiver {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Receiver {
    fn spawn(addr: SocketAddr, sink: Arc<InPortSink>) -> io::Result<Self> {
        let socket = bind_socket(addr)?;
        socket.set_read_timeout(Some(RECV_POLL))?;
        let local_addr = socket.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("openrtm-udp-rx".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
                while flag.load(Ordering::Relaxed) {
                    match socket.recv_from(&mut buf) {
                        Ok((n, from)) => {
                            let status = sink.put(buf[..n].to_vec());
                            if !status.is_ok() {
                                log::trace!("[UDP] record from {} dropped: {}", from, status);
                            }
                        }
                        Err(e)
                            if matches!(
                                e.kind(),
                                io::ErrorKind::WouldBlock
                                    | io::ErrorKind::TimedOut
                                    | io::ErrorKind::Interrupted
                            ) => {}
                        Err(e) => {
                            log::warn!("[UDP] receive error: {}", e);
                            thread::sleep(RECV_POLL);
                        }
                    }
                }
            })?;

        log::debug!("[UDP] provider listening on {}", local_addr);
        Ok(Self {
            local_addr,
            running,
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("[UDP] receive thread panicked");
            }
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct UdpInPortProvider {
    bind_addr: String,
    buffer: Option<Arc<dyn Buffer>>,
    listener: Option<Arc<ListenerBinding>>,
    sink: Option<Arc<InPortSink>>,
    receiver: Option<Receiver>,
}

impl UdpInPortProvider {
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            buffer: None,
            listener: None,
            sink: None,
            receiver: None,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.receiver.as_ref().map(|r| r.local_addr)
    }
}

impl Default for UdpInPortProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InPortProvider for UdpInPortProvider {
    fn init(&mut self, props: &Properties) -> Result<()> {
        self.bind_addr = props.get_or(KEY_BIND_ADDR, DEFAULT_BIND_ADDR).trim().to_string();
        Ok(())
    }

    fn set_buffer(&mut self, buffer: Arc<dyn Buffer>) {
        self.buffer = Some(buffer);
    }

    fn set_listener(&mut self, listener: Arc<ListenerBinding>) {
        self.listener = Some(listener);
    }

    fn publish_interface(&mut self, props: &mut Properties) -> Result<()> {
        if self.receiver.is_some() {
            return Err(Error::InvalidState("udp provider already published".into()));
        }
        let sink = InPortSink::from_parts(&self.buffer, &self.listener)?;
        let receiver = Receiver::spawn(resolve(&self.bind_addr)?, Arc::clone(&sink))?;
        props.set(inport_addr_key(UDP_DATAGRAM), receiver.local_addr.to_string());
        self.sink = Some(sink);
        self.receiver = Some(receiver);
        Ok(())
    }

    fn put(&self, data: Record) -> DataPortStatus {
        match &self.sink {
            Some(sink) => sink.put(data),
            None => DataPortStatus::PreconditionNotMet,
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.stop();
        }
        self.sink = None;
    }
}

impl Drop for UdpInPortProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Consumer
// ============================================================================

pub struct UdpInPortConsumer {
    socket: RwLock<Option<UdpSocket>>,
}

impl UdpInPortConsumer {
    pub fn new() -> Self {
        Self {
            socket: RwLock::new(None),
        }
    }
}

impl Default for UdpInPortConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl InPortConsumer for UdpInPortConsumer {
    fn init(&mut self, _props: &Properties) -> Result<()> {
        Ok(())
    }

    fn subscribe_interface(&mut self, props: &Properties) -> Result<()> {
        let target = resolve(&required_addr(props, &inport_addr_key(UDP_DATAGRAM))?)?;
        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = bind_socket(local)?;
        socket.connect(target)?;
        log::debug!("[UDP] consumer sending to {}", target);
        *self.socket.write() = Some(socket);
        Ok(())
    }

    fn unsubscribe_interface(&self) {
        *self.socket.write() = None;
    }

    fn put(&self, data: &[u8]) -> DataPortStatus {
        let socket = self.socket.read();
        let Some(socket) = socket.as_ref() else {
            return DataPortStatus::ConnectionLost;
        };
        if data.len() > MAX_DATAGRAM_SIZE {
            log::warn!(
                "[UDP] record of {} bytes exceeds datagram limit {}",
                data.len(),
                MAX_DATAGRAM_SIZE
            );
            return DataPortStatus::PortError;
        }
        match socket.send(data) {
            Ok(_) => DataPortStatus::PortOk,
            Err(e) => {
                log::debug!("[UDP] send failed: {}", e);
                DataPortStatus::PortError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{RingBuffer, Timeout};
    use crate::connector::ConnectorProfile;
    use std::time::Instant;

    #[test]
    fn test_datagram_reaches_buffer() {
        let buf: Arc<dyn Buffer> = Arc::new(RingBuffer::<Record>::with_capacity(8));
        let mut provider = UdpInPortProvider::new();
        provider.init(&Properties::new()).unwrap();
        provider.set_buffer(Arc::clone(&buf));
        provider.set_listener(Arc::new(ListenerBinding::detached(ConnectorProfile::new("udp"))));
        let mut props = Properties::new();
        provider.publish_interface(&mut props).unwrap();

        let mut consumer = UdpInPortConsumer::new();
        consumer.subscribe_interface(&props).unwrap();
        assert_eq!(consumer.put(b"datagram"), DataPortStatus::PortOk);

        let deadline = Instant::now() + Duration::from_secs(2);
        while buf.readable() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(buf.read(Timeout::Default), Ok(b"datagram".to_vec()));
        provider.shutdown();
    }

    #[test]
    fn test_oversized_record_is_port_error() {
        let mut consumer = UdpInPortConsumer::new();
        let props = Properties::new().with("dataport.udp_datagram.inport_addr", "127.0.0.1:9");
        consumer.subscribe_interface(&props).unwrap();
        let big = vec![0u8; MAX_DATAGRAM_SIZE + 1];
        assert_eq!(consumer.put(&big), DataPortStatus::PortError);
    }

    #[test]
    fn test_unsubscribed_is_connection_lost() {
        let consumer = UdpInPortConsumer::new();
        assert_eq!(consumer.put(b"x"), DataPortStatus::ConnectionLost);
    }
}
