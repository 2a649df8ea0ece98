// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive loop for the `tcp_stream` provider.
//!
//! ```text
//! +---------------------------------------------------+
//! |                    IoThread                       |
//! |  mio::Poll                                        |
//! |   - listener   accept OutPort consumers           |
//! |   - streams    decode frames -> InPortSink::put   |
//! |                queue one status byte per frame    |
//! |   - waker      shutdown                           |
//! +---------------------------------------------------+
//! ```

use std::collections::HashMap;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};

use super::frame_codec::FrameCodec;
use crate::transport::InPortSink;

// ============================================================================
// Constants
// ============================================================================

const LISTENER_TOKEN: Token = Token(0);

const WAKER_TOKEN: Token = Token(1);

const CONNECTION_TOKEN_START: usize = 2;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

const MAX_EVENTS: usize = 64;

// ============================================================================
// Handle
// ============================================================================

/// Owner-side handle; dropping it stops and joins the thread.
pub struct IoThreadHandle {
    local_addr: SocketAddr,
    waker: Arc<Waker>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl IoThreadHandle {
    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the loop and wait for it. Idempotent.
    pub fn shutdown(&mut self) -> io::Result<()> {
        self.running.store(false, Ordering::Relaxed);
        let _ = self.waker.wake();
        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| io::Error::other("tcp I/O thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for IoThreadHandle {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

// ============================================================================
// I/O thread
// ============================================================================

struct IoConnection {
    stream: TcpStream,
    remote_addr: SocketAddr,
    codec: FrameCodec,
    /// Status bytes not yet written back.
    outbox: Vec<u8>,
}

pub struct IoThread {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, IoConnection>,
    next_token: usize,
    sink: Arc<InPortSink>,
    max_message_size: usize,
    running: Arc<AtomicBool>,
}

impl IoThread {
    /// Bind `addr` and start serving frames into `sink`.
    pub fn spawn(
        addr: SocketAddr,
        sink: Arc<InPortSink>,
        max_message_size: usize,
    ) -> io::Result<IoThreadHandle> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let local_addr = listener.local_addr()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        let running = Arc::new(AtomicBool::new(true));

        let io_thread = IoThread {
            poll,
            listener,
            connections: HashMap::new(),
            next_token: CONNECTION_TOKEN_START,
            sink,
            max_message_size,
            running: Arc::clone(&running),
        };

        let thread_handle = thread::Builder::new()
            .name("openrtm-tcp-io".to_string())
            .spawn(move || io_thread.run())?;

        log::debug!("[TCP] provider listening on {}", local_addr);
        Ok(IoThreadHandle {
            local_addr,
            waker,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    fn run(mut self) {
        let mut events = Events::with_capacity(MAX_EVENTS);

        while self.running.load(Ordering::Relaxed) {
            if let Err(e) = self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                if e.kind() != io::ErrorKind::Interrupted {
                    log::warn!("[TCP] poll error: {}", e);
                }
                continue;
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => self.handle_accept(),
                    WAKER_TOKEN => {}
                    token => {
                        if event.is_readable() {
                            self.handle_readable(token);
                        }
                        if event.is_writable() {
                            self.try_flush(token);
                        }
                    }
                }
            }
        }

        for (_, mut conn) in self.connections.drain() {
            let _ = self.poll.registry().deregister(&mut conn.stream);
        }
        log::debug!("[TCP] provider I/O thread stopped");
    }

    fn handle_accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, remote_addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if let Err(e) = self.poll.registry().register(
                        &mut stream,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        log::warn!("[TCP] failed to register {}: {}", remote_addr, e);
                        continue;
                    }
                    let _ = stream.set_nodelay(true);

                    log::debug!("[TCP] accepted {}", remote_addr);
                    self.connections.insert(
                        token,
                        IoConnection {
                            stream,
                            remote_addr,
                            codec: FrameCodec::new(self.max_message_size),
                            outbox: Vec::new(),
                        },
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("[TCP] accept error: {}", e);
                    break;
                }
            }
        }
    }

    fn handle_readable(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        loop {
            match conn.codec.decode(&mut conn.stream) {
                Ok(Some(record)) => {
                    let status = self.sink.put(record);
                    conn.outbox.push(status.code());
                }
                Ok(None) => break,
                Err(e) => {
                    if e.kind() != io::ErrorKind::UnexpectedEof || conn.codec.is_partial() {
                        log::debug!("[TCP] {} read error: {}", conn.remote_addr, e);
                    }
                    self.close_connection(token);
                    return;
                }
            }
        }

        self.try_flush(token);
    }

    fn try_flush(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        while !conn.outbox.is_empty() {
            match conn.stream.write(&conn.outbox) {
                Ok(0) => {
                    self.close_connection(token);
                    return;
                }
                Ok(n) => {
                    conn.outbox.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("[TCP] {} write error: {}", conn.remote_addr, e);
                    self.close_connection(token);
                    return;
                }
            }
        }
    }

    fn close_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            log::debug!("[TCP] closed {}", conn.remote_addr);
        }
    }
}
