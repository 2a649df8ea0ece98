// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connector event listeners.
//!
//! A port owns one [`ConnectorListeners`] registry shared by all of its
//! connectors. Buffers, publishers and transports report events through a
//! [`ListenerBinding`], which pairs the registry with the profile of the
//! connector raising the event.
//!
//! # Thread Safety
//!
//! Callbacks run on whichever thread raised the event (caller thread for
//! flush publishers, publisher thread for new/periodic, transport thread for
//! providers). They must be `Send + Sync` and should not block.
//!
//! Callbacks of one event kind run in registration order. The registry
//! snapshot is taken under the lock and released before invoking, so a
//! callback may add or remove listeners without deadlocking.

use crate::buffer::{Buffer, Record, Timeout};
use crate::connector::ConnectorProfile;
use crate::properties::Properties;
use crate::status::BufferStatus;
use parking_lot::Mutex;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What a listener changed. Results of several listeners are OR-folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ListenerStatus(u8);

impl ListenerStatus {
    pub const NO_CHANGE: Self = Self(0b00);
    pub const INFO_CHANGED: Self = Self(0b01);
    pub const DATA_CHANGED: Self = Self(0b10);
    pub const BOTH_CHANGED: Self = Self(0b11);

    #[inline]
    pub fn info_changed(self) -> bool {
        self.0 & Self::INFO_CHANGED.0 != 0
    }

    #[inline]
    pub fn data_changed(self) -> bool {
        self.0 & Self::DATA_CHANGED.0 != 0
    }
}

impl BitOr for ListenerStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ListenerStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ListenerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self.0 {
            0 => "NO_CHANGE",
            1 => "INFO_CHANGED",
            2 => "DATA_CHANGED",
            _ => "BOTH_CHANGED",
        };
        f.write_str(s)
    }
}

/// Events that carry the data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorDataListenerType {
    OnBufferWrite,
    OnBufferFull,
    OnBufferWriteTimeout,
    OnBufferOverwrite,
    OnBufferRead,
    OnSend,
    OnReceived,
    OnReceiverFull,
    OnReceiverTimeout,
    OnReceiverError,
}

impl ConnectorDataListenerType {
    pub const ALL: [Self; 10] = [
        Self::OnBufferWrite,
        Self::OnBufferFull,
        Self::OnBufferWriteTimeout,
        Self::OnBufferOverwrite,
        Self::OnBufferRead,
        Self::OnSend,
        Self::OnReceived,
        Self::OnReceiverFull,
        Self::OnReceiverTimeout,
        Self::OnReceiverError,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnBufferWrite => "ON_BUFFER_WRITE",
            Self::OnBufferFull => "ON_BUFFER_FULL",
            Self::OnBufferWriteTimeout => "ON_BUFFER_WRITE_TIMEOUT",
            Self::OnBufferOverwrite => "ON_BUFFER_OVERWRITE",
            Self::OnBufferRead => "ON_BUFFER_READ",
            Self::OnSend => "ON_SEND",
            Self::OnReceived => "ON_RECEIVED",
            Self::OnReceiverFull => "ON_RECEIVER_FULL",
            Self::OnReceiverTimeout => "ON_RECEIVER_TIMEOUT",
            Self::OnReceiverError => "ON_RECEIVER_ERROR",
        }
    }
}

/// Events without a data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorListenerType {
    OnBufferEmpty,
    OnBufferReadTimeout,
    OnSenderEmpty,
    OnSenderTimeout,
    OnSenderError,
    OnConnect,
    OnDisconnect,
}

impl ConnectorListenerType {
    pub const ALL: [Self; 7] = [
        Self::OnBufferEmpty,
        Self::OnBufferReadTimeout,
        Self::OnSenderEmpty,
        Self::OnSenderTimeout,
        Self::OnSenderError,
        Self::OnConnect,
        Self::OnDisconnect,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnBufferEmpty => "ON_BUFFER_EMPTY",
            Self::OnBufferReadTimeout => "ON_BUFFER_READ_TIMEOUT",
            Self::OnSenderEmpty => "ON_SENDER_EMPTY",
            Self::OnSenderTimeout => "ON_SENDER_TIMEOUT",
            Self::OnSenderError => "ON_SENDER_ERROR",
            Self::OnConnect => "ON_CONNECT",
            Self::OnDisconnect => "ON_DISCONNECT",
        }
    }
}

/// Listener for data-bearing events. May replace the record in place and
/// report `DATA_CHANGED`, or edit the profile and report `INFO_CHANGED`.
pub trait ConnectorDataListener: Send + Sync {
    fn on_data(&self, info: &mut ConnectorProfile, data: &mut Record) -> ListenerStatus;
}

impl<F> ConnectorDataListener for F
where
    F: Fn(&mut ConnectorProfile, &mut Record) -> ListenerStatus + Send + Sync,
{
    fn on_data(&self, info: &mut ConnectorProfile, data: &mut Record) -> ListenerStatus {
        self(info, data)
    }
}

/// Listener for events without data.
pub trait ConnectorListener: Send + Sync {
    fn on_event(&self, info: &mut ConnectorProfile) -> ListenerStatus;
}

impl<F> ConnectorListener for F
where
    F: Fn(&mut ConnectorProfile) -> ListenerStatus + Send + Sync,
{
    fn on_event(&self, info: &mut ConnectorProfile) -> ListenerStatus {
        self(info)
    }
}

/// Handle returned by `add_*_listener`, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Entry<L: ?Sized> {
    id: ListenerId,
    listener: Arc<L>,
    autoclean: bool,
}

impl<L: ?Sized> Clone for Entry<L> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            listener: Arc::clone(&self.listener),
            autoclean: self.autoclean,
        }
    }
}

struct Holders {
    data: [Vec<Entry<dyn ConnectorDataListener>>; 10],
    plain: [Vec<Entry<dyn ConnectorListener>>; 7],
}

/// Per-port listener registry.
pub struct ConnectorListeners {
    holders: Mutex<Holders>,
    next_id: AtomicU64,
}

impl ConnectorListeners {
    pub fn new() -> Self {
        Self {
            holders: Mutex::new(Holders {
                data: Default::default(),
                plain: Default::default(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a data listener. `autoclean` listeners are dropped by
    /// [`Self::clear_autoclean`] when the owning port is finalized.
    pub fn add_data_listener(
        &self,
        kind: ConnectorDataListenerType,
        listener: Arc<dyn ConnectorDataListener>,
        autoclean: bool,
    ) -> ListenerId {
        let id = self.next_id();
        self.holders.lock().data[kind.index()].push(Entry {
            id,
            listener,
            autoclean,
        });
        id
    }

    pub fn add_listener(
        &self,
        kind: ConnectorListenerType,
        listener: Arc<dyn ConnectorListener>,
        autoclean: bool,
    ) -> ListenerId {
        let id = self.next_id();
        self.holders.lock().plain[kind.index()].push(Entry {
            id,
            listener,
            autoclean,
        });
        id
    }

    pub fn remove_data_listener(&self, kind: ConnectorDataListenerType, id: ListenerId) -> bool {
        let mut holders = self.holders.lock();
        let list = &mut holders.data[kind.index()];
        let before = list.len();
        list.retain(|e| e.id != id);
        list.len() != before
    }

    pub fn remove_listener(&self, kind: ConnectorListenerType, id: ListenerId) -> bool {
        let mut holders = self.holders.lock();
        let list = &mut holders.plain[kind.index()];
        let before = list.len();
        list.retain(|e| e.id != id);
        list.len() != before
    }

    pub fn has_data_listeners(&self, kind: ConnectorDataListenerType) -> bool {
        !self.holders.lock().data[kind.index()].is_empty()
    }

    pub fn has_listeners(&self, kind: ConnectorListenerType) -> bool {
        !self.holders.lock().plain[kind.index()].is_empty()
    }

    /// Invoke every listener of `kind` in registration order.
    pub fn notify_data(
        &self,
        kind: ConnectorDataListenerType,
        info: &mut ConnectorProfile,
        data: &mut Record,
    ) -> ListenerStatus {
        let snapshot = self.holders.lock().data[kind.index()].clone();
        let mut status = ListenerStatus::NO_CHANGE;
        for entry in &snapshot {
            status |= entry.listener.on_data(info, data);
        }
        status
    }

    pub fn notify(&self, kind: ConnectorListenerType, info: &mut ConnectorProfile) -> ListenerStatus {
        let snapshot = self.holders.lock().plain[kind.index()].clone();
        let mut status = ListenerStatus::NO_CHANGE;
        for entry in &snapshot {
            status |= entry.listener.on_event(info);
        }
        status
    }

    /// Drop every listener registered with `autoclean = true`.
    pub fn clear_autoclean(&self) {
        let mut holders = self.holders.lock();
        for list in holders.data.iter_mut() {
            list.retain(|e| !e.autoclean);
        }
        for list in holders.plain.iter_mut() {
            list.retain(|e| !e.autoclean);
        }
    }
}

impl Default for ConnectorListeners {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry plus the profile of the connector raising events.
///
/// When a listener reports `INFO_CHANGED` the edited profile replaces the
/// stored one, so later events and [`ListenerBinding::profile`] see it.
pub struct ListenerBinding {
    profile: Mutex<ConnectorProfile>,
    listeners: Arc<ConnectorListeners>,
}

impl ListenerBinding {
    pub fn new(profile: ConnectorProfile, listeners: Arc<ConnectorListeners>) -> Self {
        Self {
            profile: Mutex::new(profile),
            listeners,
        }
    }

    /// Binding with an empty registry (stand-alone transports, tests).
    pub fn detached(profile: ConnectorProfile) -> Self {
        Self::new(profile, Arc::new(ConnectorListeners::new()))
    }

    pub fn profile(&self) -> ConnectorProfile {
        self.profile.lock().clone()
    }

    pub fn listeners(&self) -> &Arc<ConnectorListeners> {
        &self.listeners
    }

    /// Merge `props` into the stored profile's property bag.
    pub fn merge_properties(&self, props: &Properties) {
        self.profile.lock().properties.merge(props);
    }

    pub fn notify_data(&self, kind: ConnectorDataListenerType, data: &mut Record) -> ListenerStatus {
        if !self.listeners.has_data_listeners(kind) {
            return ListenerStatus::NO_CHANGE;
        }
        let mut info = self.profile();
        let status = self.listeners.notify_data(kind, &mut info, data);
        if status.info_changed() {
            *self.profile.lock() = info;
        }
        status
    }

    pub fn notify(&self, kind: ConnectorListenerType) -> ListenerStatus {
        if !self.listeners.has_listeners(kind) {
            return ListenerStatus::NO_CHANGE;
        }
        let mut info = self.profile();
        let status = self.listeners.notify(kind, &mut info);
        if status.info_changed() {
            *self.profile.lock() = info;
        }
        status
    }

    /// Whether any listener of the given kinds is registered.
    pub fn wants_data(&self, kinds: &[ConnectorDataListenerType]) -> bool {
        kinds.iter().any(|k| self.listeners.has_data_listeners(*k))
    }

    /// Write `data` into `buffer`, raising `ON_BUFFER_WRITE` before and
    /// `ON_BUFFER_OVERWRITE`, `ON_BUFFER_FULL` or `ON_BUFFER_WRITE_TIMEOUT`
    /// after.
    ///
    /// On failure the record is handed back when a listener in `extra` may
    /// need it (receiver-side events raised by the caller).
    pub fn write_buffer(
        &self,
        buffer: &dyn Buffer,
        mut data: Record,
        timeout: Timeout,
        extra: &[ConnectorDataListenerType],
    ) -> (BufferStatus, Option<Record>) {
        use ConnectorDataListenerType as D;

        self.notify_data(D::OnBufferWrite, &mut data);
        let keep = self.wants_data(&[D::OnBufferOverwrite, D::OnBufferFull, D::OnBufferWriteTimeout])
            || self.wants_data(extra);
        let mut backup = keep.then(|| data.clone());

        let outcome = buffer.write(data, timeout);
        if let Some(ref mut d) = backup {
            if outcome.overwrote {
                self.notify_data(D::OnBufferOverwrite, d);
            }
            match outcome.status {
                BufferStatus::Full => {
                    self.notify_data(D::OnBufferFull, d);
                }
                BufferStatus::Timeout => {
                    self.notify_data(D::OnBufferWriteTimeout, d);
                }
                _ => {}
            }
        }

        let rejected = if outcome.status == BufferStatus::Ok {
            None
        } else {
            backup
        };
        (outcome.status, rejected)
    }

    /// Read one record from `buffer`, raising `ON_BUFFER_READ` on success,
    /// `ON_BUFFER_EMPTY` or `ON_BUFFER_READ_TIMEOUT` otherwise.
    pub fn read_buffer(
        &self,
        buffer: &dyn Buffer,
        timeout: Timeout,
    ) -> std::result::Result<Record, BufferStatus> {
        match buffer.read(timeout) {
            Ok(mut data) => {
                self.notify_data(ConnectorDataListenerType::OnBufferRead, &mut data);
                Ok(data)
            }
            Err(BufferStatus::Empty) => {
                self.notify(ConnectorListenerType::OnBufferEmpty);
                Err(BufferStatus::Empty)
            }
            Err(BufferStatus::Timeout) => {
                self.notify(ConnectorListenerType::OnBufferReadTimeout);
                Err(BufferStatus::Timeout)
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(
        log: &Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    ) -> Arc<dyn ConnectorDataListener> {
        let log = Arc::clone(log);
        Arc::new(move |_: &mut ConnectorProfile, _: &mut Record| {
            log.lock().push(tag);
            ListenerStatus::NO_CHANGE
        })
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let registry = ConnectorListeners::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let kind = ConnectorDataListenerType::OnBufferWrite;
        registry.add_data_listener(kind, recorder(&log, "a"), true);
        registry.add_data_listener(kind, recorder(&log, "b"), true);
        registry.add_data_listener(kind, recorder(&log, "c"), false);

        let mut info = ConnectorProfile::new("c0");
        let mut data = vec![1, 2, 3];
        registry.notify_data(kind, &mut info, &mut data);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);

        // Other kinds are untouched.
        registry.notify_data(ConnectorDataListenerType::OnSend, &mut info, &mut data);
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn test_remove_and_autoclean() {
        let registry = ConnectorListeners::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let kind = ConnectorDataListenerType::OnReceived;
        let a = registry.add_data_listener(kind, recorder(&log, "a"), true);
        registry.add_data_listener(kind, recorder(&log, "b"), true);
        registry.add_data_listener(kind, recorder(&log, "keep"), false);

        assert!(registry.remove_data_listener(kind, a));
        assert!(!registry.remove_data_listener(kind, a));

        registry.clear_autoclean();
        let mut info = ConnectorProfile::default();
        registry.notify_data(kind, &mut info, &mut Vec::new());
        assert_eq!(*log.lock(), vec!["keep"]);
    }

    #[test]
    fn test_status_is_or_folded() {
        let registry = ConnectorListeners::new();
        let kind = ConnectorDataListenerType::OnBufferWrite;
        registry.add_data_listener(
            kind,
            Arc::new(|_: &mut ConnectorProfile, data: &mut Record| {
                data.push(0xff);
                ListenerStatus::DATA_CHANGED
            }),
            true,
        );
        registry.add_data_listener(
            kind,
            Arc::new(|info: &mut ConnectorProfile, _: &mut Record| {
                info.name = "renamed".into();
                ListenerStatus::INFO_CHANGED
            }),
            true,
        );

        let binding = ListenerBinding::new(ConnectorProfile::new("orig"), Arc::new(registry));
        let mut data = vec![1];
        let status = binding.notify_data(kind, &mut data);
        assert_eq!(status, ListenerStatus::BOTH_CHANGED);
        assert_eq!(data, vec![1, 0xff]);
        assert_eq!(binding.profile().name, "renamed");
    }

    #[test]
    fn test_buffer_events() {
        use crate::buffer::RingBuffer;
        use crate::config::{BufferConfig, FullPolicy};

        let registry = Arc::new(ConnectorListeners::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        for (kind, tag) in [
            (ConnectorDataListenerType::OnBufferWrite, "write"),
            (ConnectorDataListenerType::OnBufferOverwrite, "overwrite"),
            (ConnectorDataListenerType::OnBufferFull, "full"),
            (ConnectorDataListenerType::OnBufferRead, "read"),
        ] {
            registry.add_data_listener(kind, recorder(&log, tag), true);
        }
        let empty_log = Arc::clone(&log);
        registry.add_listener(
            ConnectorListenerType::OnBufferEmpty,
            Arc::new(move |_: &mut ConnectorProfile| {
                empty_log.lock().push("empty");
                ListenerStatus::NO_CHANGE
            }),
            true,
        );
        let binding = ListenerBinding::new(ConnectorProfile::new("c"), registry);

        let overwrite: RingBuffer<Record> = RingBuffer::with_capacity(1);
        binding.write_buffer(&overwrite, vec![1], Timeout::Default, &[]);
        let (status, rejected) = binding.write_buffer(&overwrite, vec![2], Timeout::Default, &[]);
        assert_eq!(status, BufferStatus::Ok);
        assert!(rejected.is_none());
        assert_eq!(binding.read_buffer(&overwrite, Timeout::Default), Ok(vec![2]));
        assert_eq!(
            binding.read_buffer(&overwrite, Timeout::Default),
            Err(BufferStatus::Empty)
        );

        let strict: RingBuffer<Record> = RingBuffer::new(BufferConfig {
            length: 1,
            full_policy: FullPolicy::DoNothing,
            ..BufferConfig::default()
        });
        binding.write_buffer(&strict, vec![1], Timeout::Default, &[]);
        let (status, rejected) = binding.write_buffer(&strict, vec![9], Timeout::Default, &[]);
        assert_eq!(status, BufferStatus::Full);
        assert_eq!(rejected, Some(vec![9]));

        assert_eq!(
            *log.lock(),
            vec!["write", "write", "overwrite", "read", "empty", "write", "write", "full"]
        );
    }

    #[test]
    fn test_plain_listener_may_reenter_registry() {
        let registry = Arc::new(ConnectorListeners::new());
        let inner = Arc::clone(&registry);
        registry.add_listener(
            ConnectorListenerType::OnConnect,
            Arc::new(move |_: &mut ConnectorProfile| {
                inner.add_listener(
                    ConnectorListenerType::OnDisconnect,
                    Arc::new(|_: &mut ConnectorProfile| ListenerStatus::NO_CHANGE),
                    true,
                );
                ListenerStatus::NO_CHANGE
            }),
            true,
        );
        let mut info = ConnectorProfile::default();
        registry.notify(ConnectorListenerType::OnConnect, &mut info);
        assert!(registry.has_listeners(ConnectorListenerType::OnDisconnect));
    }
}
