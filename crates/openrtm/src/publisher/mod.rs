// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OutPort-side publishers.
//!
//! A publisher decides *when* a record written to an OutPort reaches the
//! push consumer:
//!
//! | Key          | Type                 | Send path                                |
//! |--------------|----------------------|------------------------------------------|
//! | [`FLUSH`]    | [`FlushPublisher`]   | caller thread, synchronous               |
//! | [`NEW`]      | [`NewPublisher`]     | buffer, then a thread woken per write    |
//! | [`PERIODIC`] | [`PeriodicPublisher`]| buffer, then a thread ticking at `push_rate` |
//!
//! Delivery is at-most-once: a record leaves the buffer before it is sent,
//! and a failed send is reported through status and listeners, never
//! retried.

mod flush;
mod new;
mod periodic;

pub use flush::FlushPublisher;
pub use new::NewPublisher;
pub use periodic::PeriodicPublisher;

use crate::buffer::{Buffer, Record, Timeout};
use crate::config::{PublisherConfig, PushPolicy};
use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::listener::{ConnectorDataListenerType, ConnectorListenerType, ListenerBinding};
use crate::properties::Properties;
use crate::status::{BufferStatus, DataPortStatus};
use crate::sync::Signal;
use crate::transport::InPortConsumer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub const FLUSH: &str = "flush";
pub const NEW: &str = "new";
pub const PERIODIC: &str = "periodic";

pub trait Publisher: Send + Sync {
    /// Apply the `dataport.publisher` property node.
    fn init(&mut self, props: &Properties) -> Result<()>;
    fn set_consumer(&mut self, consumer: Arc<dyn InPortConsumer>);
    fn set_buffer(&mut self, buffer: Arc<dyn Buffer>);
    fn set_listener(&mut self, listener: Arc<ListenerBinding>);
    fn write(&self, data: Record, timeout: Timeout) -> DataPortStatus;
    fn activate(&mut self) -> Result<()>;
    /// Stop sending; thread-owning publishers join their thread here.
    fn deactivate(&mut self);
    fn is_active(&self) -> bool;
}

pub type PublisherFactory = Factory<dyn Publisher>;

impl Factory<dyn Publisher> {
    /// Factory with `flush`, `new` and `periodic` registered.
    pub fn with_defaults() -> Self {
        let factory = Self::new();
        factory.register(FLUSH, || Box::new(FlushPublisher::new()));
        factory.register(NEW, || Box::new(NewPublisher::new()));
        factory.register(PERIODIC, || Box::new(PeriodicPublisher::new()));
        factory
    }
}

// ============================================================================
// Send path
// ============================================================================

/// Send one record and raise the receiver-side events for the answer.
///
/// Statuses outside the consumer vocabulary come back as `UnknownError`.
pub(crate) fn send(
    consumer: &dyn InPortConsumer,
    listener: &ListenerBinding,
    mut data: Record,
) -> DataPortStatus {
    use ConnectorDataListenerType as D;

    listener.notify_data(D::OnSend, &mut data);
    let status = consumer.put(&data);
    let (kind, status) = match status {
        DataPortStatus::PortOk => (D::OnReceived, status),
        DataPortStatus::SendFull => (D::OnReceiverFull, status),
        DataPortStatus::SendTimeout => (D::OnReceiverTimeout, status),
        DataPortStatus::PortError | DataPortStatus::ConnectionLost => (D::OnReceiverError, status),
        _ => (D::OnReceiverError, DataPortStatus::UnknownError),
    };
    listener.notify_data(kind, &mut data);
    status
}

/// Map a buffer write result onto the status `write` returns.
pub(crate) fn buffer_write_status(status: BufferStatus) -> DataPortStatus {
    match status {
        BufferStatus::Ok => DataPortStatus::PortOk,
        BufferStatus::Full => DataPortStatus::BufferFull,
        BufferStatus::Timeout => DataPortStatus::BufferTimeout,
        BufferStatus::PreconditionNotMet => DataPortStatus::PreconditionNotMet,
        BufferStatus::Empty | BufferStatus::Error | BufferStatus::NotSupported => {
            DataPortStatus::BufferError
        }
    }
}

/// Buffer + consumer pair emptied by a publisher thread.
pub(crate) struct Drain {
    buffer: Arc<dyn Buffer>,
    consumer: Arc<dyn InPortConsumer>,
    listener: Arc<ListenerBinding>,
    policy: PushPolicy,
    skip_count: usize,
    /// Records seen by the `skip` policy, across wake-ups.
    skipped: Mutex<usize>,
    lost: AtomicBool,
}

impl Drain {
    pub(crate) fn new(
        buffer: Arc<dyn Buffer>,
        consumer: Arc<dyn InPortConsumer>,
        listener: Arc<ListenerBinding>,
        config: &PublisherConfig,
    ) -> Self {
        Self {
            buffer,
            consumer,
            listener,
            policy: config.push_policy,
            skip_count: config.skip_count,
            skipped: Mutex::new(0),
            lost: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Buffer the record for the thread. Does not wake it.
    pub(crate) fn enqueue(&self, data: Record, timeout: Timeout) -> DataPortStatus {
        if self.is_lost() {
            return DataPortStatus::ConnectionLost;
        }
        let (status, _) = self.listener.write_buffer(&*self.buffer, data, timeout, &[]);
        buffer_write_status(status)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buffer.readable() == 0
    }

    pub(crate) fn listener(&self) -> &ListenerBinding {
        &self.listener
    }

    fn take(&self) -> Option<Record> {
        if self.buffer.readable() == 0 {
            return None;
        }
        self.listener.read_buffer(&*self.buffer, Timeout::Default).ok()
    }

    /// Send one record, raising sender-side events on failure.
    fn push(&self, data: Record) -> DataPortStatus {
        let status = send(&*self.consumer, &self.listener, data);
        match status {
            DataPortStatus::PortOk | DataPortStatus::SendFull => {}
            DataPortStatus::SendTimeout => {
                self.listener.notify(ConnectorListenerType::OnSenderTimeout);
            }
            DataPortStatus::ConnectionLost => {
                self.lost.store(true, Ordering::Release);
                log::warn!(
                    "[Publisher] connection lost on {}",
                    self.listener.profile().connector_id
                );
                self.listener.notify(ConnectorListenerType::OnSenderError);
            }
            _ => {
                self.listener.notify(ConnectorListenerType::OnSenderError);
            }
        }
        status
    }

    /// Empty the buffer according to the push policy. Stops at the first
    /// failed send; records already taken are not put back.
    pub(crate) fn pump(&self) -> DataPortStatus {
        if self.is_lost() {
            return DataPortStatus::ConnectionLost;
        }
        match self.policy {
            PushPolicy::All => {
                while let Some(data) = self.take() {
                    let status = self.push(data);
                    if !status.is_ok() {
                        return status;
                    }
                }
                DataPortStatus::PortOk
            }
            PushPolicy::Fifo => match self.take() {
                Some(data) => self.push(data),
                None => DataPortStatus::PortOk,
            },
            PushPolicy::Skip => {
                while let Some(data) = self.take() {
                    let due = {
                        let mut seen = self.skipped.lock();
                        let due = *seen % (self.skip_count + 1) == 0;
                        *seen = seen.wrapping_add(1);
                        due
                    };
                    if due {
                        let status = self.push(data);
                        if !status.is_ok() {
                            return status;
                        }
                    }
                }
                DataPortStatus::PortOk
            }
            PushPolicy::New => {
                let mut newest = None;
                while let Some(data) = self.take() {
                    newest = Some(data);
                }
                match newest {
                    Some(data) => self.push(data),
                    None => DataPortStatus::PortOk,
                }
            }
        }
    }
}

/// Pieces every publisher collects before `activate`.
#[derive(Default)]
pub(crate) struct Parts {
    pub consumer: Option<Arc<dyn InPortConsumer>>,
    pub buffer: Option<Arc<dyn Buffer>>,
    pub listener: Option<Arc<ListenerBinding>>,
}

impl Parts {
    pub(crate) fn drain(&self, config: &PublisherConfig) -> Result<Drain> {
        match (&self.buffer, &self.consumer, &self.listener) {
            (Some(b), Some(c), Some(l)) => Ok(Drain::new(
                Arc::clone(b),
                Arc::clone(c),
                Arc::clone(l),
                config,
            )),
            (None, _, _) => Err(Error::InvalidState("publisher has no buffer".into())),
            (_, None, _) => Err(Error::InvalidState("publisher has no consumer".into())),
            (_, _, None) => Err(Error::InvalidState("publisher has no listener".into())),
        }
    }
}

/// Publisher thread plus its stop flag and wake signal.
pub(crate) struct Worker {
    running: Arc<AtomicBool>,
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce(&AtomicBool, &Signal) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let signal = Arc::new(Signal::new());
        let (r, s) = (Arc::clone(&running), Arc::clone(&signal));
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(&r, &s))?;
        Ok(Self {
            running,
            signal,
            handle: Some(handle),
        })
    }

    #[inline]
    pub(crate) fn wake(&self) {
        self.signal.notify();
    }

    /// Signal stop and join. Idempotent.
    pub(crate) fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.signal.notify();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[Publisher] worker thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted consumer shared by the publisher tests.

    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub struct ScriptedConsumer {
        pub sent: Mutex<Vec<Record>>,
        /// Statuses returned by successive puts; `PortOk` once exhausted.
        pub script: Mutex<VecDeque<DataPortStatus>>,
    }

    impl ScriptedConsumer {
        pub fn with_script(script: &[DataPortStatus]) -> Arc<Self> {
            let c = Self::default();
            c.script.lock().extend(script.iter().copied());
            Arc::new(c)
        }

        pub fn sent(&self) -> Vec<Record> {
            self.sent.lock().clone()
        }
    }

    impl InPortConsumer for ScriptedConsumer {
        fn init(&mut self, _props: &Properties) -> Result<()> {
            Ok(())
        }
        fn subscribe_interface(&mut self, _props: &Properties) -> Result<()> {
            Ok(())
        }
        fn unsubscribe_interface(&self) {}
        fn put(&self, data: &[u8]) -> DataPortStatus {
            self.sent.lock().push(data.to_vec());
            self.script.lock().pop_front().unwrap_or(DataPortStatus::PortOk)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedConsumer;
    use super::*;
    use crate::buffer::RingBuffer;
    use crate::connector::ConnectorProfile;
    use crate::listener::ConnectorListeners;

    fn drain(policy: PushPolicy, skip: usize, consumer: Arc<ScriptedConsumer>) -> (Drain, Arc<dyn Buffer>) {
        let buffer: Arc<dyn Buffer> = Arc::new(RingBuffer::<Record>::with_capacity(16));
        let listener = Arc::new(ListenerBinding::detached(ConnectorProfile::new("drain")));
        let config = PublisherConfig {
            push_policy: policy,
            skip_count: skip,
            ..Default::default()
        };
        (Drain::new(Arc::clone(&buffer), consumer, listener, &config), buffer)
    }

    fn fill(d: &Drain, n: u8) {
        for i in 0..n {
            assert_eq!(d.enqueue(vec![i], Timeout::Default), DataPortStatus::PortOk);
        }
    }

    #[test]
    fn test_factory_keys() {
        let factory = PublisherFactory::with_defaults();
        assert_eq!(factory.names(), vec!["flush", "new", "periodic"]);
    }

    #[test]
    fn test_push_all_and_fifo() {
        let consumer = ScriptedConsumer::with_script(&[]);
        let (d, _) = drain(PushPolicy::All, 0, Arc::clone(&consumer));
        fill(&d, 3);
        assert_eq!(d.pump(), DataPortStatus::PortOk);
        assert_eq!(consumer.sent(), vec![vec![0], vec![1], vec![2]]);

        let consumer = ScriptedConsumer::with_script(&[]);
        let (d, buffer) = drain(PushPolicy::Fifo, 0, Arc::clone(&consumer));
        fill(&d, 3);
        d.pump();
        assert_eq!(consumer.sent(), vec![vec![0]]);
        assert_eq!(buffer.readable(), 2);
    }

    #[test]
    fn test_push_skip_and_new() {
        let consumer = ScriptedConsumer::with_script(&[]);
        let (d, _) = drain(PushPolicy::Skip, 2, Arc::clone(&consumer));
        fill(&d, 7);
        d.pump();
        assert_eq!(consumer.sent(), vec![vec![0], vec![3], vec![6]]);

        let consumer = ScriptedConsumer::with_script(&[]);
        let (d, buffer) = drain(PushPolicy::New, 0, Arc::clone(&consumer));
        fill(&d, 4);
        d.pump();
        assert_eq!(consumer.sent(), vec![vec![3]]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_failed_send_is_not_retried() {
        let consumer = ScriptedConsumer::with_script(&[DataPortStatus::PortOk, DataPortStatus::SendFull]);
        let (d, buffer) = drain(PushPolicy::All, 0, Arc::clone(&consumer));
        fill(&d, 4);
        assert_eq!(d.pump(), DataPortStatus::SendFull);
        assert_eq!(buffer.readable(), 2);
        d.pump();
        assert_eq!(consumer.sent(), vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_connection_lost_latches() {
        let consumer = ScriptedConsumer::with_script(&[DataPortStatus::ConnectionLost]);
        let (d, _) = drain(PushPolicy::All, 0, Arc::clone(&consumer));
        fill(&d, 2);
        assert_eq!(d.pump(), DataPortStatus::ConnectionLost);
        assert!(d.is_lost());
        assert_eq!(d.enqueue(vec![9], Timeout::Default), DataPortStatus::ConnectionLost);
        assert_eq!(d.pump(), DataPortStatus::ConnectionLost);
        assert_eq!(consumer.sent().len(), 1);
    }

    #[test]
    fn test_send_events_and_unknown_status() {
        let listeners = Arc::new(ConnectorListeners::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in ConnectorDataListenerType::ALL {
            let seen = Arc::clone(&seen);
            listeners.add_data_listener(
                kind,
                Arc::new(move |_: &mut ConnectorProfile, _: &mut Record| {
                    seen.lock().push(kind);
                    crate::listener::ListenerStatus::NO_CHANGE
                }),
                false,
            );
        }
        let binding = ListenerBinding::new(ConnectorProfile::new("send"), listeners);

        let consumer = ScriptedConsumer::with_script(&[DataPortStatus::RecvEmpty]);
        assert_eq!(send(&*consumer, &binding, vec![1]), DataPortStatus::UnknownError);
        assert_eq!(send(&*consumer, &binding, vec![2]), DataPortStatus::PortOk);
        assert_eq!(
            *seen.lock(),
            vec![
                ConnectorDataListenerType::OnSend,
                ConnectorDataListenerType::OnReceiverError,
                ConnectorDataListenerType::OnSend,
                ConnectorDataListenerType::OnReceived,
            ]
        );
    }
}
