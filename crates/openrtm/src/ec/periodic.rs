// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{EcWorker, ExecutionContext, ExecutionKind};
use crate::config::EcConfig;
use crate::status::ReturnCode;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Dropping the sender wakes the thread out of its inter-tick sleep with
/// `Disconnected`; the thread is then joined.
struct StopHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StopHandle {
    fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("[PeriodicEC] execution thread panicked");
            }
        }
    }
}

impl Drop for StopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Execution context driven by its own thread at a fixed rate.
///
/// Each cycle runs one [`EcWorker::tick`] and then sleeps for whatever is
/// left of the period; an overrunning cycle starts the next one at once.
/// The rate may change while running and applies from the next sleep.
pub struct PeriodicExecutionContext {
    worker: Arc<EcWorker>,
    stop_handle: Mutex<Option<StopHandle>>,
}

impl PeriodicExecutionContext {
    pub fn new(config: &EcConfig) -> Arc<Self> {
        Arc::new_cyclic(|me: &std::sync::Weak<Self>| {
            let me: std::sync::Weak<dyn ExecutionContext> = me.clone();
            Self {
                worker: Arc::new(EcWorker::new(me, config)),
                stop_handle: Mutex::new(None),
            }
        })
    }

    fn spawn(&self) -> std::io::Result<StopHandle> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let worker = Arc::clone(&self.worker);
        let thread = thread::Builder::new()
            .name("openrtm-periodic-ec".into())
            .spawn(move || {
                log::debug!("[PeriodicEC] started at {} Hz", worker.rate());
                loop {
                    let started = Instant::now();
                    worker.tick();
                    let sleep = worker.period().saturating_sub(started.elapsed());
                    match stop_rx.recv_timeout(sleep) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                }
                log::debug!("[PeriodicEC] stopped");
            })?;
        Ok(StopHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

impl ExecutionContext for PeriodicExecutionContext {
    fn worker(&self) -> &EcWorker {
        &self.worker
    }

    fn kind(&self) -> ExecutionKind {
        ExecutionKind::Periodic
    }

    fn start(&self) -> ReturnCode {
        if !self.worker.mark_running() {
            return ReturnCode::PreconditionNotMet;
        }
        self.worker.startup_components();
        match self.spawn() {
            Ok(handle) => {
                *self.stop_handle.lock() = Some(handle);
                ReturnCode::Ok
            }
            Err(e) => {
                log::error!("[PeriodicEC] failed to spawn execution thread: {}", e);
                self.worker.mark_stopped();
                self.worker.shutdown_components();
                ReturnCode::OutOfResources
            }
        }
    }

    fn stop(&self) -> ReturnCode {
        if !self.worker.mark_stopped() {
            return ReturnCode::PreconditionNotMet;
        }
        let handle = self.stop_handle.lock().take();
        if let Some(mut handle) = handle {
            handle.stop();
        }
        self.worker.shutdown_components();
        ReturnCode::Ok
    }
}

impl Drop for PeriodicExecutionContext {
    fn drop(&mut self) {
        if self.worker.is_running() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::LifeCycleState;
    use crate::rtobject::testing::{Journal, Recorder};
    use crate::rtobject::RtObject;
    use std::time::Duration;

    fn config(rate: f64) -> EcConfig {
        EcConfig {
            rate,
            ..EcConfig::default()
        }
    }

    #[test]
    fn test_start_stop_are_not_reentrant() {
        let ec = PeriodicExecutionContext::new(&config(200.0));
        assert_eq!(ec.stop(), ReturnCode::PreconditionNotMet);
        assert_eq!(ec.start(), ReturnCode::Ok);
        assert!(ec.is_running());
        assert_eq!(ec.start(), ReturnCode::PreconditionNotMet);
        assert_eq!(ec.stop(), ReturnCode::Ok);
        assert!(!ec.is_running());
    }

    #[test]
    fn test_sync_activation_waits_for_tick() {
        let journal = Journal::default();
        let comp = RtObject::new("comp", Recorder::new(journal.clone()));
        assert!(comp.initialize().is_ok());
        journal.clear();

        let ec = PeriodicExecutionContext::new(&config(500.0));
        assert!(ec.add_component(&comp).is_ok());
        assert!(ec.start().is_ok());
        assert!(ec.activate_component(&comp).is_ok());
        assert_eq!(ec.component_state(&comp), LifeCycleState::Active);

        thread::sleep(Duration::from_millis(30));
        assert!(ec.deactivate_component(&comp).is_ok());
        assert_eq!(ec.component_state(&comp), LifeCycleState::Inactive);
        assert!(ec.stop().is_ok());

        let events = journal.events();
        assert_eq!(events.first().map(String::as_str), Some("on_startup"));
        assert_eq!(events.last().map(String::as_str), Some("on_shutdown"));
        assert!(events.iter().any(|e| e == "on_execute"));
        assert!(events.iter().any(|e| e == "on_deactivated"));
    }

    #[test]
    fn test_rate_change_while_running() {
        let journal = Journal::default();
        let comp = RtObject::new("comp", Recorder::new(journal.clone()));
        assert!(comp.initialize().is_ok());
        let ec = PeriodicExecutionContext::new(&config(100.0));
        assert!(ec.add_component(&comp).is_ok());
        assert!(ec.start().is_ok());

        assert_eq!(ec.set_rate(0.0), ReturnCode::BadParameter);
        assert!(ec.set_rate(250.0).is_ok());
        assert_eq!(ec.rate(), 250.0);
        assert_eq!(ec.worker().period(), Duration::from_millis(4));
        assert!(ec.stop().is_ok());
        assert!(journal.events().iter().any(|e| e == "on_rate_changed"));
    }

    #[test]
    fn test_drop_joins_running_thread() {
        let ec = PeriodicExecutionContext::new(&config(1000.0));
        assert!(ec.start().is_ok());
        drop(ec);
    }
}
