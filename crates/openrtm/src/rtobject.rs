// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RT-Components.
//!
//! An [`RtObject`] pairs user behaviour ([`ComponentAction`]) with the ports
//! it owns and the execution contexts it is attached to. Lifecycle:
//!
//! ```text
//! new ─▶ initialize ─▶ attach / activate / ... ─▶ exit (or finalize)
//! ```

use crate::ec::{EcHandle, ExecutionContext, LifeCycleState};
use crate::port::{InPortBase, OutPortBase};
use crate::status::ReturnCode;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

/// Component callbacks. Every hook defaults to `Ok`.
///
/// Hooks taking an [`EcHandle`] are raised by the execution context with
/// that handle; the rest are raised by the component itself.
///
/// A hook may not tear down its own component: [`RtObject::exit`],
/// [`RtObject::finalize`] and [`RtObject::initialize`] called from inside
/// one of the component's hooks return `PreconditionNotMet`. Deactivate
/// instead and exit from outside the context.
#[allow(unused_variables)]
pub trait ComponentAction: Send {
    fn on_initialize(&mut self) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_finalize(&mut self) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_startup(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_shutdown(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_activated(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_deactivated(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_aborting(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_error(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_reset(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_execute(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_state_update(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
    fn on_rate_changed(&mut self, ec: EcHandle) -> ReturnCode {
        ReturnCode::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Alive,
    Finalized,
}

pub struct RtObject {
    name: String,
    action: Mutex<Box<dyn ComponentAction>>,
    /// Thread currently inside one of the hooks, if any.
    in_hook: Mutex<Option<ThreadId>>,
    phase: Mutex<Phase>,
    out_ports: RwLock<Vec<Arc<OutPortBase>>>,
    in_ports: RwLock<Vec<Arc<InPortBase>>>,
    /// Indexed by `EcHandle`; detached slots stay `None` so handles are
    /// never reused.
    contexts: Mutex<Vec<Option<Weak<dyn ExecutionContext>>>>,
}

impl RtObject {
    pub fn new(name: impl Into<String>, action: impl ComponentAction + 'static) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            action: Mutex::new(Box::new(action)),
            in_hook: Mutex::new(None),
            phase: Mutex::new(Phase::Created),
            out_ports: RwLock::new(Vec::new()),
            in_ports: RwLock::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a callback with exclusive access to the component behaviour.
    pub(crate) fn with_action<R>(&self, f: impl FnOnce(&mut dyn ComponentAction) -> R) -> R {
        let mut action = self.action.lock();
        let _hook = HookGuard::enter(&self.in_hook);
        f(action.as_mut())
    }

    /// Whether the calling thread is running one of this component's hooks.
    fn called_from_hook(&self, op: &str) -> bool {
        let inside = *self.in_hook.lock() == Some(thread::current().id());
        if inside {
            log::warn!("[RtObject] {} {} refused inside its own callback", self.name, op);
        }
        inside
    }

    /// Raise `on_initialize`. On success the component may join contexts.
    pub fn initialize(&self) -> ReturnCode {
        if self.called_from_hook("initialize") {
            return ReturnCode::PreconditionNotMet;
        }
        let mut phase = self.phase.lock();
        if *phase != Phase::Created {
            return ReturnCode::PreconditionNotMet;
        }
        let rc = self.with_action(|a| a.on_initialize());
        if rc.is_ok() {
            *phase = Phase::Alive;
            log::debug!("[RtObject] {} initialized", self.name);
        } else {
            log::warn!("[RtObject] {} on_initialize returned {}", self.name, rc);
        }
        rc
    }

    pub fn is_alive(&self) -> bool {
        *self.phase.lock() == Phase::Alive
    }

    // ========================================================================
    // Ports
    // ========================================================================

    pub fn add_out_port(&self, port: Arc<OutPortBase>) -> ReturnCode {
        let mut ports = self.out_ports.write();
        if ports.iter().any(|p| p.name() == port.name()) {
            return ReturnCode::BadParameter;
        }
        ports.push(port);
        ReturnCode::Ok
    }

    pub fn add_in_port(&self, port: Arc<InPortBase>) -> ReturnCode {
        let mut ports = self.in_ports.write();
        if ports.iter().any(|p| p.name() == port.name()) {
            return ReturnCode::BadParameter;
        }
        ports.push(port);
        ReturnCode::Ok
    }

    pub fn out_port(&self, name: &str) -> Option<Arc<OutPortBase>> {
        self.out_ports.read().iter().find(|p| p.name() == name).cloned()
    }

    pub fn in_port(&self, name: &str) -> Option<Arc<InPortBase>> {
        self.in_ports.read().iter().find(|p| p.name() == name).cloned()
    }

    // ========================================================================
    // Execution contexts
    // ========================================================================

    pub(crate) fn bind_context(&self, ec: Weak<dyn ExecutionContext>) -> EcHandle {
        let mut contexts = self.contexts.lock();
        contexts.push(Some(ec));
        EcHandle((contexts.len() - 1) as u32)
    }

    pub(crate) fn unbind_context(&self, handle: EcHandle) {
        if let Some(slot) = self.contexts.lock().get_mut(handle.0 as usize) {
            *slot = None;
        }
    }

    /// Join `ec`. Same as `ec.add_component(self)`.
    pub fn attach_context(self: &Arc<Self>, ec: &Arc<dyn ExecutionContext>) -> ReturnCode {
        ec.add_component(self)
    }

    pub fn detach_context(&self, handle: EcHandle) -> ReturnCode {
        match self.get_context(handle) {
            Some(ec) => ec.remove_component(self),
            None => ReturnCode::BadParameter,
        }
    }

    pub fn get_context(&self, handle: EcHandle) -> Option<Arc<dyn ExecutionContext>> {
        self.contexts
            .lock()
            .get(handle.0 as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(Weak::upgrade)
    }

    pub fn get_context_handle(&self, ec: &Arc<dyn ExecutionContext>) -> Option<EcHandle> {
        self.contexts
            .lock()
            .iter()
            .position(|slot| {
                slot.as_ref()
                    .and_then(Weak::upgrade)
                    .is_some_and(|c| Arc::ptr_eq(&c, ec))
            })
            .map(|i| EcHandle(i as u32))
    }

    /// Contexts this component is attached to, by handle.
    pub fn contexts(&self) -> Vec<(EcHandle, Arc<dyn ExecutionContext>)> {
        self.contexts
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let ec = slot.as_ref()?.upgrade()?;
                Some((EcHandle(i as u32), ec))
            })
            .collect()
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Raise `on_finalize`, disconnect and drop every port.
    ///
    /// Refused while the component is still attached to a context.
    pub fn finalize(&self) -> ReturnCode {
        if self.called_from_hook("finalize") {
            return ReturnCode::PreconditionNotMet;
        }
        let mut phase = self.phase.lock();
        if *phase == Phase::Finalized {
            return ReturnCode::PreconditionNotMet;
        }
        if !self.contexts().is_empty() {
            return ReturnCode::PreconditionNotMet;
        }
        let rc = if *phase == Phase::Alive {
            self.with_action(|a| a.on_finalize())
        } else {
            ReturnCode::Ok
        };

        for port in self.out_ports.write().drain(..) {
            port.finalize();
        }
        for port in self.in_ports.write().drain(..) {
            port.finalize();
        }
        *phase = Phase::Finalized;
        log::debug!("[RtObject] {} finalized", self.name);
        rc
    }

    /// Deactivate in and detach from every context, then finalize.
    pub fn exit(&self) -> ReturnCode {
        if self.called_from_hook("exit") {
            return ReturnCode::PreconditionNotMet;
        }
        if !self.is_alive() {
            return ReturnCode::PreconditionNotMet;
        }
        for (handle, ec) in self.contexts() {
            if ec.component_state(self) == LifeCycleState::Active {
                ec.deactivate_component(self);
            }
            let rc = ec.remove_component(self);
            if !rc.is_ok() {
                log::warn!("[RtObject] {} could not leave {}: {}", self.name, handle, rc);
                return rc;
            }
        }
        self.finalize()
    }
}

/// Marks the current thread as inside a hook until dropped, panics included.
struct HookGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> HookGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *slot.lock() = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for HookGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl std::fmt::Debug for RtObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtObject")
            .field("name", &self.name)
            .field("phase", &*self.phase.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Shared, ordered log of callback names.
    #[derive(Clone, Default)]
    pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        pub(crate) fn push(&self, event: &str) {
            self.0.lock().push(event.to_string());
        }

        pub(crate) fn events(&self) -> Vec<String> {
            self.0.lock().clone()
        }

        pub(crate) fn clear(&self) {
            self.0.lock().clear();
        }
    }

    /// Records every callback; `fail` names callbacks that return `Error`.
    pub(crate) struct Recorder {
        journal: Journal,
        pub(crate) fail: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Recorder {
        pub(crate) fn new(journal: Journal) -> Self {
            Self {
                journal,
                fail: Arc::default(),
            }
        }

        fn record(&self, event: &'static str) -> ReturnCode {
            self.journal.push(event);
            if self.fail.lock().contains(&event) {
                ReturnCode::Error
            } else {
                ReturnCode::Ok
            }
        }
    }

    impl ComponentAction for Recorder {
        fn on_initialize(&mut self) -> ReturnCode {
            self.record("on_initialize")
        }
        fn on_finalize(&mut self) -> ReturnCode {
            self.record("on_finalize")
        }
        fn on_startup(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_startup")
        }
        fn on_shutdown(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_shutdown")
        }
        fn on_activated(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_activated")
        }
        fn on_deactivated(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_deactivated")
        }
        fn on_aborting(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_aborting")
        }
        fn on_error(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_error")
        }
        fn on_reset(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_reset")
        }
        fn on_execute(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_execute")
        }
        fn on_state_update(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_state_update")
        }
        fn on_rate_changed(&mut self, _: EcHandle) -> ReturnCode {
            self.record("on_rate_changed")
        }
    }
}
