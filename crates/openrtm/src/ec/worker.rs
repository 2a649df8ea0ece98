// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-context component bookkeeping and the tick itself.
//!
//! Attach and detach requests are queued and merged at the start of the
//! next tick, so a tick always walks a stable list. Component callbacks run
//! with no worker lock held: a callback may itself call back into the
//! context (activate a peer, change the rate) without deadlocking.

use super::fsm::{self, LifeCycleEvent, LifeCycleState, TransitionAction};
use super::{EcHandle, ExecutionContext};
use crate::config::{period_of, EcConfig};
use crate::rtobject::RtObject;
use crate::status::ReturnCode;
use arc_swap::ArcSwap;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Tick rate and the period derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub hz: f64,
    pub period: Duration,
}

impl Rate {
    pub fn new(hz: f64) -> Option<Self> {
        let period = period_of(hz)?;
        Some(Self { hz, period })
    }
}

// ============================================================================
// Slot
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct States {
    curr: LifeCycleState,
    next: LifeCycleState,
}

/// One attached component and its state in this context.
struct Slot {
    comp: Arc<RtObject>,
    handle: EcHandle,
    states: Mutex<States>,
    changed: Condvar,
}

impl Slot {
    fn new(comp: Arc<RtObject>, handle: EcHandle) -> Self {
        let initial = fsm::lookup(LifeCycleState::Created, LifeCycleEvent::Attach)
            .map_or(LifeCycleState::Inactive, |t| t.to);
        Self {
            comp,
            handle,
            states: Mutex::new(States {
                curr: initial,
                next: initial,
            }),
            changed: Condvar::new(),
        }
    }

    fn is(&self, comp: &RtObject) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.comp), comp)
    }

    fn state(&self) -> LifeCycleState {
        self.states.lock().curr
    }

    /// Queue `event` as the next state. Refused while another transition is
    /// pending or if the table has no row for it.
    fn request(&self, event: LifeCycleEvent) -> Result<LifeCycleState, ReturnCode> {
        let mut s = self.states.lock();
        if s.curr != s.next {
            return Err(ReturnCode::PreconditionNotMet);
        }
        let t = fsm::lookup(s.curr, event).ok_or(ReturnCode::PreconditionNotMet)?;
        s.next = t.to;
        Ok(t.to)
    }

    /// Send the component to `Error` on the next tick.
    fn abort(&self) {
        let mut s = self.states.lock();
        if let Some(t) = fsm::lookup(s.curr, LifeCycleEvent::Abort) {
            s.next = t.to;
        }
    }

    fn wait_for(&self, target: LifeCycleState, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut s = self.states.lock();
        while s.curr != target {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut s, deadline).timed_out() {
                        return s.curr == target;
                    }
                }
                None => self.changed.wait(&mut s),
            }
        }
        true
    }

    fn invoke(&self, action: TransitionAction) -> ReturnCode {
        let h = self.handle;
        self.comp.with_action(|a| match action {
            TransitionAction::Activated => a.on_activated(h),
            TransitionAction::Deactivated => a.on_deactivated(h),
            TransitionAction::Aborting => a.on_aborting(h),
            TransitionAction::Reset => a.on_reset(h),
        })
    }

    /// Apply a pending transition.
    fn pre(&self) {
        let States { curr, next } = *self.states.lock();
        if curr == next {
            return;
        }
        let Some(t) = fsm::between(curr, next) else {
            log::warn!(
                "[EcWorker] {} has no transition {} -> {}",
                self.comp.name(),
                curr,
                next
            );
            self.states.lock().next = curr;
            return;
        };
        let failed = match t.action {
            Some(action) => {
                let rc = self.invoke(action);
                if !rc.is_ok() {
                    log::debug!(
                        "[EcWorker] {} {:?} returned {}",
                        self.comp.name(),
                        action,
                        rc
                    );
                }
                !rc.is_ok() && action.aborts_on_failure()
            }
            None => false,
        };
        // An abort raised while the callback ran stays pending in `next`.
        self.states.lock().curr = next;
        if failed {
            self.abort();
        }
        self.changed.notify_all();
    }

    fn do_work(&self) {
        let States { curr, next } = *self.states.lock();
        let h = self.handle;
        match curr {
            LifeCycleState::Active if next != LifeCycleState::Error => {
                if !self.comp.with_action(|a| a.on_execute(h)).is_ok() {
                    self.abort();
                }
            }
            LifeCycleState::Error => {
                self.comp.with_action(|a| a.on_error(h));
            }
            _ => {}
        }
    }

    fn post(&self) {
        let States { curr, next } = *self.states.lock();
        if curr == LifeCycleState::Active
            && next != LifeCycleState::Error
            && !self.comp.with_action(|a| a.on_state_update(self.handle)).is_ok()
        {
            self.abort();
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

#[derive(Default)]
struct Components {
    slots: Vec<Arc<Slot>>,
    added: Vec<Arc<Slot>>,
    removed: Vec<Arc<Slot>>,
}

impl Components {
    fn find(&self, comp: &RtObject) -> Option<&Arc<Slot>> {
        self.slots
            .iter()
            .filter(|s| !self.removed.iter().any(|r| Arc::ptr_eq(r, s)))
            .chain(self.added.iter())
            .find(|s| s.is(comp))
    }

    fn merge(&mut self) {
        if !self.removed.is_empty() {
            let removed = std::mem::take(&mut self.removed);
            self.slots
                .retain(|s| !removed.iter().any(|r| Arc::ptr_eq(r, s)));
        }
        self.slots.append(&mut self.added);
    }
}

/// State shared by every execution-context kind: the component list, the
/// rate and the running flag.
pub struct EcWorker {
    me: Weak<dyn ExecutionContext>,
    rate: ArcSwap<Rate>,
    sync_transition: bool,
    transition_timeout: Duration,
    running: AtomicBool,
    components: Mutex<Components>,
}

impl EcWorker {
    pub(crate) fn new(me: Weak<dyn ExecutionContext>, config: &EcConfig) -> Self {
        Self {
            me,
            rate: ArcSwap::from_pointee(Rate {
                hz: config.rate,
                period: config.period(),
            }),
            sync_transition: config.sync_transition,
            transition_timeout: config.transition_timeout,
            running: AtomicBool::new(false),
            components: Mutex::new(Components::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns false if already running.
    pub(crate) fn mark_running(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns false if already stopped.
    pub(crate) fn mark_stopped(&self) -> bool {
        self.running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn rate(&self) -> f64 {
        self.rate.load().hz
    }

    pub fn period(&self) -> Duration {
        self.rate.load().period
    }

    /// Store a new rate and raise `on_rate_changed` on every component.
    pub fn set_rate(&self, hz: f64) -> ReturnCode {
        let Some(rate) = Rate::new(hz) else {
            return ReturnCode::BadParameter;
        };
        self.rate.store(Arc::new(rate));
        log::debug!("[EcWorker] rate set to {} Hz", hz);
        for slot in self.snapshot() {
            if !slot.comp.with_action(|a| a.on_rate_changed(slot.handle)).is_ok() {
                slot.abort();
            }
        }
        ReturnCode::Ok
    }

    fn snapshot(&self) -> Vec<Arc<Slot>> {
        let mut components = self.components.lock();
        components.merge();
        components.slots.clone()
    }

    pub fn add_component(&self, comp: &Arc<RtObject>) -> ReturnCode {
        if !comp.is_alive() {
            return ReturnCode::PreconditionNotMet;
        }
        let Some(me) = self.me.upgrade() else {
            return ReturnCode::PreconditionNotMet;
        };
        let mut components = self.components.lock();
        if components.find(comp).is_some() {
            return ReturnCode::BadParameter;
        }
        let handle = comp.bind_context(Arc::downgrade(&me));
        components
            .added
            .push(Arc::new(Slot::new(Arc::clone(comp), handle)));
        log::debug!("[EcWorker] attached {} as {}", comp.name(), handle);
        ReturnCode::Ok
    }

    /// Detach an inactive component.
    pub fn remove_component(&self, comp: &RtObject) -> ReturnCode {
        let mut components = self.components.lock();
        let Some(slot) = components.find(comp).cloned() else {
            return ReturnCode::BadParameter;
        };
        if slot.state() == LifeCycleState::Active {
            return ReturnCode::PreconditionNotMet;
        }
        if let Some(pos) = components.added.iter().position(|s| Arc::ptr_eq(s, &slot)) {
            components.added.remove(pos);
        } else {
            components.removed.push(Arc::clone(&slot));
        }
        drop(components);
        comp.unbind_context(slot.handle);
        log::debug!("[EcWorker] detached {}", comp.name());
        ReturnCode::Ok
    }

    pub fn component_state(&self, comp: &RtObject) -> LifeCycleState {
        self.components
            .lock()
            .find(comp)
            .map_or(LifeCycleState::Created, |s| s.state())
    }

    pub fn component_count(&self) -> usize {
        let components = self.components.lock();
        components.slots.len() + components.added.len() - components.removed.len()
    }

    /// Queue a lifecycle event. With `sync_transition` on a running
    /// context, waits for the tick that applies it.
    pub fn request(&self, comp: &RtObject, event: LifeCycleEvent) -> ReturnCode {
        let Some(slot) = self.components.lock().find(comp).cloned() else {
            return ReturnCode::BadParameter;
        };
        let target = match slot.request(event) {
            Ok(target) => target,
            Err(rc) => return rc,
        };
        if self.sync_transition && self.is_running() {
            if !slot.wait_for(target, self.transition_timeout) {
                log::warn!(
                    "[EcWorker] {} did not reach {} within {:?}",
                    comp.name(),
                    target,
                    self.transition_timeout
                );
                return ReturnCode::Error;
            }
        }
        ReturnCode::Ok
    }

    pub(crate) fn startup_components(&self) {
        for slot in self.snapshot() {
            slot.comp.with_action(|a| a.on_startup(slot.handle));
        }
    }

    pub(crate) fn shutdown_components(&self) {
        for slot in self.snapshot() {
            slot.comp.with_action(|a| a.on_shutdown(slot.handle));
        }
    }

    /// One execution cycle over every attached component, in attachment
    /// order: pending transitions first, then `on_execute`/`on_error`,
    /// then `on_state_update`.
    pub fn tick(&self) {
        let slots = self.snapshot();
        for slot in &slots {
            slot.pre();
        }
        for slot in &slots {
            slot.do_work();
        }
        for slot in &slots {
            slot.post();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtobject::ComponentAction;
    use std::sync::OnceLock;

    /// Aborts its own slot from inside `on_activated`, as a failing
    /// `on_rate_changed` on another thread would.
    struct AbortWhileActivating(Arc<OnceLock<Weak<Slot>>>);

    impl ComponentAction for AbortWhileActivating {
        fn on_activated(&mut self, _: EcHandle) -> ReturnCode {
            if let Some(slot) = self.0.get().and_then(Weak::upgrade) {
                slot.abort();
            }
            ReturnCode::Ok
        }
    }

    #[test]
    fn test_abort_during_transition_is_kept() {
        let cell = Arc::new(OnceLock::new());
        let comp = RtObject::new("comp", AbortWhileActivating(Arc::clone(&cell)));
        let slot = Arc::new(Slot::new(comp, EcHandle(0)));
        cell.set(Arc::downgrade(&slot)).unwrap();

        assert_eq!(
            slot.request(LifeCycleEvent::Activate),
            Ok(LifeCycleState::Active)
        );
        slot.pre();
        assert_eq!(slot.state(), LifeCycleState::Active);
        assert_eq!(slot.states.lock().next, LifeCycleState::Error);

        slot.pre();
        assert_eq!(slot.state(), LifeCycleState::Error);
    }

    #[test]
    fn test_rate_needs_representable_period() {
        assert!(Rate::new(1e-320).is_none());
        assert!(Rate::new(0.0).is_none());
        assert!(Rate::new(f64::NAN).is_none());
        assert_eq!(
            Rate::new(250.0).map(|r| r.period),
            Some(Duration::from_millis(4))
        );
    }
}
