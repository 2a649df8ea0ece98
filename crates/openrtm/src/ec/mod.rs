// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Execution contexts: the schedulers that drive component callbacks.
//!
//! A context keeps one lifecycle state per attached component (see
//! [`fsm`]). Each tick applies pending transitions, then runs
//! `on_execute` for active components (`on_error` for failed ones), then
//! `on_state_update`. A non-OK `on_execute` or `on_state_update` moves the
//! component to `Error` on the following tick.
//!
//! - [`PeriodicExecutionContext`]: own thread, fixed rate
//! - [`ExtTrigExecutionContext`]: stepped by [`ExtTrigExecutionContext::tick`]
//!
//! A component may be attached to several contexts; each gives it a
//! separate [`EcHandle`] and keeps a separate state.

mod exttrig;
pub mod fsm;
mod periodic;
mod worker;

pub use exttrig::ExtTrigExecutionContext;
pub use fsm::{LifeCycleEvent, LifeCycleState};
pub use periodic::PeriodicExecutionContext;
pub use worker::{EcWorker, Rate};

use crate::rtobject::RtObject;
use crate::status::ReturnCode;
use std::fmt;
use std::sync::Arc;

/// Index of a context in its component's context list. Passed to every
/// component callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EcHandle(pub u32);

impl fmt::Display for EcHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ec#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    Periodic,
    /// Ticked by its owner.
    EventDriven,
}

/// Common interface of every execution context.
///
/// Implementors provide the worker and the start/stop mechanics; component
/// management and transitions are shared.
pub trait ExecutionContext: Send + Sync {
    fn worker(&self) -> &EcWorker;
    fn kind(&self) -> ExecutionKind;

    /// Raise `on_startup` on every component and begin ticking.
    fn start(&self) -> ReturnCode;
    /// Stop ticking, then raise `on_shutdown` on every component.
    fn stop(&self) -> ReturnCode;

    fn is_running(&self) -> bool {
        self.worker().is_running()
    }

    fn rate(&self) -> f64 {
        self.worker().rate()
    }

    fn set_rate(&self, rate: f64) -> ReturnCode {
        self.worker().set_rate(rate)
    }

    fn add_component(&self, comp: &Arc<RtObject>) -> ReturnCode {
        self.worker().add_component(comp)
    }

    fn remove_component(&self, comp: &RtObject) -> ReturnCode {
        self.worker().remove_component(comp)
    }

    fn activate_component(&self, comp: &RtObject) -> ReturnCode {
        self.worker().request(comp, LifeCycleEvent::Activate)
    }

    fn deactivate_component(&self, comp: &RtObject) -> ReturnCode {
        self.worker().request(comp, LifeCycleEvent::Deactivate)
    }

    fn reset_component(&self, comp: &RtObject) -> ReturnCode {
        self.worker().request(comp, LifeCycleEvent::Reset)
    }

    /// `Created` if the component is not attached here.
    fn component_state(&self, comp: &RtObject) -> LifeCycleState {
        self.worker().component_state(comp)
    }
}
