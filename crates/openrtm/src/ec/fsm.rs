// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Component lifecycle state machine.
//!
//! ```text
//!            Attach          Activate
//!  Created ─────────▶ Inactive ◀────────▶ Active
//!                        ▲    Deactivate    │
//!                 Reset  │                  │ Abort
//!                        │      Abort       ▼
//!                      Error ◀──────────────┘
//! ```
//!
//! Every legal move is a row of [`TRANSITIONS`]; anything else is refused.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifeCycleState {
    /// Not attached to this context.
    Created,
    Inactive,
    Active,
    Error,
}

impl fmt::Display for LifeCycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED_STATE",
            Self::Inactive => "INACTIVE_STATE",
            Self::Active => "ACTIVE_STATE",
            Self::Error => "ERROR_STATE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifeCycleEvent {
    Attach,
    Activate,
    Deactivate,
    /// A callback failed.
    Abort,
    Reset,
}

/// Component callback run when a transition is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionAction {
    Activated,
    Deactivated,
    Aborting,
    Reset,
}

impl TransitionAction {
    /// A non-OK return from this callback sends the component to `Error`.
    pub fn aborts_on_failure(self) -> bool {
        matches!(self, Self::Activated | Self::Reset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LifeCycleState,
    pub event: LifeCycleEvent,
    pub to: LifeCycleState,
    pub action: Option<TransitionAction>,
}

const fn row(
    from: LifeCycleState,
    event: LifeCycleEvent,
    to: LifeCycleState,
    action: Option<TransitionAction>,
) -> Transition {
    Transition {
        from,
        event,
        to,
        action,
    }
}

use LifeCycleEvent as E;
use LifeCycleState as S;
use TransitionAction as A;

pub const TRANSITIONS: &[Transition] = &[
    row(S::Created, E::Attach, S::Inactive, None),
    row(S::Inactive, E::Activate, S::Active, Some(A::Activated)),
    row(S::Active, E::Deactivate, S::Inactive, Some(A::Deactivated)),
    row(S::Inactive, E::Abort, S::Error, Some(A::Aborting)),
    row(S::Active, E::Abort, S::Error, Some(A::Aborting)),
    row(S::Error, E::Reset, S::Inactive, Some(A::Reset)),
];

/// Row for `event` in state `from`.
pub fn lookup(from: LifeCycleState, event: LifeCycleEvent) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.event == event)
}

/// Row that moves `from` to `to`.
pub fn between(from: LifeCycleState, to: LifeCycleState) -> Option<&'static Transition> {
    TRANSITIONS.iter().find(|t| t.from == from && t.to == to)
}
