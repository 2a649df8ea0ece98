// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{EcWorker, ExecutionContext, ExecutionKind};
use crate::config::EcConfig;
use crate::status::ReturnCode;
use std::sync::Arc;

/// Execution context advanced only by explicit [`tick`](Self::tick) calls.
///
/// Transitions never wait: an activation requested between two ticks is
/// applied by the next one, which makes stepping fully deterministic.
pub struct ExtTrigExecutionContext {
    worker: EcWorker,
}

impl ExtTrigExecutionContext {
    pub fn new(config: &EcConfig) -> Arc<Self> {
        let config = EcConfig {
            sync_transition: false,
            ..config.clone()
        };
        Arc::new_cyclic(|me: &std::sync::Weak<Self>| {
            let me: std::sync::Weak<dyn ExecutionContext> = me.clone();
            Self {
                worker: EcWorker::new(me, &config),
            }
        })
    }

    /// Run one execution cycle on the calling thread.
    pub fn tick(&self) -> ReturnCode {
        if !self.worker.is_running() {
            return ReturnCode::PreconditionNotMet;
        }
        log::trace!("[ExtTrigEC] tick");
        self.worker.tick();
        ReturnCode::Ok
    }
}

impl ExecutionContext for ExtTrigExecutionContext {
    fn worker(&self) -> &EcWorker {
        &self.worker
    }

    fn kind(&self) -> ExecutionKind {
        ExecutionKind::EventDriven
    }

    fn start(&self) -> ReturnCode {
        if !self.worker.mark_running() {
            return ReturnCode::PreconditionNotMet;
        }
        self.worker.startup_components();
        ReturnCode::Ok
    }

    fn stop(&self) -> ReturnCode {
        if !self.worker.mark_stopped() {
            return ReturnCode::PreconditionNotMet;
        }
        self.worker.shutdown_components();
        ReturnCode::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::LifeCycleState;
    use crate::rtobject::testing::{Journal, Recorder};
    use crate::rtobject::RtObject;

    #[test]
    fn test_tick_requires_start() {
        let ec = ExtTrigExecutionContext::new(&EcConfig::default());
        assert_eq!(ec.tick(), ReturnCode::PreconditionNotMet);
        assert!(ec.start().is_ok());
        assert!(ec.tick().is_ok());
    }

    #[test]
    fn test_set_rate_rejects_unrepresentable_period() {
        let ec = ExtTrigExecutionContext::new(&EcConfig::default());
        assert_eq!(ec.set_rate(1e-320), ReturnCode::BadParameter);
        assert_eq!(ec.set_rate(-1.0), ReturnCode::BadParameter);
        assert!(ec.set_rate(500.0).is_ok());
        assert_eq!(ec.rate(), 500.0);
    }

    #[test]
    fn test_activation_applied_on_next_tick() {
        let journal = Journal::default();
        let comp = RtObject::new("comp", Recorder::new(journal.clone()));
        assert!(comp.initialize().is_ok());
        let ec = ExtTrigExecutionContext::new(&EcConfig::default());
        assert!(ec.add_component(&comp).is_ok());
        assert!(ec.start().is_ok());

        assert!(ec.activate_component(&comp).is_ok());
        assert_eq!(ec.component_state(&comp), LifeCycleState::Inactive);
        // A second request while one is pending is refused.
        assert_eq!(
            ec.deactivate_component(&comp),
            ReturnCode::PreconditionNotMet
        );

        journal.clear();
        ec.tick();
        assert_eq!(ec.component_state(&comp), LifeCycleState::Active);
        assert_eq!(
            journal.events(),
            ["on_activated", "on_execute", "on_state_update"]
        );
    }

    #[test]
    fn test_detach_requires_inactive() {
        let comp = RtObject::new("comp", Recorder::new(Journal::default()));
        assert!(comp.initialize().is_ok());
        let ec = ExtTrigExecutionContext::new(&EcConfig::default());
        assert!(ec.add_component(&comp).is_ok());
        assert_eq!(ec.add_component(&comp), ReturnCode::BadParameter);
        assert!(ec.start().is_ok());
        ec.activate_component(&comp);
        ec.tick();

        assert_eq!(ec.remove_component(&comp), ReturnCode::PreconditionNotMet);
        ec.deactivate_component(&comp);
        ec.tick();
        assert!(ec.remove_component(&comp).is_ok());
        assert_eq!(ec.component_state(&comp), LifeCycleState::Created);
        assert_eq!(ec.worker().component_count(), 0);
    }
}
