// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic

//! Component lifecycle driven through execution contexts.

use openrtm::ec::EcWorker;
use openrtm::{
    connect, ComponentAction, ConnectorProfile, EcConfig, EcHandle, ExecutionContext,
    ExtTrigExecutionContext, InPort, LifeCycleState, OutPort, PeriodicExecutionContext,
    Registries, ReturnCode, RtObject,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Fails `on_execute` on the given call number.
struct Flaky {
    log: Arc<Mutex<Vec<&'static str>>>,
    calls: u32,
    fail_on: u32,
}

impl Flaky {
    fn push(&self, event: &'static str) -> ReturnCode {
        self.log.lock().push(event);
        ReturnCode::Ok
    }
}

impl ComponentAction for Flaky {
    fn on_activated(&mut self, _: EcHandle) -> ReturnCode {
        self.push("activated")
    }
    fn on_deactivated(&mut self, _: EcHandle) -> ReturnCode {
        self.push("deactivated")
    }
    fn on_aborting(&mut self, _: EcHandle) -> ReturnCode {
        self.push("aborting")
    }
    fn on_error(&mut self, _: EcHandle) -> ReturnCode {
        self.push("error")
    }
    fn on_reset(&mut self, _: EcHandle) -> ReturnCode {
        self.push("reset")
    }
    fn on_execute(&mut self, _: EcHandle) -> ReturnCode {
        self.calls += 1;
        self.push("execute");
        if self.calls == self.fail_on {
            ReturnCode::Error
        } else {
            ReturnCode::Ok
        }
    }
}

#[test]
fn error_then_reset_sequence() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let comp = RtObject::new(
        "flaky",
        Flaky {
            log: Arc::clone(&log),
            calls: 0,
            fail_on: 2,
        },
    );
    assert!(comp.initialize().is_ok());

    let ec = ExtTrigExecutionContext::new(&EcConfig::default());
    assert!(ec.add_component(&comp).is_ok());
    assert!(ec.start().is_ok());
    assert!(ec.activate_component(&comp).is_ok());

    for _ in 0..4 {
        ec.tick();
    }
    assert_eq!(ec.component_state(&comp), LifeCycleState::Error);
    assert!(ec.reset_component(&comp).is_ok());
    ec.tick();
    assert_eq!(ec.component_state(&comp), LifeCycleState::Inactive);
    assert!(ec.activate_component(&comp).is_ok());
    ec.tick();

    assert_eq!(
        *log.lock(),
        [
            "activated", "execute", // tick 1
            "execute",   // tick 2: fails
            "aborting", "error", // tick 3
            "error",     // tick 4
            "reset",     // tick 5
            "activated", "execute", // tick 6
        ]
    );
}

/// Counts executions and forwards a counter through an OutPort.
struct Producer {
    out: OutPort<u32>,
    count: Arc<AtomicU32>,
}

impl ComponentAction for Producer {
    fn on_execute(&mut self, _: EcHandle) -> ReturnCode {
        let n = self.count.fetch_add(1, Ordering::Relaxed);
        if self.out.write(&n).is_ok() {
            ReturnCode::Ok
        } else {
            ReturnCode::Error
        }
    }
}

#[test]
fn periodic_context_drives_a_data_flow() {
    let reg = Registries::with_defaults();
    let out: OutPort<u32> = OutPort::new("count", Arc::clone(&reg));
    let inp: InPort<u32> = InPort::new("count", reg);
    connect(
        out.base(),
        inp.base(),
        ConnectorProfile::new("flow").with_property("dataport.buffer.length", "1"),
    )
    .unwrap();

    let count = Arc::new(AtomicU32::new(0));
    let base = Arc::clone(out.base());
    let comp = RtObject::new(
        "producer",
        Producer {
            out,
            count: Arc::clone(&count),
        },
    );
    assert!(comp.add_out_port(base).is_ok());
    assert!(comp.initialize().is_ok());

    let ec = PeriodicExecutionContext::new(&EcConfig {
        rate: 200.0,
        ..EcConfig::default()
    });
    let dyn_ec: Arc<dyn ExecutionContext> = ec.clone();
    assert!(comp.attach_context(&dyn_ec).is_ok());
    assert!(ec.start().is_ok());
    assert!(ec.activate_component(&comp).is_ok());

    let deadline = Instant::now() + Duration::from_secs(2);
    while count.load(Ordering::Relaxed) < 10 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(count.load(Ordering::Relaxed) >= 10);
    // Overwrite policy with length 1: only the newest value is kept.
    let latest = inp.read().unwrap();
    assert!(latest >= 9);

    assert!(comp.exit().is_ok());
    assert_eq!(ec.component_state(&comp), LifeCycleState::Created);
    assert!(out_port_gone(&comp));
    assert!(ec.stop().is_ok());
}

fn out_port_gone(comp: &RtObject) -> bool {
    comp.out_port("count").is_none()
}

#[test]
fn period_tracks_rate() {
    let ec = PeriodicExecutionContext::new(&EcConfig {
        rate: 50.0,
        ..EcConfig::default()
    });
    let worker: &EcWorker = ec.worker();
    assert_eq!(worker.period(), Duration::from_millis(20));
    assert_eq!(ec.set_rate(-1.0), ReturnCode::BadParameter);
    assert!(ec.set_rate(100.0).is_ok());
    assert_eq!(worker.period(), Duration::from_millis(10));
}
