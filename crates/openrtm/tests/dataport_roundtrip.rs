// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::float_cmp)] // Exact values round-trip

//! OutPort -> InPort round trips for every publisher over every transport.

use openrtm::{
    connect, disconnect, ConnectorProfile, DataPortStatus, InPort, OutPort, Registries, Time,
    TimedValue,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn profile(name: &str, interface: &str, subscription: &str) -> ConnectorProfile {
    ConnectorProfile::new(name)
        .with_property("dataport.interface_type", interface)
        .with_property("dataport.subscription_type", subscription)
        .with_property("dataport.buffer.length", "64")
        .with_property("dataport.publisher.push_rate", "500")
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Write `count` values and collect everything that arrives within 2 s.
fn round_trip(interface: &str, subscription: &str, count: u32) -> Vec<u32> {
    let reg = Registries::with_defaults();
    let out: OutPort<u32> = OutPort::new("out", Arc::clone(&reg));
    let inp: InPort<u32> = InPort::new("in", reg);
    let negotiated = connect(
        out.base(),
        inp.base(),
        profile(&format!("{}-{}", interface, subscription), interface, subscription),
    )
    .unwrap();

    for i in 0..count {
        assert!(out.write(&i).is_ok(), "write {} over {}", i, interface);
    }

    let mut received = Vec::new();
    wait_until(Duration::from_secs(2), || {
        while inp.is_new() {
            match inp.read() {
                Ok(v) => received.push(v),
                Err(_) => break,
            }
        }
        received.last() == Some(&(count - 1))
    });

    disconnect(out.base(), inp.base(), &negotiated.connector_id).unwrap();
    received
}

fn assert_fifo(received: &[u32], count: u32) {
    assert_eq!(received, (0..count).collect::<Vec<_>>().as_slice());
}

#[test]
fn flush_over_local() {
    assert_fifo(&round_trip("local", "flush", 20), 20);
}

#[test]
fn new_over_local() {
    assert_fifo(&round_trip("local", "new", 20), 20);
}

#[test]
fn periodic_over_local() {
    assert_fifo(&round_trip("local", "periodic", 10), 10);
}

#[test]
fn flush_over_tcp() {
    assert_fifo(&round_trip("tcp_stream", "flush", 20), 20);
}

#[test]
fn new_over_tcp() {
    assert_fifo(&round_trip("tcp_stream", "new", 20), 20);
}

#[test]
fn flush_over_udp() {
    // Loopback datagrams are not dropped at this volume.
    assert_fifo(&round_trip("udp_datagram", "flush", 20), 20);
}

#[cfg(target_os = "linux")]
#[test]
fn flush_over_shared_memory() {
    assert_fifo(&round_trip("shared_memory", "flush", 20), 20);
}

#[cfg(target_os = "linux")]
#[test]
fn new_over_shared_memory() {
    assert_fifo(&round_trip("shared_memory", "new", 20), 20);
}

#[test]
fn flush_delivers_before_write_returns() {
    for interface in ["local", "tcp_stream"] {
        let reg = Registries::with_defaults();
        let out: OutPort<u32> = OutPort::new("out", Arc::clone(&reg));
        let inp: InPort<u32> = InPort::new("in", reg);
        let negotiated = connect(out.base(), inp.base(), profile("sync", interface, "flush")).unwrap();

        for i in 0..5 {
            assert!(out.write(&i).is_ok(), "write {} over {}", i, interface);
            assert!(inp.is_new(), "record {} not buffered over {}", i, interface);
            assert_eq!(inp.read(), Ok(i));
        }
        disconnect(out.base(), inp.base(), &negotiated.connector_id).unwrap();
    }
}

#[test]
fn periodic_delivers_within_two_periods() {
    let period = Duration::from_millis(100);
    let reg = Registries::with_defaults();
    let out: OutPort<u32> = OutPort::new("out", Arc::clone(&reg));
    let inp: InPort<u32> = InPort::new("in", reg);
    let negotiated = connect(
        out.base(),
        inp.base(),
        profile("paced", "local", "periodic").with_property("dataport.publisher.push_rate", "10"),
    )
    .unwrap();

    for i in 0..3 {
        let written = Instant::now();
        assert!(out.write(&i).is_ok());
        assert!(wait_until(period * 2, || inp.is_new()), "record {} late", i);
        assert!(written.elapsed() <= period * 2, "record {} took {:?}", i, written.elapsed());
        assert_eq!(inp.read(), Ok(i));
    }
    disconnect(out.base(), inp.base(), &negotiated.connector_id).unwrap();
}

#[test]
fn pull_over_local_reads_latest_written() {
    let reg = Registries::with_defaults();
    let out: OutPort<String> = OutPort::new("out", Arc::clone(&reg));
    let inp: InPort<String> = InPort::new("in", reg);
    connect(
        out.base(),
        inp.base(),
        ConnectorProfile::new("pull").with_property("dataport.dataflow_type", "pull"),
    )
    .unwrap();

    assert_eq!(inp.read(), Err(DataPortStatus::BufferEmpty));
    out.write(&"a".to_string());
    out.write(&"b".to_string());
    assert_eq!(inp.read().unwrap(), "a");
    assert_eq!(inp.read().unwrap(), "b");
    // Nothing new: the last value is returned again.
    assert_eq!(inp.read().unwrap(), "b");
}

#[test]
fn timed_values_survive_big_endian_tcp() {
    let reg = Registries::with_defaults();
    let out: OutPort<TimedValue<Vec<f64>>> = OutPort::new("out", Arc::clone(&reg));
    let inp: InPort<TimedValue<Vec<f64>>> = InPort::new("in", reg);
    connect(
        out.base(),
        inp.base(),
        profile("be", "tcp_stream", "flush").with_property("dataport.serializer.cdr.endian", "big"),
    )
    .unwrap();

    let value = TimedValue {
        tm: Time { sec: 12, nsec: 34 },
        data: vec![1.0, -2.5, 3.25],
    };
    assert!(out.write(&value).is_ok());
    assert!(wait_until(Duration::from_secs(2), || inp.is_new()));
    assert_eq!(inp.read().unwrap(), value);
}

#[test]
fn one_outport_fans_out_to_two_inports() {
    let reg = Registries::with_defaults();
    let out: OutPort<i64> = OutPort::new("out", Arc::clone(&reg));
    let a: InPort<i64> = InPort::new("a", Arc::clone(&reg));
    let b: InPort<i64> = InPort::new("b", reg);
    connect(out.base(), a.base(), profile("to-a", "local", "flush")).unwrap();
    connect(out.base(), b.base(), profile("to-b", "tcp_stream", "flush")).unwrap();
    assert_eq!(out.base().connector_ids().len(), 2);

    assert!(out.write(&-9).is_ok());
    assert!(wait_until(Duration::from_secs(2), || a.is_new() && b.is_new()));
    assert_eq!(a.read().unwrap(), -9);
    assert_eq!(b.read().unwrap(), -9);
}
