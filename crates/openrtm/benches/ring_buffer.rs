// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ring buffer write/read cost.
//!
//! - single-thread write+read pair, per record size
//! - overwrite on a full ring
//! - producer/consumer across two threads

#![allow(clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use openrtm::{BufferConfig, FullPolicy, Record, RingBuffer, Timeout};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn bench_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_write_read");
    for size in [8usize, 256, 4096] {
        let buf: RingBuffer<Record> = RingBuffer::with_capacity(8);
        let record = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &record, |b, record| {
            b.iter(|| {
                buf.write(record.clone(), Timeout::Default);
                black_box(buf.read(Timeout::Default))
            });
        });
    }
    group.finish();
}

fn bench_overwrite(c: &mut Criterion) {
    let buf: RingBuffer<u64> = RingBuffer::new(BufferConfig {
        length: 16,
        full_policy: FullPolicy::Overwrite,
        ..BufferConfig::default()
    });
    for i in 0..16 {
        buf.write(i, Timeout::Default);
    }
    c.bench_function("ring_overwrite_full", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            black_box(buf.write(i, Timeout::Default))
        });
    });
}

fn bench_two_threads(c: &mut Criterion) {
    c.bench_function("ring_spsc_1000", |b| {
        b.iter(|| {
            let buf = Arc::new(RingBuffer::<u64>::with_capacity(64));
            let reader = Arc::clone(&buf);
            let handle = thread::spawn(move || {
                let mut sum = 0u64;
                for _ in 0..1000 {
                    if let Ok(v) = reader.read(Timeout::After(Duration::from_secs(1))) {
                        sum += v;
                    }
                }
                sum
            });
            for i in 0..1000 {
                buf.write(i, Timeout::After(Duration::from_secs(1)));
            }
            black_box(handle.join())
        });
    });
}

criterion_group!(benches, bench_write_read, bench_overwrite, bench_two_threads);
criterion_main!(benches);
