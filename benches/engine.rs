//! Throughput Benchmarks for EmberKV
//!
//! Measures the hot paths in isolation: frame parsing, keyspace
//! reads/writes, and the ordered index.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use emberkv::buffer::ByteBuffer;
use emberkv::protocol::parse_frame;
use emberkv::storage::{Keyspace, SkipList};

/// Benchmark parsing one pipelined SET frame
fn bench_parse(c: &mut Criterion) {
    let frame = b"*3\r\n$3\r\nSET\r\n$8\r\nuser:001\r\n$11\r\nhello world\r\n";

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(frame.len() as u64));

    group.bench_function("set_frame", |b| {
        let mut buf = ByteBuffer::new();
        b.iter(|| {
            buf.append(frame);
            black_box(parse_frame(&mut buf));
        });
    });

    group.finish();
}

/// Benchmark keyspace SET and GET
fn bench_keyspace(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyspace");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set", |b| {
        let mut ks = Keyspace::new();
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{i}"));
            ks.set_string(key, Bytes::from_static(b"value"));
            i += 1;
        });
    });

    group.bench_function("get_hit", |b| {
        let mut ks = Keyspace::new();
        for i in 0..100_000u64 {
            ks.set_string(Bytes::from(format!("key:{i}")), Bytes::from_static(b"value"));
        }
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(ks.get(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark skip-list insertion
fn bench_skiplist(c: &mut Criterion) {
    let mut group = c.benchmark_group("skiplist");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert", |b| {
        let mut list = SkipList::new();
        let mut i = 0u64;
        b.iter(|| {
            list.insert(Bytes::from(format!("member:{i}")), (i % 1000) as f64);
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_keyspace, bench_skiplist);
criterion_main!(benches);
