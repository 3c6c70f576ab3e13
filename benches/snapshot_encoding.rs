//! Benchmarks for the per-exchange hot path
//!
//! Run with: cargo bench

use arduino_bridge::hardware::{read_snapshot, AnalogPattern, SimulatedBoard};
use arduino_bridge::protocol::{decode, encode, Reply, Request, StateReport};
use arduino_bridge::scripting::{BoardHandle, CodeExecutor};
use arduino_bridge::types::{PinMode, PinSnapshot};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn sample_reply() -> Reply {
    let snapshot = PinSnapshot::from_fn(
        |pin| (Some(PinMode::Output), Some(u16::from(pin % 2))),
        |pin| Some(u16::from(pin) * 127),
    );
    Reply::State(StateReport::executed("None", snapshot))
}

fn bench_reply_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("reply_encoding");
    group.throughput(Throughput::Elements(1));

    let reply = sample_reply();
    let bytes = encode(&reply).unwrap();

    group.bench_function("encode", |b| {
        b.iter(|| black_box(encode(black_box(&reply)).unwrap()));
    });

    group.bench_function("decode", |b| {
        b.iter(|| black_box(decode::<Reply>(black_box(&bytes)).unwrap()));
    });

    group.bench_function("result_value", |b| {
        b.iter(|| black_box(reply.result_value().unwrap()));
    });

    group.finish();
}

fn bench_request_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_decoding");

    let query = br#"{"arduino_code": ""}"#;
    let execute = br#"{"arduino_code": "board.digital_write(13, 1)"}"#;

    group.bench_function("query", |b| {
        b.iter(|| black_box(decode::<Request>(black_box(query)).unwrap()));
    });

    group.bench_function("execute", |b| {
        b.iter(|| black_box(decode::<Request>(black_box(execute)).unwrap()));
    });

    group.finish();
}

fn bench_snapshot_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_read");

    let mut board = SimulatedBoard::new().with_pattern(AnalogPattern::Counter { step: 3 });
    group.bench_function("simulated_board", |b| {
        b.iter(|| black_box(read_snapshot(&mut board)));
    });

    group.finish();
}

fn bench_code_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("code_execution");

    let executor = CodeExecutor::new();
    let board = BoardHandle::new(Box::new(SimulatedBoard::new()));

    group.bench_function("arithmetic", |b| {
        b.iter(|| black_box(executor.execute(black_box("2+2"), &board)));
    });

    group.bench_function("digital_write", |b| {
        b.iter(|| black_box(executor.execute(black_box("board.digital_write(13, 1)"), &board)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_reply_encoding,
    bench_request_decoding,
    bench_snapshot_read,
    bench_code_execution,
);
criterion_main!(benches);
