//! Criterion benchmarks for the slsd-core codec.
//!
//! Measures encode/decode latency for the request and reply shapes the
//! responder actually handles, so regressions in the hot dispatch path show
//! up before they reach a release.
//!
//! Run with:
//! ```bash
//! cargo bench --package slsd-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slsd_core::{decode_message, encode_message, OscArg, OscMessage};

// ── Message fixtures ──────────────────────────────────────────────────────────

fn make_request() -> OscMessage {
    OscMessage::new(
        "/sessions",
        vec![
            OscArg::Int(1),
            OscArg::Int(9000),
            OscArg::Str("127.0.0.1".into()),
        ],
    )
}

fn make_reply(files: usize) -> OscMessage {
    OscMessage::new(
        "/sessions",
        (0..files)
            .map(|i| OscArg::Str(format!("session-{i:03}.slsess")))
            .collect(),
    )
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("request", |b| {
        let msg = make_request();
        b.iter(|| encode_message(black_box(&msg)).unwrap());
    });

    for files in [0usize, 8, 64] {
        let msg = make_reply(files);
        group.bench_with_input(BenchmarkId::new("reply", files), &msg, |b, msg| {
            b.iter(|| encode_message(black_box(msg)).unwrap());
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    group.bench_function("request", |b| {
        let bytes = encode_message(&make_request()).unwrap();
        b.iter(|| decode_message(black_box(&bytes)).unwrap());
    });

    for files in [0usize, 8, 64] {
        let bytes = encode_message(&make_reply(files)).unwrap();
        group.bench_with_input(BenchmarkId::new("reply", files), &bytes, |b, bytes| {
            b.iter(|| decode_message(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
