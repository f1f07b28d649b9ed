//! Criterion benchmarks for the stream framer.
//!
//! Measures how long it takes to recover messages from a stream under the
//! chunkings TCP actually produces: one large read, many small reads, and
//! the single-byte worst case.
//!
//! Run with:
//! ```bash
//! cargo bench --package topology-core --bench framer_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use topology_core::protocol::{encode_message, Framer, Message, Topology, WireFraming};

// ── Stream fixtures ───────────────────────────────────────────────────────────

fn make_reply(i: usize) -> Message {
    Message::neighbors_reply(
        format!("node-{i}"),
        "node-0",
        format!("msg-{i}"),
        (0..8).map(|n| format!("node-{}", i * 8 + n)).collect(),
    )
}

fn make_report(nodes: usize) -> Message {
    let topology: Topology = (0..nodes)
        .map(|i| {
            (
                format!("node-{i}"),
                vec![format!("node-{}", (i + 1) % nodes)],
            )
        })
        .collect();
    Message::topology_report("node-0", "report", topology)
}

/// `count` query replies written back to back.
fn make_reply_stream(count: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    for i in 0..count {
        stream.extend(
            encode_message(&make_reply(i), WireFraming::Concatenated).expect("encode must succeed"),
        );
    }
    stream
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Extract 1 000 replies delivered with different chunk sizes.
fn bench_chunked_stream(c: &mut Criterion) {
    let stream = make_reply_stream(1_000);

    let mut group = c.benchmark_group("framer_chunked_stream");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    for chunk_size in [1usize, 64, 1_460, stream.len()] {
        group.bench_with_input(
            BenchmarkId::new("chunk", chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut framer = Framer::new();
                    let mut total = 0;
                    for chunk in stream.chunks(chunk_size) {
                        total += framer.push(black_box(chunk)).expect("valid stream").len();
                    }
                    assert_eq!(total, 1_000);
                })
            },
        );
    }
    group.finish();
}

/// One large nested report split into MTU-sized reads.
fn bench_large_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("framer_large_report");
    for nodes in [100usize, 10_000] {
        let bytes = encode_message(&make_report(nodes), WireFraming::Concatenated)
            .expect("encode must succeed");
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("nodes", nodes), &bytes, |b, bytes| {
            b.iter(|| {
                let mut framer = Framer::new();
                let mut total = 0;
                for chunk in bytes.chunks(1_460) {
                    total += framer.push(black_box(chunk)).expect("valid stream").len();
                }
                assert_eq!(total, 1);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chunked_stream, bench_large_report);
criterion_main!(benches);
