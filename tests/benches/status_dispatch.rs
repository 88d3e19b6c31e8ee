//! # Status Dispatch Benchmarks
//!
//! Throughput of the status path the pump runs for every engine write:
//! reassembling lines from raw chunks, then routing each event through a
//! decrypt + verify handler chain.
//!
//! ## Usage
//!
//! ```bash
//! cargo bench -p eb-tests --bench status_dispatch
//! cargo bench -p eb-tests --bench status_dispatch -- status/parse
//! ```
//!
//! ## Conditions
//!
//! - Many-signature messages (up to 1,000 GOODSIG lines)
//! - Engine writes split at random offsets, including mid-keyword
//! - Noise lines the parser must reject without stalling

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use engine_io::{parse_line, DecryptHandler, StatusLineParser, VerifyHandler};
use rand::Rng;
use shared_bus::HandlerChain;
use std::time::Duration;

/// Status stream of a decrypt-verify run with `signatures` good signatures.
fn status_stream(signatures: usize) -> Vec<u8> {
    let mut out = String::from("[GNUPG:] BEGIN_DECRYPTION\n");
    for n in 0..signatures {
        out.push_str("[GNUPG:] NEWSIG\n");
        out.push_str(&format!("[GNUPG:] GOODSIG {n:016X} Signer {n} <s{n}@example.org>\n"));
        out.push_str(&format!(
            "[GNUPG:] VALIDSIG {n:040X} 2024-01-01 1704067200 0 4 0 1 8 00 {n:040X}\n"
        ));
        out.push_str("[GNUPG:] TRUST_FULLY 0 pgp\n");
        if n % 16 == 0 {
            out.push_str("gpg: not a status line\n");
        }
    }
    out.push_str("[GNUPG:] DECRYPTION_OKAY\n[GNUPG:] END_DECRYPTION\n[GNUPG:] END_STREAM\n");
    out.into_bytes()
}

/// Split `bytes` into chunks of random length, the way pipe reads arrive.
fn random_chunks(bytes: &[u8], max_chunk: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let mut chunks = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let len = rng.gen_range(1..=max_chunk).min(bytes.len() - pos);
        chunks.push(bytes[pos..pos + len].to_vec());
        pos += len;
    }
    chunks
}

fn chain() -> HandlerChain {
    let mut chain = HandlerChain::new();
    chain
        .register(Box::new(DecryptHandler::new()))
        .expect("decrypt handler");
    chain
        .register(Box::new(VerifyHandler::new()))
        .expect("verify handler");
    chain
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("status/parse");

    group.bench_function("single_line", |b| {
        b.iter(|| {
            black_box(parse_line(black_box(
                "[GNUPG:] GOODSIG 0123456789ABCDEF Alice <alice@example.org>",
            )))
        })
    });

    for signatures in [1usize, 100, 1_000] {
        let stream = status_stream(signatures);
        let chunks = random_chunks(&stream, 512);
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("split_chunks", signatures),
            &chunks,
            |b, chunks| {
                b.iter(|| {
                    let mut parser = StatusLineParser::new();
                    let mut events = 0usize;
                    for chunk in chunks {
                        events += parser.feed(chunk).map(|e| e.len()).unwrap_or(0);
                    }
                    black_box(events)
                })
            },
        );
    }
    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("status/dispatch");

    for signatures in [1usize, 100, 1_000] {
        let stream = status_stream(signatures);
        let events = StatusLineParser::new()
            .feed(&stream)
            .expect("stream parses");
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("decrypt_verify_chain", signatures),
            &events,
            |b, events| {
                b.iter(|| {
                    let mut chain = chain();
                    for event in events {
                        black_box(chain.dispatch(event));
                    }
                    black_box(chain.finish())
                })
            },
        );
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("status/pipeline");

    let stream = status_stream(250);
    let chunks = random_chunks(&stream, 64);
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("parse_and_dispatch", |b| {
        b.iter(|| {
            let mut parser = StatusLineParser::new();
            let mut chain = chain();
            for chunk in &chunks {
                if let Ok(events) = parser.feed(chunk) {
                    for event in &events {
                        black_box(chain.dispatch(event));
                    }
                }
            }
            black_box(chain.finish())
        })
    });
    group.finish();
}

criterion_group!(
    name = status_benches;
    config = Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(5));
    targets = bench_parse, bench_dispatch, bench_pipeline
);

criterion_main!(status_benches);
