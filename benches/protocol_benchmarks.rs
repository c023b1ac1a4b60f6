//! Performance benchmarks for the Edge TTS protocol pieces
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use edge_tts_gateway::core::captions::CaptionBuilder;
use edge_tts_gateway::core::edge::messages::{decode_audio_frame, mkssml, parse_metadata};
use edge_tts_gateway::core::edge::signer::auth_token_at;
use edge_tts_gateway::core::edge::{SynthesisConfig, WordBoundary, segment};
use std::time::Duration;

/// Benchmark segmentation of long inputs
fn bench_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");
    group.measurement_time(Duration::from_secs(5));

    let prose = "Hello, this is a test sentence for speech synthesis. ".repeat(500);
    let escaped = "Tom & Jerry <3 \"quotes\" ".repeat(1000);
    let unicode = "Grüße aus Köln, 東京からこんにちは。 ".repeat(400);

    for (name, text) in [("prose", &prose), ("escaped", &escaped), ("unicode", &unicode)] {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, text.len()), text, |b, text| {
            b.iter(|| segment(black_box(text), 4096));
        });
    }

    group.finish();
}

/// Benchmark SSML building and frame decoding
fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("frames");

    let config = SynthesisConfig::default();
    let segments = segment(&"word ".repeat(800), 4096).unwrap_or_default();
    if let Some(first) = segments.first() {
        group.bench_function("mkssml", |b| {
            b.iter(|| mkssml(black_box(&config), black_box(first)));
        });
    }

    let headers = "X-RequestId:1\r\nContent-Type:audio/mpeg\r\nPath:audio\r\n";
    let mut frame = (headers.len() as u16).to_be_bytes().to_vec();
    frame.extend_from_slice(headers.as_bytes());
    frame.extend_from_slice(&[0u8; 4096]);
    let frame = Bytes::from(frame);
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("decode_audio_frame", |b| {
        b.iter(|| decode_audio_frame(black_box(&frame)));
    });

    let metadata = r#"{"Metadata":[{"Type":"WordBoundary","Data":{"Offset":1000000,"Duration":3000000,"text":{"Text":"Hello","Length":5,"BoundaryType":"WordBoundary"}}}]}"#;
    group.bench_function("parse_metadata", |b| {
        b.iter(|| parse_metadata(black_box(metadata), 50_000_000));
    });

    group.finish();
}

/// Benchmark subtitle rendering
fn bench_captions(c: &mut Criterion) {
    let mut group = c.benchmark_group("captions");

    let boundaries: Vec<WordBoundary> = (0..2000u64)
        .map(|i| WordBoundary {
            offset: i * 3_000_000,
            duration: 2_500_000,
            text: format!("word{i}"),
        })
        .collect();

    for words in [1usize, 5, 10] {
        group.bench_with_input(BenchmarkId::new("merge_and_render", words), &words, |b, &words| {
            b.iter(|| {
                let mut builder = CaptionBuilder::new();
                for boundary in &boundaries {
                    builder.feed_boundary(boundary);
                }
                let _ = builder.merge_cues(words);
                builder.render()
            });
        });
    }

    group.finish();
}

/// Benchmark Sec-MS-GEC token generation
fn bench_signing(c: &mut Criterion) {
    c.bench_function("auth_token_at", |b| {
        b.iter(|| auth_token_at(black_box(1_700_000_123.0)));
    });
}

criterion_group!(
    benches,
    bench_segmentation,
    bench_frames,
    bench_captions,
    bench_signing
);

criterion_main!(benches);
