//! Benchmarks for transcoder output scraping
//!
//! ffmpeg prints a status line several times a second per stage, so the
//! per-line cost bounds how much output a single job can push through.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vidladder_progress::markers::{is_error_line, parse_elapsed_secs, parse_speed};
use vidladder_progress::{ConversionProgress, OutputStream};

const STATUS_LINE: &str =
    "frame= 2400 fps= 57 q=28.0 size=    6144kB time=00:01:40.04 bitrate= 503.1kbits/s speed=2.38x";
const BANNER_LINE: &str = "  Stream #0:0(und): Video: h264 (High) (avc1 / 0x31637661), yuv420p, 1920x1080";
const CONCEALMENT_LINE: &str =
    "[h264 @ 0x7fa] concealing 320 DC, 320 AC, 320 MV errors in P frame; error concealment";

fn bench_markers(c: &mut Criterion) {
    let mut group = c.benchmark_group("markers");

    for (name, line) in [
        ("status", STATUS_LINE),
        ("banner", BANNER_LINE),
        ("concealment", CONCEALMENT_LINE),
    ] {
        group.throughput(Throughput::Bytes(line.len() as u64));
        group.bench_with_input(BenchmarkId::new("elapsed", name), line, |b, line| {
            b.iter(|| parse_elapsed_secs(black_box(line)));
        });
        group.bench_with_input(BenchmarkId::new("speed", name), line, |b, line| {
            b.iter(|| parse_speed(black_box(line)));
        });
        group.bench_with_input(BenchmarkId::new("error", name), line, |b, line| {
            b.iter(|| is_error_line(black_box(line)));
        });
    }

    group.finish();
}

fn bench_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker");

    let lines: Vec<String> = (0..600)
        .map(|i| {
            format!(
                "frame={} fps=60 time=00:{:02}:{:02}.00 bitrate=500.0kbits/s speed=2.0x",
                i * 25,
                i / 60,
                i % 60
            )
        })
        .collect();

    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("observe_stage", |b| {
        b.iter(|| {
            let mut tracker = ConversionProgress::new(600.0);
            for line in &lines {
                black_box(tracker.observe_line(OutputStream::Stderr, line));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_markers, bench_tracker);
criterion_main!(benches);
