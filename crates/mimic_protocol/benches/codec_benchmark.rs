//! # Codec Benchmark
//!
//! Decode cost per message shape at realistic batch sizes.
//!
//! Target: a full ray batch decodes well inside one 60 Hz frame.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mimic_protocol::{
    decode, encode_command, encode_debug_frame, encode_model_points, encode_rays, CommandKind,
    DebugFrame, DebugFrameInfo, Point3, Ray,
};

fn bench_decode_rays(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_rays");

    for count in [16usize, 256, 4096] {
        let rays: Vec<Ray> = (0..count)
            .map(|i| {
                let f = i as f32;
                Ray::new(Point3::new(f, 0.0, 1.0), Point3::new(0.0, f, -1.0))
            })
            .collect();
        let frame = encode_rays(&rays).unwrap();

        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("rays", count), &frame, |b, frame| {
            b.iter(|| decode(black_box(frame)).unwrap());
        });
    }

    group.finish();
}

fn bench_decode_model_points(c: &mut Criterion) {
    let points: Vec<Point3> = (0..64).map(|i| Point3::new(i as f32, 1.0, 2.0)).collect();
    let frame = encode_model_points(&points).unwrap();

    c.bench_function("decode_model_points_64", |b| {
        b.iter(|| decode(black_box(&frame)).unwrap());
    });
}

fn bench_decode_frame(c: &mut Criterion) {
    let info = DebugFrameInfo {
        width: 640,
        height: 480,
        bytes_per_pixel: 1,
    };
    let frame = DebugFrame::new(info, vec![128; 640 * 480]);
    let bytes = encode_debug_frame(1, &frame).unwrap();

    let mut group = c.benchmark_group("decode_frame");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("vga_gray", |b| {
        b.iter(|| decode(black_box(&bytes)).unwrap());
    });
    group.finish();
}

fn bench_encode_command(c: &mut Criterion) {
    c.bench_function("encode_threshold_command", |b| {
        b.iter(|| encode_command(black_box(CommandKind::BinarizationThreshold), &[42]).unwrap());
    });
}

criterion_group!(
    benches,
    bench_decode_rays,
    bench_decode_model_points,
    bench_decode_frame,
    bench_encode_command
);
criterion_main!(benches);
