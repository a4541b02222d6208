//! Benchmarks for the frame buffer handoff and JPEG encoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use picam_server::{FrameBuffer, RawFrame, Snapshotter};

fn bench_frame_publish(c: &mut Criterion) {
    let buffer = FrameBuffer::new();
    let frame = RawFrame::solid(640, 480, [20, 40, 200]);
    c.bench_function("frame_publish_640x480", |b| {
        b.iter(|| buffer.publish(black_box(frame.clone())))
    });
}

fn bench_latest_read(c: &mut Criterion) {
    let buffer = FrameBuffer::new();
    buffer.publish(RawFrame::solid(640, 480, [20, 40, 200]));
    c.bench_function("frame_latest_640x480", |b| {
        b.iter(|| black_box(buffer.latest()))
    });
}

fn bench_jpeg_encode(c: &mut Criterion) {
    let buffer = FrameBuffer::new();
    buffer.publish(RawFrame::solid(640, 480, [20, 40, 200]));
    let snapshotter = Snapshotter::new(buffer, 85);
    c.bench_function("jpeg_encode_640x480", |b| {
        b.iter(|| black_box(snapshotter.encode_jpeg().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_frame_publish,
    bench_latest_read,
    bench_jpeg_encode
);
criterion_main!(benches);
