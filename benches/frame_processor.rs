//! # Frame Processor Benchmarks
//!
//! Measures one full detection pass (upload, grayscale, blur, edges,
//! circles) on synthetic coin scenes at a few capture resolutions.

use coin_counter::capture::{CaptureConfig, MediaSource, SyntheticCamera};
use coin_counter::processing::FrameProcessor;
use coin_counter::runtime::{bring_up, SoftwareRuntime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_process_once(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_once");
    let processor = FrameProcessor::default();

    for (width, height) in [(320, 240), (640, 480), (1280, 720)] {
        let mut camera = SyntheticCamera::yen_scene(7, 4.0);
        let mut stream = camera
            .request_stream(&CaptureConfig::with_dimensions(width, height))
            .expect("synthetic stream");
        let frame = stream.read_frame().expect("synthetic frame");

        let mut runtime = SoftwareRuntime::new();
        bring_up(&mut runtime).expect("runtime bring-up");

        group.throughput(Throughput::Elements(u64::from(width * height)));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &frame,
            |b, frame| {
                b.iter(|| {
                    let result = processor.process_once(&mut runtime, black_box(frame));
                    black_box(result)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_process_once);
criterion_main!(benches);
