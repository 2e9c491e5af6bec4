//! Горячий путь водопада: нормализация и децимация кадра, БПФ, АРУ и
//! отрисовка строки.
//!
//! Запуск: cargo bench -p iqfall-benchmark

use std::{f32::consts::TAU, hint::black_box};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use iqfall_core::encode_samples;
use iqfall_dsp::{
    GainState, SpectralAnalyzer, WaterfallBuffer, WaterfallPipeline, DISPLAY_SAMPLE_RATE,
    FFT_SIZE, ZOOM_MAX_HZ,
};
use iqfall_types::{ByteOrderKind, IqSample, SampleFormat};

const FRAME_PAIRS: usize = 16_384;

fn tone(
    freq: f32,
    rate: f32,
    n: usize,
) -> Vec<f32> {
    (0..n)
        .flat_map(|k| {
            let ph = TAU * freq * k as f32 / rate;
            [0.5 * ph.cos(), 0.5 * ph.sin()]
        })
        .collect()
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_frame");
    group.throughput(Throughput::Elements(FRAME_PAIRS as u64));

    let values = tone(1_000.0, 2_000_000.0, FRAME_PAIRS);

    for format in [SampleFormat::Int16, SampleFormat::Float32, SampleFormat::UInt8] {
        let mut payload = Vec::new();
        encode_samples(format, ByteOrderKind::Little, &values, &mut payload);

        let mut pipeline = WaterfallPipeline::new(800, 600).unwrap();
        pipeline.configure_stream(2_000_000);

        group.bench_with_input(BenchmarkId::from_parameter(format), &payload, |b, payload| {
            b.iter(|| {
                pipeline.ingest(format, ByteOrderKind::Little, black_box(payload));
                pipeline.process_if_ready()
            })
        });
    }

    group.finish();
}

fn bench_analyze(c: &mut Criterion) {
    let values = tone(1_000.0, DISPLAY_SAMPLE_RATE as f32, FFT_SIZE);
    let samples: Vec<IqSample> = values
        .chunks_exact(2)
        .map(|p| IqSample::new(p[0], p[1]))
        .collect();

    let mut analyzer =
        SpectralAnalyzer::new(FFT_SIZE, DISPLAY_SAMPLE_RATE as f32, ZOOM_MAX_HZ).unwrap();
    let mut columns = vec![0.0f32; 800];

    c.bench_function("analyze_and_map_800", |b| {
        b.iter(|| {
            analyzer.analyze(black_box(&samples));
            analyzer.map_columns(&mut columns);
            columns[400]
        })
    });
}

fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("scroll_and_draw");

    for (w, h) in [(800, 600), (1920, 1080)] {
        let mut waterfall = WaterfallBuffer::new(w, h).unwrap();
        let magnitudes: Vec<f32> = (0..w).map(|x| (x % 97) as f32 * 1e-3).collect();
        let gain = GainState::new();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{w}x{h}")),
            &magnitudes,
            |b, m| b.iter(|| waterfall.scroll_and_draw(black_box(m), &gain, 0.0)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_analyze, bench_composite);
criterion_main!(benches);
