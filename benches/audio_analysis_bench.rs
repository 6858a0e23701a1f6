//! Performance benchmarks for tempo analysis

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempo_grid::features::beat_tracking::TempoTap;
use tempo_grid::features::onset::{compute_odf, compute_odfs, OnsetMethod};
use tempo_grid::{analyze_tempo, AnalysisConfig};

/// 30 seconds of 1 kHz clicks at 120 BPM over a quiet tone
fn click_track() -> Vec<f32> {
    let sr = 44100.0f32;
    let period = (0.5 * sr) as usize;
    (0..44100 * 30)
        .map(|i| {
            let t = (i % period) as f32 / sr;
            let click = (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * (-t * 60.0).exp();
            let tone = (i as f32 * 220.0 * 2.0 * std::f32::consts::PI / sr).sin() * 0.05;
            click * 0.8 + tone
        })
        .collect()
}

fn bench_onset_detection(c: &mut Criterion) {
    let samples = click_track();
    let methods = [OnsetMethod::SuperFlux, OnsetMethod::Infogain, OnsetMethod::BeatEmphasis];

    c.bench_function("compute_odfs_fine_30s", |b| {
        b.iter(|| {
            let _ = compute_odfs(black_box(&samples), black_box(&methods), 2048, 512);
        });
    });
}

fn bench_tempo_tap(c: &mut Criterion) {
    let samples = click_track();
    let odf = compute_odf(&samples, OnsetMethod::ComplexDomain, 2048, 512).unwrap_or_default();
    let tap = TempoTap::default();

    c.bench_function("tempo_tap_30s", |b| {
        b.iter(|| {
            let _ = tap.compute(black_box(&odf));
        });
    });
}

fn bench_analyze_tempo(c: &mut Criterion) {
    let samples = click_track();
    let config = AnalysisConfig::default();

    let mut group = c.benchmark_group("analyze_tempo");
    group.sample_size(10);
    group.bench_function("multi_feature_30s", |b| {
        b.iter(|| {
            let _ = analyze_tempo(black_box(&samples), black_box(44100), black_box(&config), &|_, _| {});
        });
    });
    group.finish();
}

criterion_group!(benches, bench_onset_detection, bench_tempo_tap, bench_analyze_tempo);
criterion_main!(benches);
