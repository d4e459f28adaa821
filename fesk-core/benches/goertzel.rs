use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fesk_core::config::GoertzelConfig;
use fesk_core::dsp::goertzel::{goertzel_bank, goertzel_magnitude};
use std::f64::consts::PI;

fn tone(freq_hz: f64, sample_rate_hz: u32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (2.0 * PI * freq_hz * i as f64 / sample_rate_hz as f64).sin() as f32)
        .collect()
}

fn benchmark_single_tone(c: &mut Criterion) {
    let sample_rate = 44_100;
    let config = GoertzelConfig::default();
    let mut group = c.benchmark_group("goertzel_magnitude");

    for window_ms in [27.5_f64, 50.0, 100.0] {
        let n = (sample_rate as f64 * window_ms / 1000.0) as usize;
        let samples = tone(3000.0, sample_rate, n);
        group.bench_with_input(BenchmarkId::from_parameter(window_ms), &samples, |b, samples| {
            b.iter(|| goertzel_magnitude(black_box(samples), 3000.0, sample_rate, config))
        });
    }
    group.finish();
}

fn benchmark_three_tone_bank(c: &mut Criterion) {
    let sample_rate = 44_100;
    let config = GoertzelConfig::default();
    let n = (sample_rate as f64 * 0.0275) as usize;
    let samples = tone(3000.0, sample_rate, n);

    c.bench_function("goertzel_bank_three_tones", |b| {
        b.iter(|| goertzel_bank(black_box(&samples), [2400.0, 3000.0, 3600.0], sample_rate, config))
    });
}

criterion_group!(benches, benchmark_single_tone, benchmark_three_tone_bank);
criterion_main!(benches);
