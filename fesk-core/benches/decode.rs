use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fesk_core::config::{FrameConfig, WireConstants};
use fesk_core::decoder::Decoder;
use fesk_core::dsp::AudioBuffer;
use std::f64::consts::PI;

fn synth_trits(trits: &[u8], frame: &FrameConfig) -> Vec<f32> {
    let n_per_symbol = (frame.sample_rate_hz as f64 * frame.symbol_duration_s) as usize;
    let mut out = Vec::with_capacity(trits.len() * n_per_symbol);
    for &trit in trits {
        let freq = frame.tone_frequencies_hz[trit as usize];
        for i in 0..n_per_symbol {
            out.push((2.0 * PI * freq * i as f64 / frame.sample_rate_hz as f64).sin() as f32);
        }
    }
    out
}

fn full_transmission_samples(frame: &FrameConfig) -> Vec<f32> {
    let mut trits = WireConstants::PREAMBLE_TRITS.to_vec();
    trits.extend(WireConstants::BARKER13_TRITS.to_vec());
    trits.extend(vec![
        1, 0, 1, 1, 0, 0, 1, 0, 1, 2, 2, 1, 0, 2, 0, 1, 1, 0, 1, 1, 1, 1, 1, 2, 2, 1, 0, 2, 2, 1,
        0, 1, 0, 2, 1, 2, 0, 2, 2, 1, 0,
    ]);
    synth_trits(&trits, frame)
}

fn benchmark_full_acquisition(c: &mut Criterion) {
    let frame = FrameConfig::default();
    let samples = full_transmission_samples(&frame);

    c.bench_function("decode_full_acquisition", |b| {
        b.iter(|| {
            let buffer = AudioBuffer::new(samples.clone(), frame.sample_rate_hz, 0.0);
            let mut decoder = Decoder::new_with_defaults();
            black_box(decoder.process_stream(&buffer, 100.0))
        })
    });
}

fn benchmark_transmission_start_scan(c: &mut Criterion) {
    let frame = FrameConfig::default();
    let mut samples = vec![0.0_f32; frame.sample_rate_hz as usize / 2];
    samples.extend(full_transmission_samples(&frame));

    c.bench_function("find_transmission_start_scan", |b| {
        b.iter(|| black_box(Decoder::find_transmission_start(&samples, frame.sample_rate_hz, 0.01)))
    });
}

criterion_group!(benches, benchmark_full_acquisition, benchmark_transmission_start_scan);
criterion_main!(benches);
