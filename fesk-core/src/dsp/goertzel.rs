//! Per-window tone-energy measurement via the Goertzel algorithm.
//!
//! Two dispatch modes share the same inner recurrence: `Binned` rounds the
//! target frequency to the nearest FFT-equivalent bin before computing the
//! recurrence coefficient; `Parametric` uses the frequency directly. Both
//! are O(N) per window, unlike a full FFT.

use crate::config::{GoertzelConfig, GoertzelMode, WindowKind};

/// Applies the configured raised-cosine window in place.
pub fn apply_window(samples: &mut [f32], kind: WindowKind) {
    let n = samples.len();
    if n < 2 {
        return;
    }
    let denom = (n - 1) as f64;
    for (i, sample) in samples.iter_mut().enumerate() {
        let phase = 2.0 * std::f64::consts::PI * i as f64 / denom;
        let w = match kind {
            WindowKind::Hamming => 0.54 - 0.46 * phase.cos(),
            WindowKind::Hann => 0.5 * (1.0 - phase.cos()),
        };
        *sample *= w as f32;
    }
}

/// Magnitude returned by a single Goertzel evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoertzelResult {
    pub frequency_hz: f64,
    pub magnitude: f32,
}

/// Computes the Goertzel magnitude of `samples` at `frequency_hz`, given a
/// sample rate `sample_rate_hz`. `samples` is windowed in place first
/// according to `config.window`; the recurrence itself dispatches on
/// `config.mode`.
pub fn goertzel_magnitude(
    samples: &[f32],
    frequency_hz: f64,
    sample_rate_hz: u32,
    config: GoertzelConfig,
) -> GoertzelResult {
    let n = samples.len();
    let mut windowed = samples.to_vec();
    apply_window(&mut windowed, config.window);

    let bin = n as f64 * frequency_hz / sample_rate_hz as f64;
    let k = match config.mode {
        GoertzelMode::Binned => bin.round(),
        GoertzelMode::Parametric => bin,
    };
    let omega = 2.0 * std::f64::consts::PI * k / n as f64;
    let coeff = 2.0 * omega.cos();

    let mut q1 = 0.0_f64;
    let mut q2 = 0.0_f64;
    for &sample in &windowed {
        let q0 = coeff * q1 - q2 + sample as f64;
        q2 = q1;
        q1 = q0;
    }

    let real = q1 - q2 * omega.cos();
    let imag = q2 * omega.sin();
    let raw = (real * real + imag * imag).sqrt();
    let normalized = raw / (n as f64).sqrt();

    GoertzelResult {
        frequency_hz,
        magnitude: normalized as f32,
    }
}

/// Computes the Goertzel magnitude for each of the three configured tones
/// over the same window.
pub fn goertzel_bank(
    samples: &[f32],
    tone_frequencies_hz: [f64; 3],
    sample_rate_hz: u32,
    config: GoertzelConfig,
) -> [GoertzelResult; 3] {
    [
        goertzel_magnitude(samples, tone_frequencies_hz[0], sample_rate_hz, config),
        goertzel_magnitude(samples, tone_frequencies_hz[1], sample_rate_hz, config),
        goertzel_magnitude(samples, tone_frequencies_hz[2], sample_rate_hz, config),
    ]
}
