//! Slides a windowed Goertzel bank across audio and emits symbol
//! candidates.

use crate::config::{DetectorConfig, FrameConfig, GoertzelConfig};
use crate::dsp::goertzel::goertzel_bank;

/// A contiguous mono Float32 PCM buffer, the receiver's sole audio input
/// type: all downmixing/normalization happens upstream, in the WAV
/// collaborator.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
    pub start_time_ms: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32, start_time_ms: f64) -> Self {
        Self {
            samples,
            sample_rate_hz,
            start_time_ms,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        1000.0 * self.samples.len() as f64 / self.sample_rate_hz as f64
    }
}

/// One candidate symbol decision: the winning tone index (0, 1, 2), its
/// confidence, and the timestamp of the window center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolCandidate {
    pub trit: u8,
    pub confidence: f32,
    pub magnitude: f32,
    pub timestamp_ms: f64,
}

pub struct ToneDetector {
    frame: FrameConfig,
    goertzel: GoertzelConfig,
    detector: DetectorConfig,
}

impl ToneDetector {
    pub fn new(frame: FrameConfig, goertzel: GoertzelConfig, detector: DetectorConfig) -> Self {
        Self {
            frame,
            goertzel,
            detector,
        }
    }

    fn window_len_samples(&self, sample_rate_hz: u32) -> usize {
        let len = (self.detector.window_ms / 1000.0 * sample_rate_hz as f64).round() as usize;
        len.max(2)
    }

    /// Evaluates the three-tone Goertzel bank on one window and returns a
    /// candidate iff confidence and magnitude both clear their thresholds.
    fn evaluate_window(&self, window: &[f32], sample_rate_hz: u32, timestamp_ms: f64) -> Option<SymbolCandidate> {
        let results = goertzel_bank(
            window,
            self.frame.tone_frequencies_hz,
            sample_rate_hz,
            self.goertzel,
        );
        let total: f32 = results.iter().map(|r| r.magnitude).sum();
        if total <= 0.0 {
            return None;
        }
        let (trit, best) = results
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.magnitude.partial_cmp(&b.1.magnitude).unwrap())
            .unwrap();
        let confidence = best.magnitude / total;

        if confidence > self.detector.confidence_threshold && best.magnitude > self.detector.magnitude_threshold {
            Some(SymbolCandidate {
                trit: trit as u8,
                confidence,
                magnitude: best.magnitude,
                timestamp_ms,
            })
        } else {
            None
        }
    }

    /// Streaming detection: slides a ≈25-30ms window at hop = window/8
    /// across the whole buffer.
    pub fn detect_stream(&self, buffer: &AudioBuffer) -> Vec<SymbolCandidate> {
        let window_len = self.window_len_samples(buffer.sample_rate_hz);
        let hop = (window_len / self.detector.hop_divisor).max(1);

        let mut candidates = Vec::new();
        let mut start = 0usize;
        while start + window_len <= buffer.samples.len() {
            let window = &buffer.samples[start..start + window_len];
            let center_ms = buffer.start_time_ms
                + 1000.0 * (start as f64 + window_len as f64 / 2.0) / buffer.sample_rate_hz as f64;
            if let Some(candidate) = self.evaluate_window(window, buffer.sample_rate_hz, center_ms) {
                candidates.push(candidate);
            }
            start += hop;
        }
        candidates
    }

    /// Symbol extraction mode: emits exactly one symbol per `period_ms`,
    /// centered on each expected symbol midpoint starting at `start_ms`.
    pub fn detect_at_symbol_period(
        &self,
        buffer: &AudioBuffer,
        start_ms: f64,
        period_ms: f64,
        count: usize,
    ) -> Vec<SymbolCandidate> {
        let window_len = self.window_len_samples(buffer.sample_rate_hz);
        let mut out = Vec::with_capacity(count);

        for i in 0..count {
            let symbol_center_ms = start_ms + period_ms * (i as f64 + 0.5);
            let center_sample = ((symbol_center_ms - buffer.start_time_ms) / 1000.0
                * buffer.sample_rate_hz as f64) as isize;
            let half = (window_len / 2) as isize;
            let lo = center_sample - half;
            let hi = lo + window_len as isize;
            if lo < 0 || hi as usize > buffer.samples.len() {
                continue;
            }
            let window = &buffer.samples[lo as usize..hi as usize];
            if let Some(candidate) = self.evaluate_window(window, buffer.sample_rate_hz, symbol_center_ms) {
                out.push(candidate);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn synth_tone(freq_hz: f64, sample_rate: u32, duration_ms: f64) -> Vec<f32> {
        let n = (sample_rate as f64 * duration_ms / 1000.0) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / sample_rate as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn detects_correct_trit_for_each_tone() {
        let frame = FrameConfig::default();
        let detector = ToneDetector::new(frame.clone(), Default::default(), Default::default());

        for (expected_trit, freq) in frame.tone_frequencies_hz.iter().enumerate() {
            let samples = synth_tone(*freq, frame.sample_rate_hz, 100.0);
            let buffer = AudioBuffer::new(samples, frame.sample_rate_hz, 0.0);
            let candidates = detector.detect_stream(&buffer);
            assert!(!candidates.is_empty());
            assert!(candidates.iter().all(|c| c.trit == expected_trit as u8));
        }
    }

    #[test]
    fn silence_yields_no_candidates() {
        let frame = FrameConfig::default();
        let detector = ToneDetector::new(frame.clone(), Default::default(), Default::default());
        let buffer = AudioBuffer::new(vec![0.0; frame.sample_rate_hz as usize / 10], frame.sample_rate_hz, 0.0);
        assert!(detector.detect_stream(&buffer).is_empty());
    }

    #[test]
    fn symbol_extraction_mode_emits_one_per_period() {
        let frame = FrameConfig::default();
        let detector = ToneDetector::new(frame.clone(), Default::default(), Default::default());
        let period_ms = frame.symbol_duration_s * 1000.0;

        let mut samples = Vec::new();
        for trit in [2u8, 0, 2] {
            let freq = frame.tone_frequencies_hz[trit as usize];
            samples.extend(synth_tone(freq, frame.sample_rate_hz, period_ms));
        }
        let buffer = AudioBuffer::new(samples, frame.sample_rate_hz, 0.0);

        let out = detector.detect_at_symbol_period(&buffer, 0.0, period_ms, 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].trit, 2);
        assert_eq!(out[1].trit, 0);
        assert_eq!(out[2].trit, 2);
    }
}
