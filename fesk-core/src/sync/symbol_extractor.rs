//! Fallback symbol extractor: a dense grid search over timing, tone
//! triplet, and symbol-index permutation, used when the streaming detector
//! cannot lock. Batch-oriented, not part of the realtime path.

use crate::config::{AdaptiveTimingConfig, DetectorConfig, FrameConfig, GoertzelConfig, WireConstants};
use crate::dsp::goertzel::goertzel_bank;
use crate::dsp::tone_detector::AudioBuffer;

const MAX_SYMBOLS: usize = 90;
const REFINE_STEPS: i64 = 4;

/// All six permutations of {0, 1, 2}, used to remap detector bin index to
/// transmitted trit value since the grid search cannot assume the mapping.
const PERMUTATIONS: [[u8; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

#[derive(Debug, Clone, Copy, PartialEq)]
struct RawSymbol {
    trit: u8,
    confidence: f32,
    center_ms: f64,
}

/// Winning grid-search candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCandidate {
    pub tone_triplet_hz: [f64; 3],
    pub period_ms: f64,
    pub start_ms: f64,
    pub mapping: [u8; 3],
    pub score: f64,
    pub trits: Vec<u8>,
}

pub struct SymbolExtractor {
    base_frame: FrameConfig,
    goertzel: GoertzelConfig,
    detector: DetectorConfig,
    adaptive: AdaptiveTimingConfig,
}

impl SymbolExtractor {
    pub fn new(
        base_frame: FrameConfig,
        goertzel: GoertzelConfig,
        detector: DetectorConfig,
        adaptive: AdaptiveTimingConfig,
    ) -> Self {
        Self {
            base_frame,
            goertzel,
            detector,
            adaptive,
        }
    }

    fn candidate_triplets(&self) -> Vec<[f64; 3]> {
        let nominal = self.base_frame.tone_frequencies_hz;
        vec![
            nominal,
            nominal.map(|f| f * 1.02),
            nominal.map(|f| f * 0.98),
        ]
    }

    fn candidate_periods_ms(&self) -> Vec<f64> {
        if self.adaptive.symbol_durations_ms.is_empty() {
            vec![self.base_frame.symbol_duration_s * 1000.0]
        } else {
            self.adaptive.symbol_durations_ms.clone()
        }
    }

    fn candidate_starts_ms(&self, period_ms: f64) -> Vec<f64> {
        if !self.adaptive.timing_offsets_ms.is_empty() {
            return self.adaptive.timing_offsets_ms.clone();
        }
        let step = 0.5;
        let mut starts = Vec::new();
        let mut t = 0.0;
        while t < period_ms {
            starts.push(t);
            t += step;
        }
        starts
    }

    fn window_len_samples(&self, period_ms: f64, sample_rate_hz: u32) -> usize {
        let window_ms = (period_ms * self.adaptive.window_fraction).max(self.adaptive.min_window_ms);
        ((window_ms / 1000.0) * sample_rate_hz as f64).round().max(2.0) as usize
    }

    /// Evaluates a single symbol slot centered at `center_ms`, returning the
    /// winning raw bin index (pre-permutation) and its confidence.
    fn decode_slot(
        &self,
        buffer: &AudioBuffer,
        triplet: [f64; 3],
        center_ms: f64,
        window_len: usize,
    ) -> Option<RawSymbol> {
        let center_sample =
            ((center_ms - buffer.start_time_ms) / 1000.0 * buffer.sample_rate_hz as f64) as isize;
        let half = (window_len / 2) as isize;
        let lo = center_sample - half;
        let hi = lo + window_len as isize;
        if lo < 0 || hi as usize > buffer.samples.len() {
            return None;
        }
        let window = &buffer.samples[lo as usize..hi as usize];
        let results = goertzel_bank(window, triplet, buffer.sample_rate_hz, self.goertzel);
        let total: f32 = results.iter().map(|r| r.magnitude).sum();
        if total <= 0.0 {
            return None;
        }
        let (idx, best) = results
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.magnitude.partial_cmp(&b.1.magnitude).unwrap())
            .unwrap();
        Some(RawSymbol {
            trit: idx as u8,
            confidence: best.magnitude / total,
            center_ms,
        })
    }

    fn decode_up_to(
        &self,
        buffer: &AudioBuffer,
        triplet: [f64; 3],
        start_ms: f64,
        period_ms: f64,
    ) -> Vec<Option<RawSymbol>> {
        let window_len = self.window_len_samples(period_ms, buffer.sample_rate_hz);
        (0..MAX_SYMBOLS)
            .map(|i| {
                let center_ms = start_ms + period_ms * (i as f64 + 0.5);
                self.decode_slot(buffer, triplet, center_ms, window_len)
            })
            .collect()
    }

    fn score_mapping(&self, raw: &[Option<RawSymbol>], mapping: [u8; 3]) -> (f64, Vec<u8>) {
        let mapped: Vec<Option<(u8, f32)>> = raw
            .iter()
            .map(|slot| slot.map(|s| (mapping[s.trit as usize], s.confidence)))
            .collect();

        let preamble_matches = mapped
            .iter()
            .take(12)
            .enumerate()
            .filter(|(i, slot)| matches!(slot, Some((t, _)) if *t == WireConstants::PREAMBLE_TRITS[*i]))
            .count();
        let sync_matches = mapped
            .iter()
            .skip(12)
            .take(13)
            .enumerate()
            .filter(|(i, slot)| matches!(slot, Some((t, _)) if *t == WireConstants::BARKER13_TRITS[*i]))
            .count();

        let above_min: Vec<f32> = mapped
            .iter()
            .filter_map(|slot| *slot)
            .filter(|(_, conf)| *conf > self.detector.confidence_threshold)
            .map(|(_, conf)| conf)
            .collect();
        let mean_conf_above_min = if above_min.is_empty() {
            0.0
        } else {
            above_min.iter().sum::<f32>() as f64 / above_min.len() as f64
        };

        let preamble_ratio = preamble_matches as f64 / 12.0;
        let sync_ratio = sync_matches as f64 / 13.0;
        let score = 0.5 * (preamble_ratio + sync_ratio) * (0.5 + mean_conf_above_min);

        let trits: Vec<u8> = mapped.iter().filter_map(|s| s.map(|(t, _)| t)).collect();
        (score, trits)
    }

    /// Runs the full grid search and returns the single highest-scoring
    /// candidate, if any slot produced usable symbols.
    pub fn extract(&self, buffer: &AudioBuffer) -> Option<ExtractedCandidate> {
        let mut best: Option<ExtractedCandidate> = None;

        for triplet in self.candidate_triplets() {
            for period_ms in self.candidate_periods_ms() {
                for start_ms in self.candidate_starts_ms(period_ms) {
                    let raw = self.decode_up_to(buffer, triplet, start_ms, period_ms);
                    if raw.iter().all(Option::is_none) {
                        continue;
                    }
                    for mapping in PERMUTATIONS {
                        let (score, trits) = self.score_mapping(&raw, mapping);
                        let replace = match &best {
                            None => true,
                            Some(b) => {
                                score > b.score
                                    || (score == b.score && start_ms < b.start_ms)
                            }
                        };
                        if replace {
                            best = Some(ExtractedCandidate {
                                tone_triplet_hz: triplet,
                                period_ms,
                                start_ms,
                                mapping,
                                score,
                                trits,
                            });
                        }
                    }
                }
            }
        }
        best
    }

    /// Optional refinement: re-centers each low-confidence symbol slot
    /// within ±4·(2% of period) and keeps the offset that maximizes that
    /// slot's confidence, then recomputes the candidate's score.
    pub fn refine(&self, buffer: &AudioBuffer, candidate: &ExtractedCandidate) -> ExtractedCandidate {
        let window_len = self.window_len_samples(candidate.period_ms, buffer.sample_rate_hz);
        let jitter = 0.02 * candidate.period_ms;
        let mut raw: Vec<Option<RawSymbol>> = Vec::with_capacity(MAX_SYMBOLS);

        for i in 0..MAX_SYMBOLS {
            let nominal_center = candidate.start_ms + candidate.period_ms * (i as f64 + 0.5);
            let nominal = self.decode_slot(buffer, candidate.tone_triplet_hz, nominal_center, window_len);

            let needs_refine = match nominal {
                Some(s) => s.confidence <= self.detector.confidence_threshold,
                None => true,
            };

            if !needs_refine {
                raw.push(nominal);
                continue;
            }

            let mut best_slot = nominal;
            for step in -REFINE_STEPS..=REFINE_STEPS {
                let offset = jitter * step as f64 / REFINE_STEPS as f64;
                let center = nominal_center + offset;
                if let Some(candidate_slot) = self.decode_slot(buffer, candidate.tone_triplet_hz, center, window_len)
                {
                    let better = match best_slot {
                        None => true,
                        Some(b) => candidate_slot.confidence > b.confidence,
                    };
                    if better {
                        best_slot = Some(candidate_slot);
                    }
                }
            }
            raw.push(best_slot);
        }

        let (score, trits) = self.score_mapping(&raw, candidate.mapping);
        ExtractedCandidate {
            score,
            trits,
            ..candidate.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn synth_trits(trits: &[u8], frame: &FrameConfig) -> Vec<f32> {
        let mut out = Vec::new();
        let n_per_symbol = (frame.sample_rate_hz as f64 * frame.symbol_duration_s) as usize;
        for &trit in trits {
            let freq = frame.tone_frequencies_hz[trit as usize];
            for i in 0..n_per_symbol {
                out.push((2.0 * PI * freq * i as f64 / frame.sample_rate_hz as f64).sin() as f32);
            }
        }
        out
    }

    #[test]
    fn recovers_preamble_and_sync_at_score_above_threshold() {
        let frame = FrameConfig::default();
        let mut trits: Vec<u8> = WireConstants::PREAMBLE_TRITS.to_vec();
        trits.extend(WireConstants::BARKER13_TRITS.to_vec());

        let samples = synth_trits(&trits, &frame);
        let buffer = AudioBuffer::new(samples, frame.sample_rate_hz, 0.0);

        let adaptive = AdaptiveTimingConfig {
            symbol_durations_ms: vec![frame.symbol_duration_s * 1000.0],
            timing_offsets_ms: vec![0.0],
            ..Default::default()
        };
        let extractor = SymbolExtractor::new(frame, GoertzelConfig::default(), DetectorConfig::default(), adaptive);

        let best = extractor.extract(&buffer).expect("should find a candidate");
        assert!(best.score > 0.8, "score was {}", best.score);
        assert_eq!(best.start_ms, 0.0);
    }
}
