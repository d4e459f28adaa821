//! Preamble and Barker-13 sync detection.

use std::collections::VecDeque;

use crate::config::{FrameConfig, SyncConfig, WireConstants};
use crate::dsp::SymbolCandidate;

/// Minimal lock record exchanged between phases of the receiver state
/// machine: frame start time, estimated symbol period, and the (currently
/// unrefined) tone triplet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockRecord {
    pub start_time_ms: f64,
    pub symbol_period_estimate_ms: f64,
    pub tone_triplet_hz: [f64; 3],
}

/// Maps a trit to its binary preamble/sync encoding: 2->1, 0->0, 1 is not
/// a valid preamble/sync symbol.
fn trit_to_bit(trit: u8) -> Option<u8> {
    match trit {
        2 => Some(1),
        0 => Some(0),
        _ => None,
    }
}

fn alternating_bits() -> [u8; 12] {
    WireConstants::PREAMBLE_TRITS.map(|t| trit_to_bit(t).unwrap())
}

fn barker_bits() -> [u8; 13] {
    WireConstants::BARKER13_TRITS.map(|t| trit_to_bit(t).unwrap())
}

/// Slides a 12-symbol window over incoming candidates looking for the
/// alternating preamble pattern.
pub struct PreambleDetector {
    frame: FrameConfig,
    config: SyncConfig,
    window: VecDeque<SymbolCandidate>,
}

impl PreambleDetector {
    pub fn new(frame: FrameConfig, config: SyncConfig) -> Self {
        Self {
            frame,
            config,
            window: VecDeque::with_capacity(12),
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Feeds one candidate; returns a [`LockRecord`] the instant the window
    /// satisfies the acceptance criteria.
    pub fn push(&mut self, candidate: SymbolCandidate) -> Option<LockRecord> {
        if self.window.len() == 12 {
            self.window.pop_front();
        }
        self.window.push_back(candidate);
        if self.window.len() < 12 {
            return None;
        }

        let pattern = alternating_bits();
        let mut matches = 0usize;
        let mut confidence_sum = 0.0f32;
        for (i, c) in self.window.iter().enumerate() {
            confidence_sum += c.confidence;
            if trit_to_bit(c.trit) == Some(pattern[i]) {
                matches += 1;
            }
        }
        let avg_confidence = confidence_sum / self.window.len() as f32;

        if matches >= self.config.preamble_min_matches
            && avg_confidence >= self.config.preamble_min_avg_confidence
        {
            let start_time_ms = self.window.front().unwrap().timestamp_ms;
            let nominal_ms = self.frame.symbol_duration_s * 1000.0;

            let deltas: Vec<f64> = self
                .window
                .iter()
                .zip(self.window.iter().skip(1))
                .map(|(a, b)| b.timestamp_ms - a.timestamp_ms)
                .filter(|d| *d >= 0.25 * nominal_ms && *d <= 2.0 * nominal_ms)
                .collect();

            let estimate = if deltas.is_empty() {
                nominal_ms
            } else {
                deltas.iter().sum::<f64>() / deltas.len() as f64
            };
            let symbol_period_estimate_ms = estimate.clamp(50.0, 200.0);

            self.window.clear();
            return Some(LockRecord {
                start_time_ms,
                symbol_period_estimate_ms,
                tone_triplet_hz: self.frame.tone_frequencies_hz,
            });
        }
        None
    }
}

/// One-shot buffer for the 13-symbol Barker word, used after a preamble
/// lock to confirm exact frame start.
pub struct SyncDetector {
    config: SyncConfig,
    buffer: Vec<SymbolCandidate>,
}

impl SyncDetector {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            buffer: Vec::with_capacity(13),
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feeds one candidate; returns `Some(accepted)` once 13 symbols have
    /// been buffered.
    pub fn push(&mut self, candidate: SymbolCandidate) -> Option<bool> {
        self.buffer.push(candidate);
        if self.buffer.len() < 13 {
            return None;
        }

        let pattern = barker_bits();
        let mut errors = 0usize;
        let mut confidence_sum = 0.0f32;
        for (i, c) in self.buffer.iter().enumerate() {
            confidence_sum += c.confidence;
            if trit_to_bit(c.trit) != Some(pattern[i]) {
                errors += 1;
            }
        }
        let avg_confidence = confidence_sum / self.buffer.len() as f32;
        let accepted =
            errors <= self.config.sync_max_bit_errors && avg_confidence >= self.config.sync_min_avg_confidence;

        self.buffer.clear();
        Some(accepted)
    }
}
