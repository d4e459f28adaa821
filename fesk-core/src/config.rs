//! Wire-format constants and tunable configuration records for the FESK
//! receive chain.
//!
//! Fixed wire constants (preamble pattern, Barker-13 word, pilot pair, LFSR
//! seed, CRC parameters) live on [`WireConstants`] as associated consts.
//! They are not configurable, since the receiver must be bit-exact with the
//! transmitter. Everything that legitimately varies between deployments
//! (sample rate, symbol period, tone triplet, detector thresholds) is a
//! serde-derived record with a `Default` impl, following the same split the
//! signal-processing core itself uses between locked wire format and
//! adjustable runtime parameters.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Result};

/// Trit-level wire constants shared by every `FrameConfig` profile.
pub struct WireConstants;

impl WireConstants {
    /// 12-symbol alternating preamble, 1->2, 0->0.
    pub const PREAMBLE_TRITS: [u8; 12] = [2, 0, 2, 0, 2, 0, 2, 0, 2, 0, 2, 0];

    /// Barker-13 word mapped 1->2, 0->0.
    pub const BARKER13_TRITS: [u8; 13] = [2, 2, 2, 2, 2, 0, 0, 2, 2, 0, 2, 0, 2];

    /// Pilot pair inserted after every `pilot_interval_trits` data trits.
    pub const PILOT_PAIR: [u8; 2] = [0, 2];

    /// 9-bit Fibonacci LFSR seed.
    pub const LFSR_SEED: u16 = 0x1FF;

    /// CRC-16/CCITT polynomial.
    pub const CRC_POLY: u16 = 0x1021;

    /// CRC-16/CCITT initial value.
    pub const CRC_INIT: u16 = 0xFFFF;

    pub const MIN_PAYLOAD_LEN: u16 = 1;
    pub const MAX_PAYLOAD_LEN: u16 = 64;
}

/// Sample rate / symbol period / tone triplet profile.
///
/// Two configurations are in the field (44.1 kHz/100 ms and 8 kHz/93.75 ms)
/// with an otherwise identical wire format. The receiver never auto-detects
/// between them; see `Decoder::new` / `FrameConfig::legacy_8k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    pub sample_rate_hz: u32,
    pub symbol_duration_s: f64,
    pub tone_frequencies_hz: [f64; 3],
    pub pilot_interval_trits: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            symbol_duration_s: 0.1,
            tone_frequencies_hz: [2400.0, 3000.0, 3600.0],
            pilot_interval_trits: 64,
        }
    }
}

impl FrameConfig {
    /// Legacy 8 kHz profile: 93.75 ms symbol period, same tone triplet.
    pub fn legacy_8k() -> Self {
        Self {
            sample_rate_hz: 8_000,
            symbol_duration_s: 0.09375,
            ..Self::default()
        }
    }

    pub fn symbols_per_second(&self) -> f64 {
        1.0 / self.symbol_duration_s
    }

    pub fn samples_per_symbol(&self) -> f64 {
        self.sample_rate_hz as f64 * self.symbol_duration_s
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz != 8_000 && self.sample_rate_hz != 44_100 {
            return Err(ConfigError::UnsupportedSampleRate {
                rate: self.sample_rate_hz,
            }
            .into());
        }
        if self.symbol_duration_s <= 0.0 {
            return Err(ConfigError::InvalidSymbolDuration {
                seconds: self.symbol_duration_s,
            }
            .into());
        }
        let mut distinct = self.tone_frequencies_hz;
        distinct.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let all_distinct = distinct.windows(2).all(|w| (w[1] - w[0]).abs() > f64::EPSILON);
        if !all_distinct {
            return Err(ConfigError::InvalidToneSet { count: 3 }.into());
        }
        if self.pilot_interval_trits == 0 {
            return Err(ConfigError::InvalidPilotInterval {
                interval: self.pilot_interval_trits,
            }
            .into());
        }
        Ok(())
    }
}

/// Raised-cosine window applied before the Goertzel recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    Hamming,
    Hann,
}

impl Default for WindowKind {
    fn default() -> Self {
        WindowKind::Hamming
    }
}

/// Binned (FFT-bin-aligned) vs parametric (arbitrary-frequency) Goertzel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoertzelMode {
    Binned,
    Parametric,
}

impl Default for GoertzelMode {
    fn default() -> Self {
        GoertzelMode::Parametric
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoertzelConfig {
    pub window: WindowKind,
    pub mode: GoertzelMode,
}

impl Default for GoertzelConfig {
    fn default() -> Self {
        Self {
            window: WindowKind::default(),
            mode: GoertzelMode::default(),
        }
    }
}

/// Tone detector thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub window_ms: f64,
    pub hop_divisor: usize,
    pub confidence_threshold: f32,
    pub magnitude_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_ms: 27.5,
            hop_divisor: 8,
            confidence_threshold: 0.3,
            magnitude_threshold: 0.001,
        }
    }
}

/// Preamble/sync acceptance thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub preamble_min_matches: usize,
    pub preamble_min_avg_confidence: f32,
    pub sync_max_bit_errors: usize,
    pub sync_min_avg_confidence: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            preamble_min_matches: 9,
            preamble_min_avg_confidence: 0.4,
            sync_max_bit_errors: 2,
            sync_min_avg_confidence: 0.5,
        }
    }
}

/// Payload-phase weighted majority vote parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VotingConfig {
    pub candidate_window_ms: f64,
    pub vote_window_ms: f64,
    pub confidence_exponent: f64,
    pub age_decay_ms: f64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            candidate_window_ms: 300.0,
            vote_window_ms: 120.0,
            confidence_exponent: 1.5,
            age_decay_ms: 40.0,
        }
    }
}

/// Fallback grid-search ranges, consumed by
/// `fesk_core::sync::symbol_extractor` and gating `Decoder`'s use of it
/// as a fallback front end when the streaming pipeline fails to acquire
/// a lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveTimingConfig {
    pub enable_adaptive: bool,
    pub symbol_durations_ms: Vec<f64>,
    pub timing_offsets_ms: Vec<f64>,
    pub window_fraction: f64,
    pub min_window_ms: f64,
}

impl Default for AdaptiveTimingConfig {
    fn default() -> Self {
        Self {
            enable_adaptive: true,
            symbol_durations_ms: vec![80.0, 85.0, 90.0, 93.75, 100.0, 105.0, 110.0, 120.0],
            timing_offsets_ms: Vec::new(),
            window_fraction: 0.6,
            min_window_ms: 40.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_44_1k() {
        let cfg = FrameConfig::default();
        assert_eq!(cfg.sample_rate_hz, 44_100);
        assert!((cfg.symbol_duration_s - 0.1).abs() < 1e-9);
        cfg.validate().unwrap();
    }

    #[test]
    fn legacy_profile_is_8k() {
        let cfg = FrameConfig::legacy_8k();
        assert_eq!(cfg.sample_rate_hz, 8_000);
        assert!((cfg.symbol_duration_s - 0.09375).abs() < 1e-9);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        let mut cfg = FrameConfig::default();
        cfg.sample_rate_hz = 16_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn wire_constants_match_expected_lengths() {
        assert_eq!(WireConstants::PREAMBLE_TRITS.len(), 12);
        assert_eq!(WireConstants::BARKER13_TRITS.len(), 13);
        assert_eq!(WireConstants::LFSR_SEED, 0x1FF);
        assert_eq!(WireConstants::CRC_POLY, 0x1021);
        assert_eq!(WireConstants::CRC_INIT, 0xFFFF);
    }
}
