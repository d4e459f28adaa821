//! Receiver state machine: drives the three-phase decoder
//! (Searching -> Sync -> Payload), performs payload-phase symbol
//! decimation by weighted majority vote, and attempts frame assembly on
//! every committed trit. Falls back to the batch grid-search symbol
//! extractor when the streaming pipeline exhausts the buffer without
//! ever acquiring a lock.

pub mod base3;
pub mod crc;
pub mod frame;
pub mod lfsr;
pub mod pilot;

use std::collections::VecDeque;

use crate::config::{AdaptiveTimingConfig, DetectorConfig, FrameConfig, GoertzelConfig, SyncConfig, VotingConfig};
use crate::dsp::tone_detector::{AudioBuffer, SymbolCandidate, ToneDetector};
use crate::errors::{DspError, FeskError, FrameError, Result};
use crate::logging::{LogConfig, SignalLogger};
use crate::sync::preamble::{LockRecord, PreambleDetector, SyncDetector};
use crate::sync::symbol_extractor::SymbolExtractor;

pub use frame::{Frame, FrameAssembleOutcome};
pub use pilot::PilotObservation;

/// A bounded number of consecutive symbol periods without a committed
/// trit before the state machine gives up on the current acquisition
/// and resets to `Searching`.
const MAX_MISSED_SYMBOL_PERIODS: usize = 10;

/// Minimum grid-search score the fallback extractor's winning candidate
/// must clear before its trits are handed to frame assembly.
const MIN_FALLBACK_SCORE: f64 = 0.5;

/// Minimum samples a detector window must span; below this the Goertzel
/// bank cannot usefully resolve the three tones.
const MIN_DETECTOR_WINDOW_SAMPLES: usize = 8;

#[derive(Debug, Clone, Copy)]
enum Phase {
    Searching,
    Sync {
        lock: LockRecord,
    },
    Payload {
        lock: LockRecord,
        phase_entry_time_ms: f64,
        next_commit_index: usize,
        missed_periods: usize,
    },
}

/// Human-readable phase tag for [`DecoderProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Searching,
    Sync,
    Payload,
}

/// Observability snapshot returned by `Decoder::progress()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderProgress {
    pub phase: PhaseKind,
    pub trit_count: usize,
    pub progress_percent: f32,
    pub estimated_complete: bool,
}

/// Rough trit budget used only to turn a trit count into a percentage: a
/// maximum-size frame (64-byte payload, 2-byte header, 2-byte CRC) folded
/// through the canonical base-3 expansion.
const ESTIMATED_MAX_FRAME_TRITS: usize = 150;

pub struct Decoder {
    frame_config: FrameConfig,
    goertzel_config: GoertzelConfig,
    detector_config: DetectorConfig,
    voting_config: VotingConfig,
    adaptive_timing: AdaptiveTimingConfig,
    tone_detector: ToneDetector,
    preamble: PreambleDetector,
    sync_detector: SyncDetector,
    logger: SignalLogger,

    phase: Phase,
    candidate_window: VecDeque<SymbolCandidate>,
    trit_buffer: Vec<u8>,
    pilot_observations: Vec<PilotObservation>,

    /// Dense, overlapping candidates accumulated since the last
    /// decimated symbol was emitted to the preamble/Barker detectors.
    raw_candidate_buffer: VecDeque<SymbolCandidate>,
    /// Timestamp of decimation slot 0, set from the first raw candidate
    /// seen while `Searching`, and re-anchored to the preamble lock when
    /// entering `Sync`.
    search_origin_ms: Option<f64>,
    search_next_slot: usize,

    elapsed_audio_ms: f64,
    symbol_commits: usize,
    max_audio_ms: f64,
    max_symbol_commits: usize,
    last_emit: bool,
    last_failure: Option<FeskError>,
}

impl Decoder {
    pub fn new(
        frame_config: FrameConfig,
        goertzel_config: GoertzelConfig,
        detector_config: DetectorConfig,
        sync_config: SyncConfig,
        voting_config: VotingConfig,
        adaptive_timing: AdaptiveTimingConfig,
    ) -> Self {
        Self {
            tone_detector: ToneDetector::new(frame_config.clone(), goertzel_config, detector_config),
            preamble: PreambleDetector::new(frame_config.clone(), sync_config),
            sync_detector: SyncDetector::new(sync_config),
            logger: SignalLogger::new(LogConfig::default()),
            frame_config,
            goertzel_config,
            detector_config,
            voting_config,
            adaptive_timing,
            phase: Phase::Searching,
            candidate_window: VecDeque::new(),
            trit_buffer: Vec::new(),
            pilot_observations: Vec::new(),
            raw_candidate_buffer: VecDeque::new(),
            search_origin_ms: None,
            search_next_slot: 0,
            elapsed_audio_ms: 0.0,
            symbol_commits: 0,
            max_audio_ms: 30_000.0,
            max_symbol_commits: 1_000,
            last_emit: false,
            last_failure: None,
        }
    }

    /// Validating constructor: rejects configurations the receive chain
    /// cannot meaningfully run (detector window too short to resolve the
    /// tone bank, a tone at or above Nyquist, or an invalid `FrameConfig`).
    pub fn try_new(
        frame_config: FrameConfig,
        goertzel_config: GoertzelConfig,
        detector_config: DetectorConfig,
        sync_config: SyncConfig,
        voting_config: VotingConfig,
        adaptive_timing: AdaptiveTimingConfig,
    ) -> Result<Self> {
        frame_config.validate()?;
        Self::validate_detector_window(&frame_config, &detector_config)?;
        Self::validate_tone_frequencies(&frame_config)?;
        Ok(Self::new(
            frame_config,
            goertzel_config,
            detector_config,
            sync_config,
            voting_config,
            adaptive_timing,
        ))
    }

    fn validate_detector_window(frame_config: &FrameConfig, detector_config: &DetectorConfig) -> Result<()> {
        let window_len = (detector_config.window_ms / 1000.0 * frame_config.sample_rate_hz as f64).round() as usize;
        if window_len < MIN_DETECTOR_WINDOW_SAMPLES {
            return Err(DspError::WindowTooShort {
                len: window_len,
                period_ms: frame_config.symbol_duration_s * 1000.0,
                sample_rate: frame_config.sample_rate_hz,
            }
            .into());
        }
        Ok(())
    }

    fn validate_tone_frequencies(frame_config: &FrameConfig) -> Result<()> {
        let nyquist = frame_config.sample_rate_hz as f64 / 2.0;
        for &freq_hz in &frame_config.tone_frequencies_hz {
            if freq_hz >= nyquist {
                return Err(DspError::AboveNyquist {
                    freq_hz,
                    sample_rate: frame_config.sample_rate_hz,
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn new_with_defaults() -> Self {
        Self::new(
            FrameConfig::default(),
            GoertzelConfig::default(),
            DetectorConfig::default(),
            SyncConfig::default(),
            VotingConfig::default(),
            AdaptiveTimingConfig::default(),
        )
    }

    /// Clears all state: buffers, phase, and acquisition counters. Per the
    /// lifecycle rule, this also happens implicitly after a successful
    /// frame emit.
    pub fn reset(&mut self) {
        self.phase = Phase::Searching;
        self.preamble.reset();
        self.sync_detector.reset();
        self.candidate_window.clear();
        self.trit_buffer.clear();
        self.pilot_observations.clear();
        self.raw_candidate_buffer.clear();
        self.search_origin_ms = None;
        self.search_next_slot = 0;
        self.elapsed_audio_ms = 0.0;
        self.symbol_commits = 0;
        self.last_emit = false;
        self.last_failure = None;
    }

    pub fn pilot_observations(&self) -> &[PilotObservation] {
        &self.pilot_observations
    }

    pub fn progress(&self) -> DecoderProgress {
        let phase = match self.phase {
            Phase::Searching => PhaseKind::Searching,
            Phase::Sync { .. } => PhaseKind::Sync,
            Phase::Payload { .. } => PhaseKind::Payload,
        };
        let trit_count = pilot::remove_pilots(
            &self.trit_buffer,
            self.frame_config.pilot_interval_trits,
            crate::config::WireConstants::PILOT_PAIR,
        )
        .0
        .len();
        let progress_percent = match phase {
            PhaseKind::Searching => 0.0,
            PhaseKind::Sync => 5.0,
            PhaseKind::Payload => {
                10.0 + 90.0 * (trit_count as f32 / ESTIMATED_MAX_FRAME_TRITS as f32).min(1.0)
            }
        };
        DecoderProgress {
            phase,
            trit_count,
            progress_percent,
            estimated_complete: self.last_emit,
        }
    }

    /// Incremental entry point: feeds one chunk of audio through whichever
    /// phase is currently active.
    pub fn process_audio(&mut self, chunk: &AudioBuffer) -> Option<Frame> {
        self.last_emit = false;
        self.elapsed_audio_ms += chunk.duration_ms();
        let now_ms = chunk.start_time_ms + chunk.duration_ms();

        let mut result = None;
        let mut phase = self.phase;

        match phase {
            Phase::Searching => {
                let raw = self.tone_detector.detect_stream(chunk);
                if self.search_origin_ms.is_none() {
                    if let Some(first) = raw.first() {
                        self.search_origin_ms = Some(first.timestamp_ms);
                        self.search_next_slot = 0;
                    }
                }

                if let Some(origin_ms) = self.search_origin_ms {
                    let period_ms = self.frame_config.symbol_duration_s * 1000.0;
                    let decimated = self.decimate_to_symbol_rate(&raw, origin_ms, period_ms, now_ms);
                    for candidate in decimated {
                        if let Some(lock) = self.preamble.push(candidate) {
                            self.logger.info(
                                "SYNC",
                                format!(
                                    "preamble locked at {:.1}ms, period~{:.1}ms",
                                    lock.start_time_ms, lock.symbol_period_estimate_ms
                                ),
                            );
                            self.sync_detector.reset();
                            self.raw_candidate_buffer.clear();
                            self.search_origin_ms = Some(lock.start_time_ms + 12.0 * lock.symbol_period_estimate_ms);
                            self.search_next_slot = 0;
                            phase = Phase::Sync { lock };
                            break;
                        }
                    }
                }
            }
            Phase::Sync { lock } => {
                let raw = self.tone_detector.detect_stream(chunk);
                let origin_ms =
                    *self.search_origin_ms.get_or_insert(lock.start_time_ms + 12.0 * lock.symbol_period_estimate_ms);
                let period_ms = lock.symbol_period_estimate_ms;
                let decimated = self.decimate_to_symbol_rate(&raw, origin_ms, period_ms, now_ms);

                for candidate in decimated {
                    if let Some(accepted) = self.sync_detector.push(candidate) {
                        if accepted {
                            self.logger.info("SYNC", "barker-13 accepted, entering payload phase");
                            self.trit_buffer.clear();
                            self.pilot_observations.clear();
                            self.candidate_window.clear();
                            self.raw_candidate_buffer.clear();
                            self.search_origin_ms = None;
                            self.search_next_slot = 0;
                            phase = Phase::Payload {
                                lock,
                                phase_entry_time_ms: now_ms,
                                next_commit_index: 0,
                                missed_periods: 0,
                            };
                        } else {
                            self.logger.warn("SYNC", "barker-13 rejected, returning to search");
                            self.preamble.reset();
                            self.raw_candidate_buffer.clear();
                            self.search_origin_ms = None;
                            self.search_next_slot = 0;
                            phase = Phase::Searching;
                        }
                        break;
                    }
                }
            }
            Phase::Payload {
                lock,
                phase_entry_time_ms,
                mut next_commit_index,
                mut missed_periods,
            } => {
                let chunk_candidates = self.tone_detector.detect_stream(chunk);
                self.candidate_window.extend(chunk_candidates.iter().copied());

                let floor_ms = now_ms - self.voting_config.candidate_window_ms;
                while matches!(self.candidate_window.front(), Some(c) if c.timestamp_ms < floor_ms) {
                    self.candidate_window.pop_front();
                }

                let period_ms = lock.symbol_period_estimate_ms;
                loop {
                    let commit_time_ms = phase_entry_time_ms + period_ms * next_commit_index as f64;
                    if commit_time_ms > now_ms {
                        break;
                    }
                    next_commit_index += 1;

                    match self.commit_vote(commit_time_ms, &chunk_candidates) {
                        Some(trit) => {
                            missed_periods = 0;
                            self.trit_buffer.push(trit);
                            self.symbol_commits += 1;

                            let (outcome, observations) =
                                frame::assemble(&self.trit_buffer, self.frame_config.pilot_interval_trits);
                            self.pilot_observations = observations;

                            if let FrameAssembleOutcome::Ready(decoded) = outcome {
                                self.logger
                                    .info("FRAME", format!("frame ready, valid={}", decoded.is_valid));
                                result = Some(decoded);
                                self.last_emit = true;
                                self.last_failure = None;
                                phase = Phase::Searching;
                                self.preamble.reset();
                                self.sync_detector.reset();
                                self.trit_buffer.clear();
                                self.candidate_window.clear();
                                self.raw_candidate_buffer.clear();
                                self.search_origin_ms = None;
                                self.search_next_slot = 0;
                                break;
                            }
                        }
                        None => {
                            missed_periods += 1;
                            if missed_periods > MAX_MISSED_SYMBOL_PERIODS {
                                self.logger.warn("FRAME", "sync lost, returning to search");
                                self.last_failure = Some(FrameError::SyncLost { symbol_periods: missed_periods }.into());
                                phase = Phase::Searching;
                                self.preamble.reset();
                                self.sync_detector.reset();
                                self.trit_buffer.clear();
                                self.candidate_window.clear();
                                self.raw_candidate_buffer.clear();
                                self.search_origin_ms = None;
                                self.search_next_slot = 0;
                                break;
                            }
                        }
                    }
                }

                if let Phase::Payload { .. } = phase {
                    phase = Phase::Payload {
                        lock,
                        phase_entry_time_ms,
                        next_commit_index,
                        missed_periods,
                    };
                }
            }
        }

        self.phase = phase;

        if result.is_none()
            && (self.elapsed_audio_ms >= self.max_audio_ms || self.symbol_commits >= self.max_symbol_commits)
        {
            self.reset();
        }

        result
    }

    /// Decimates the densely-overlapped decisions from
    /// `ToneDetector::detect_stream` (hop = window/8, roughly 26 decisions
    /// per symbol period) to one decision per `period_ms`, using the same
    /// weighted vote `commit_vote` applies in the payload phase. Without
    /// this, the preamble/Barker detectors would treat each raw decision
    /// as one transmitted symbol and their fixed-width windows would never
    /// span more than a couple of true symbol periods.
    fn decimate_to_symbol_rate(
        &mut self,
        chunk_candidates: &[SymbolCandidate],
        origin_ms: f64,
        period_ms: f64,
        now_ms: f64,
    ) -> Vec<SymbolCandidate> {
        self.raw_candidate_buffer.extend(chunk_candidates.iter().copied());
        let floor_ms = now_ms - 2.0 * period_ms - self.voting_config.vote_window_ms;
        while matches!(self.raw_candidate_buffer.front(), Some(c) if c.timestamp_ms < floor_ms) {
            self.raw_candidate_buffer.pop_front();
        }

        let mut emitted = Vec::new();
        loop {
            let slot_center_ms = origin_ms + period_ms * (self.search_next_slot as f64 + 0.5);
            if slot_center_ms > now_ms {
                break;
            }
            self.search_next_slot += 1;

            if let Some((trit, confidence, magnitude)) =
                Self::weighted_vote(&self.raw_candidate_buffer, slot_center_ms, &self.voting_config)
            {
                emitted.push(SymbolCandidate {
                    trit,
                    confidence,
                    magnitude,
                    timestamp_ms: slot_center_ms,
                });
            }
        }
        emitted
    }

    /// Weighted vote over `window`'s candidates within `voting.vote_window_ms`
    /// of `center_ms`: `weight = confidence^confidence_exponent *
    /// exp(-age_ms/age_decay_ms)`. Returns the winning trit plus the
    /// weight-averaged confidence/magnitude of the candidates that voted
    /// for it, or `None` if nothing fell inside the window.
    fn weighted_vote(
        window: &VecDeque<SymbolCandidate>,
        center_ms: f64,
        voting: &VotingConfig,
    ) -> Option<(u8, f32, f32)> {
        let mut weighted = [0.0f64; 3];
        let mut conf_sum = [0.0f64; 3];
        let mut mag_sum = [0.0f64; 3];

        for candidate in window {
            let age_ms = (center_ms - candidate.timestamp_ms).abs();
            if age_ms <= voting.vote_window_ms {
                let weight = (candidate.confidence as f64).powf(voting.confidence_exponent)
                    * (-age_ms / voting.age_decay_ms).exp();
                let trit = candidate.trit as usize;
                weighted[trit] += weight;
                conf_sum[trit] += candidate.confidence as f64 * weight;
                mag_sum[trit] += candidate.magnitude as f64 * weight;
            }
        }

        let (trit, total_weight) = weighted
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, w)| (i, *w))?;

        if total_weight <= 0.0 {
            return None;
        }
        Some((
            trit as u8,
            (conf_sum[trit] / total_weight) as f32,
            (mag_sum[trit] / total_weight) as f32,
        ))
    }

    /// Weighted majority vote over the `vote_window_ms` neighborhood of
    /// `commit_time_ms`. Falls back to the single highest-confidence
    /// candidate in the current chunk if no candidate in the window
    /// qualifies.
    fn commit_vote(&self, commit_time_ms: f64, chunk_candidates: &[SymbolCandidate]) -> Option<u8> {
        if let Some((trit, _, _)) = Self::weighted_vote(&self.candidate_window, commit_time_ms, &self.voting_config) {
            return Some(trit);
        }
        chunk_candidates
            .iter()
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
            .map(|c| c.trit)
    }

    /// Slices `buffer` into `chunk_ms`-wide pieces and drives
    /// [`Decoder::process_audio`] across them until a frame is returned or
    /// the buffer is exhausted. If the streaming pipeline never acquires a
    /// lock, falls back to the batch grid-search symbol extractor before
    /// giving up (see [`Decoder::recover_with_fallback`]).
    pub fn process_stream(&mut self, buffer: &AudioBuffer, chunk_ms: f64) -> Option<Frame> {
        let chunk_len = (buffer.sample_rate_hz as f64 * chunk_ms / 1000.0).round() as usize;
        let chunk_len = chunk_len.max(1);

        let mut offset = 0usize;
        while offset < buffer.samples.len() {
            let end = (offset + chunk_len).min(buffer.samples.len());
            let chunk = AudioBuffer::new(
                buffer.samples[offset..end].to_vec(),
                buffer.sample_rate_hz,
                buffer.start_time_ms + 1000.0 * offset as f64 / buffer.sample_rate_hz as f64,
            );
            if let Some(frame) = self.process_audio(&chunk) {
                return Some(frame);
            }
            offset = end;
        }

        match self.recover_with_fallback(buffer) {
            Ok(frame) => {
                self.last_failure = None;
                Some(frame)
            }
            Err(err) => {
                self.last_failure = Some(err);
                None
            }
        }
    }

    /// Runs [`Decoder::process_stream`] and surfaces why it failed, instead
    /// of collapsing every failure to `None`: a `SyncLost` the state
    /// machine hit mid-payload, or an `AcquisitionFailure` if neither the
    /// streaming pipeline nor the fallback extractor ever produced a frame.
    pub fn process_stream_checked(&mut self, buffer: &AudioBuffer, chunk_ms: f64) -> Result<Frame> {
        match self.process_stream(buffer, chunk_ms) {
            Some(frame) => Ok(frame),
            None => Err(self
                .last_failure
                .take()
                .unwrap_or_else(|| FrameError::AcquisitionFailure.into())),
        }
    }

    /// Runs the batch grid-search symbol extractor directly over `buffer`
    /// and attempts frame assembly on its winning candidate's trits. This
    /// is the alternative front end for recordings the streaming detector's
    /// fixed hop grid cannot track (sub-hop timing offsets, attenuation).
    /// Disabled when `adaptive_timing.enable_adaptive` is `false`.
    pub fn recover_with_fallback(&mut self, buffer: &AudioBuffer) -> Result<Frame> {
        if !self.adaptive_timing.enable_adaptive {
            return Err(FrameError::AcquisitionFailure.into());
        }

        let extractor = SymbolExtractor::new(
            self.frame_config.clone(),
            self.goertzel_config,
            self.detector_config,
            self.adaptive_timing.clone(),
        );

        let best = extractor
            .extract(buffer)
            .ok_or(DspError::GridSearchExhausted { candidates: 0 })?;
        let refined = extractor.refine(buffer, &best);
        let winner = if refined.score >= best.score { refined } else { best };

        if winner.score < MIN_FALLBACK_SCORE {
            return Err(DspError::GridSearchExhausted {
                candidates: winner.trits.len(),
            }
            .into());
        }

        let preamble_and_sync_len = crate::config::WireConstants::PREAMBLE_TRITS.len()
            + crate::config::WireConstants::BARKER13_TRITS.len();
        let payload_trits: Vec<u8> = winner.trits.iter().skip(preamble_and_sync_len).copied().collect();

        let (outcome, observations) = frame::assemble(&payload_trits, self.frame_config.pilot_interval_trits);
        self.pilot_observations = observations;

        match outcome {
            FrameAssembleOutcome::Ready(frame) => Ok(frame),
            _ => Err(FrameError::AcquisitionFailure.into()),
        }
    }

    /// Computes per-10ms-window RMS energy and returns the timestamp of
    /// the first window exceeding `energy_threshold`, or `None`.
    pub fn find_transmission_start(samples: &[f32], sample_rate_hz: u32, energy_threshold: f32) -> Option<f64> {
        let window_len = ((sample_rate_hz as f64) * 0.01).round() as usize;
        if window_len == 0 {
            return None;
        }
        let mut start = 0usize;
        while start + window_len <= samples.len() {
            let window = &samples[start..start + window_len];
            let mean_sq = window.iter().map(|s| (*s as f64) * (*s as f64)).sum::<f64>() / window_len as f64;
            let rms = mean_sq.sqrt();
            if rms as f32 > energy_threshold {
                return Some(1000.0 * start as f64 / sample_rate_hz as f64);
            }
            start += window_len;
        }
        None
    }
}
