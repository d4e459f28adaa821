//! Fesk error types with granular categories

use thiserror::Error;

/// Top-level error type for all fesk-core operations
#[derive(Debug, Error)]
pub enum FeskError {
    #[error("DSP processing error: {0}")]
    Dsp(#[from] DspError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// DSP-stage errors (Goertzel bank, tone detector, preamble/sync, grid search)
#[derive(Debug, Error)]
pub enum DspError {
    #[error("window length {len} is too short for symbol period {period_ms} ms at {sample_rate} Hz")]
    WindowTooShort {
        len: usize,
        period_ms: f64,
        sample_rate: u32,
    },

    #[error("tone frequency {freq_hz} Hz exceeds Nyquist for sample rate {sample_rate} Hz")]
    AboveNyquist { freq_hz: f64, sample_rate: u32 },

    #[error("grid search exhausted {candidates} candidates without a usable lock")]
    GridSearchExhausted { candidates: usize },
}

/// Frame-assembly errors that do surface to a caller (as opposed to the
/// internal `FrameAssembleOutcome` control-flow variants, which are not
/// modeled as `Result::Err` per the error handling design).
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("sync lost: no committed symbol for {symbol_periods} consecutive symbol periods")]
    SyncLost { symbol_periods: usize },

    #[error("acquisition failed: end of audio reached without a valid frame")]
    AcquisitionFailure,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported sample rate: {rate} Hz (expected 8000 or 44100)")]
    UnsupportedSampleRate { rate: u32 },

    #[error("invalid symbol duration: {seconds} s (must be > 0)")]
    InvalidSymbolDuration { seconds: f64 },

    #[error("tone frequency set must have exactly 3 distinct values, got {count}")]
    InvalidToneSet { count: usize },

    #[error("pilot interval must be > 0, got {interval}")]
    InvalidPilotInterval { interval: usize },
}

/// Collaborator I/O errors (WAV reading, downmixing)
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read WAV file {path}: {reason}")]
    WavRead { path: String, reason: String },

    #[error("unsupported WAV format: {reason}")]
    UnsupportedWavFormat { reason: String },

    #[error("empty audio buffer")]
    EmptyBuffer,
}

/// Result type alias for fesk-core operations
pub type Result<T> = std::result::Result<T, FeskError>;
