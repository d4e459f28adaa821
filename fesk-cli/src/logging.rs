//! Structured logging for CLI decode runs.

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use fesk_core::decoder::PhaseKind;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Structured log event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// Decoder phase/progress sample.
    Progress(ProgressEvent),

    /// A frame was assembled (valid or CRC-failed).
    FrameDecode(FrameDecodeEvent),

    Info { message: String },
    Warn { message: String },
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    pub phase: String,
    pub trit_count: usize,
    pub progress_percent: f32,
}

impl ProgressEvent {
    pub fn from_progress(progress: fesk_core::decoder::DecoderProgress) -> Self {
        let phase = match progress.phase {
            PhaseKind::Searching => "searching",
            PhaseKind::Sync => "sync",
            PhaseKind::Payload => "payload",
        };
        Self {
            timestamp: Utc::now(),
            phase: phase.to_string(),
            trit_count: progress.trit_count,
            progress_percent: progress.progress_percent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDecodeEvent {
    pub timestamp: DateTime<Utc>,
    pub payload_length: u16,
    pub payload_utf8: Option<String>,
    pub payload_hex: String,
    pub crc: u16,
    pub is_valid: bool,
}

/// Logger that outputs structured logs.
pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("File path required for file logging"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self {
            config,
            writer,
            start_time: Utc::now(),
        })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => self.format_json(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event),
            LogFormat::Pretty => self.format_pretty(&event),
        };

        writeln!(self.writer, "{}", output)?;
        self.writer.flush()?;
        Ok(())
    }

    fn format_json(&self, event: &LogEvent) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn format_logfmt(&self, event: &LogEvent) -> String {
        let ts = Utc::now().to_rfc3339();
        match event {
            LogEvent::Progress(p) => format!(
                "ts=\"{}\" type=progress phase={} trit_count={} percent={:.1}",
                ts, p.phase, p.trit_count, p.progress_percent
            ),
            LogEvent::FrameDecode(f) => format!(
                "ts=\"{}\" type=frame_decode len={} crc={:#06x} valid={} payload_hex={}",
                ts, f.payload_length, f.crc, f.is_valid, f.payload_hex
            ),
            LogEvent::Info { message } => format!("ts=\"{}\" level=info msg=\"{}\"", ts, message),
            LogEvent::Warn { message } => format!("ts=\"{}\" level=warn msg=\"{}\"", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("ts=\"{}\" level=error msg=\"{}\" details=\"{}\"", ts, message, d),
                None => format!("ts=\"{}\" level=error msg=\"{}\"", ts, message),
            },
        }
    }

    fn format_pretty(&self, event: &LogEvent) -> String {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match event {
            LogEvent::Progress(p) => format!(
                "[{}] PROGRESS: phase={} trits={} ({:.0}%)",
                ts, p.phase, p.trit_count, p.progress_percent
            ),
            LogEvent::FrameDecode(f) => format!(
                "[{}] FRAME: {} bytes, crc={:#06x}, valid={} | {}",
                ts,
                f.payload_length,
                f.crc,
                f.is_valid,
                f.payload_utf8.as_deref().unwrap_or(&f.payload_hex)
            ),
            LogEvent::Info { message } => format!("[{}] INFO: {}", ts, message),
            LogEvent::Warn { message } => format!("[{}] WARN: {}", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("[{}] ERROR: {} | {}", ts, message, d),
                None => format!("[{}] ERROR: {}", ts, message),
            },
        }
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
