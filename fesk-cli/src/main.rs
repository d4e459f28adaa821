mod config;
mod logging;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use std::path::PathBuf;

use config::CliConfig;
use fesk_core::decoder::Decoder;
use fesk_core::wav;
use indicatif::{ProgressBar, ProgressStyle};
use logging::{FrameDecodeEvent, LogEvent, ProgressEvent, StructuredLogger};

#[derive(Parser, Debug)]
#[command(author, version, about = "FESK (Harmonic Triad 3-FSK) acoustic decoder", long_about = None)]
struct Cli {
    /// WAV file to decode
    wav: PathBuf,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose diagnostic output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let config = if let Some(config_path) = &args.config {
        CliConfig::from_file(config_path).wrap_err_with(|| format!("Failed to load config from {}", config_path))?
    } else {
        CliConfig::default()
    };

    let mut logger = StructuredLogger::new(config.terminal.logging.clone())?;

    logger.log(LogEvent::Info {
        message: format!("decoding {}", args.wav.display()),
    })?;

    let mut buffer = wav::read_wav(&args.wav).wrap_err_with(|| format!("Failed to read WAV file {}", args.wav.display()))?;

    if config.terminal.normalize {
        let report = wav::normalize_peak(&mut buffer);
        logger.log(LogEvent::Info {
            message: format!(
                "normalized: gain={:.2}x pre_peak={:.4} post_peak={:.4}",
                report.gain_applied, report.pre_peak, report.post_peak
            ),
        })?;
    }

    let onset_ms = Decoder::find_transmission_start(&buffer.samples, buffer.sample_rate_hz, config.terminal.energy_threshold);
    if let Some(onset_ms) = onset_ms {
        logger.log(LogEvent::Info {
            message: format!("transmission onset detected at {:.1}ms", onset_ms),
        })?;
    } else {
        logger.log(LogEvent::Warn {
            message: "no onset above energy threshold; decoding from start of file".to_string(),
        })?;
    }

    let mut decoder = Decoder::new(
        config.frame.clone(),
        config.goertzel,
        config.detector,
        config.sync,
        config.voting,
        config.adaptive_timing.clone(),
    );

    let progress_bar = ProgressBar::new(100);
    progress_bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let chunk_len = (buffer.sample_rate_hz as f64 * config.terminal.chunk_ms / 1000.0).round() as usize;
    let chunk_len = chunk_len.max(1);

    let mut offset = 0usize;
    let mut decoded_frame = None;
    while offset < buffer.samples.len() {
        let end = (offset + chunk_len).min(buffer.samples.len());
        let chunk = fesk_core::dsp::AudioBuffer::new(
            buffer.samples[offset..end].to_vec(),
            buffer.sample_rate_hz,
            buffer.start_time_ms + 1000.0 * offset as f64 / buffer.sample_rate_hz as f64,
        );

        if let Some(frame) = decoder.process_audio(&chunk) {
            decoded_frame = Some(frame);
            break;
        }

        let progress = decoder.progress();
        progress_bar.set_position(progress.progress_percent.round() as u64);
        progress_bar.set_message(format!("{:?}", progress.phase));

        if args.verbose {
            logger.log(LogEvent::Progress(ProgressEvent::from_progress(progress)))?;
        }

        offset = end;
    }
    progress_bar.finish_and_clear();

    if decoded_frame.is_none() {
        logger.log(LogEvent::Info {
            message: "streaming pipeline found no lock; retrying with grid-search fallback".to_string(),
        })?;
        match decoder.recover_with_fallback(&buffer) {
            Ok(frame) => decoded_frame = Some(frame),
            Err(err) => {
                logger.log(LogEvent::Warn {
                    message: format!("fallback extraction failed: {}", err),
                })?;
            }
        }
    }

    match decoded_frame {
        Some(frame) => {
            let payload_utf8 = String::from_utf8(frame.payload.clone()).ok();
            let payload_hex = frame.payload.iter().map(|b| format!("{:02x}", b)).collect::<String>();

            logger.log(LogEvent::FrameDecode(FrameDecodeEvent {
                timestamp: chrono::Utc::now(),
                payload_length: frame.payload_length,
                payload_utf8: payload_utf8.clone(),
                payload_hex,
                crc: frame.crc,
                is_valid: frame.is_valid,
            }))?;

            if frame.is_valid {
                logger.log(LogEvent::Info {
                    message: format!(
                        "recovered message: {}",
                        payload_utf8.unwrap_or_else(|| "<non-utf8 payload>".to_string())
                    ),
                })?;
            } else {
                logger.log(LogEvent::Warn {
                    message: "frame assembled but CRC did not validate".to_string(),
                })?;
                std::process::exit(1);
            }
        }
        None => {
            logger.log(LogEvent::Error {
                message: "no frame recovered from input".to_string(),
                details: Some(format!("decoded after {:.2}s of CLI wall time", logger.elapsed())),
            })?;
            std::process::exit(1);
        }
    }

    Ok(())
}
