//! Receive-chain library for the FESK (Harmonic Triad 3-FSK) acoustic
//! data link: Goertzel tone detection, preamble/sync acquisition, and
//! frame assembly over a three-tone trit alphabet.

pub mod config;
pub mod decoder;
pub mod dsp;
pub mod errors;
pub mod logging;
pub mod sync;
pub mod wav;

pub use config::FrameConfig;
pub use decoder::{Decoder, DecoderProgress, Frame, PhaseKind};
pub use errors::{FeskError, Result};
