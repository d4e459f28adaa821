//! Digital signal processing primitives: the Goertzel bank and the
//! windowed tone detector built on top of it.

pub mod goertzel;
pub mod tone_detector;

pub use goertzel::{goertzel_bank, goertzel_magnitude, GoertzelResult};
pub use tone_detector::{AudioBuffer, SymbolCandidate, ToneDetector};
