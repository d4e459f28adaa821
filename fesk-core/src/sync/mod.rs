//! Symbol-timing acquisition: the streaming preamble/Barker-13 detector
//! and the batch-oriented grid-search fallback.

pub mod preamble;
pub mod symbol_extractor;

pub use preamble::{LockRecord, PreambleDetector, SyncDetector};
pub use symbol_extractor::{ExtractedCandidate, SymbolExtractor};
