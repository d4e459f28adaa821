//! Canonical base-3 decoder: folds a trit stream MS-first into
//! an arbitrary-precision integer, then emits bytes MS-first.
//!
//! Realistic payloads exceed 64 bits of trit-accumulated magnitude (tens of
//! bytes, 160+ trits), so this uses `num_bigint::BigUint` rather than a
//! fixed-width integer.

use num_bigint::BigUint;

/// Accumulates `trits` (most-significant first) into `V = 3*V + t` and
/// returns the MS-first byte representation of `V`. A value of zero
/// returns a single zero byte.
pub fn trits_to_bytes(trits: &[u8]) -> Vec<u8> {
    let mut value = BigUint::from(0u8);
    let three = BigUint::from(3u8);
    for &t in trits {
        value = value * &three + BigUint::from(t);
    }
    let bytes = value.to_bytes_be();
    if bytes.is_empty() {
        vec![0]
    } else {
        bytes
    }
}

/// Same as [`trits_to_bytes`], but right-aligns the result into exactly
/// `width` bytes, zero-padding on the left (or truncating excess leading
/// zero bytes if the natural representation is longer than `width`).
pub fn trits_to_bytes_fixed(trits: &[u8], width: usize) -> Vec<u8> {
    let raw = trits_to_bytes(trits);
    if raw.len() == width {
        raw
    } else if raw.len() > width {
        raw[raw.len() - width..].to_vec()
    } else {
        let mut out = vec![0u8; width - raw.len()];
        out.extend(raw);
        out
    }
}

/// Inverse of [`trits_to_bytes`]: expands `V` most-significant-digit-first
/// into exactly `trit_count` base-3 digits, zero-padding on the left.
/// Used by tests to exercise the encode/decode bijection; the receiver
/// itself only ever runs the decode direction.
pub fn bytes_to_trits(bytes: &[u8], trit_count: usize) -> Vec<u8> {
    let mut value = BigUint::from_bytes_be(bytes);
    let three = BigUint::from(3u8);
    let mut trits = vec![0u8; trit_count];
    for slot in trits.iter_mut().rev() {
        let remainder = &value % &three;
        *slot = remainder.to_bytes_be().first().copied().unwrap_or(0);
        value /= &three;
    }
    trits
}
