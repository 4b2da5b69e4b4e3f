//! Winnowing fingerprinter
//!
//! Converts raw file bytes into a line-addressed fingerprint map in one
//! pass: normalize each byte, CRC32C every 30-byte gram, slide a 64-hash
//! window over the gram hashes and select the window minimum, then emit a
//! second CRC32C over the little-endian bytes of that minimum. The second
//! hash de-correlates emissions so adjacent near-duplicate grams produce
//! visibly different fingerprints.
//!
//! Two rules here are load-bearing for compatibility with existing WFP
//! producers:
//!
//! - the window minimum is selected with a `<=` scan, so the *rightmost*
//!   of equal minima wins;
//! - consecutive emissions are de-duplicated on the pre-double-hash
//!   minimum, not on the emitted value.

use std::collections::BTreeMap;

use crate::wfp::normalize::normalize;

/// Gram size: contiguous normalized bytes hashed into one CRC32C value.
pub const GRAM: usize = 30;
/// Window size: consecutive gram hashes from which one minimum is selected.
pub const WINDOW: usize = 64;

/// Fingerprints grouped per target line, ascending line order.
pub type LineFingerprints = BTreeMap<u32, Vec<u32>>;

/// Rightmost minimum: ties update the selected index, so the last equal
/// value is kept. Leftmost selection is not equivalent.
fn min_hash(hashes: &[u32]) -> u32 {
    let mut index_min = 0;
    for (i, &h) in hashes.iter().enumerate() {
        if h <= hashes[index_min] {
            index_min = i;
        }
    }
    hashes[index_min]
}

/// Fingerprint a byte buffer into a `line → [fingerprint]` map.
///
/// The line counter increments on every raw `\n` before normalization, so
/// emissions are attributed to the line being read when the window filled.
/// Partial gram or hash windows at EOF are not flushed.
pub fn fingerprint_bytes(data: &[u8]) -> LineFingerprints {
    let mut wfp = LineFingerprints::new();
    let mut gram_window: Vec<u8> = Vec::with_capacity(GRAM);
    let mut hash_window: Vec<u32> = Vec::with_capacity(WINDOW);
    let mut line: u32 = 1;
    let mut last: u32 = 0;

    for &raw in data {
        if raw == b'\n' {
            line += 1;
        }
        let b = normalize(raw);
        if b == 0 {
            continue;
        }

        gram_window.push(b);
        if gram_window.len() >= GRAM {
            hash_window.push(crc32c::crc32c(&gram_window));
            if hash_window.len() >= WINDOW {
                let m = min_hash(&hash_window);
                if m != last {
                    last = m;
                    wfp.entry(line)
                        .or_default()
                        .push(crc32c::crc32c(&m.to_le_bytes()));
                }
                hash_window.remove(0);
            }
            gram_window.remove(0);
        }
    }

    wfp
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Enough distinct content to fill the 64-hash window several times.
    fn sample_source() -> Vec<u8> {
        let mut buf = Vec::new();
        for i in 0..80 {
            buf.extend_from_slice(
                format!("fn compute_{i}(value: u32) -> u32 {{ value.wrapping_mul({i}) }}\n")
                    .as_bytes(),
            );
        }
        buf
    }

    #[test]
    fn emits_fingerprints_for_nontrivial_input() {
        let wfp = fingerprint_bytes(&sample_source());
        assert!(!wfp.is_empty());
        let total: usize = wfp.values().map(|v| v.len()).sum();
        assert!(total > 4, "expected several emissions, got {total}");
        assert!(wfp.keys().all(|&line| line >= 1));
    }

    #[test]
    fn short_input_emits_nothing() {
        // Fewer than GRAM + WINDOW - 1 normalized bytes can never fill the
        // hash window.
        let wfp = fingerprint_bytes(b"short input");
        assert!(wfp.is_empty());
    }

    #[test]
    fn depends_only_on_normalized_bytes() {
        // Case changes and skipped punctuation must not alter the
        // fingerprints, only the line attribution can move.
        let a = "someidentifier".repeat(40);
        let b = "SOMEIDENTIFIER".repeat(40);
        let wfp_a = fingerprint_bytes(a.as_bytes());
        let wfp_b = fingerprint_bytes(b.as_bytes());
        let flat_a: Vec<u32> = wfp_a.values().flatten().copied().collect();
        let flat_b: Vec<u32> = wfp_b.values().flatten().copied().collect();
        assert_eq!(flat_a, flat_b);
    }

    #[test]
    fn deterministic_across_runs() {
        let data = sample_source();
        assert_eq!(fingerprint_bytes(&data), fingerprint_bytes(&data));
    }

    #[test]
    fn rightmost_minimum_wins() {
        // Two equal minima in one window: the scan must keep the later
        // index. Checked indirectly through min_hash on a crafted slice.
        assert_eq!(min_hash(&[5, 1, 9, 1, 7]), 1);
        let mut idx = 0;
        let hashes = [5u32, 1, 9, 1, 7];
        for (i, &h) in hashes.iter().enumerate() {
            if h <= hashes[idx] {
                idx = i;
            }
        }
        assert_eq!(idx, 3, "tie must resolve to the rightmost position");
    }

    #[test]
    fn consecutive_duplicate_minima_are_suppressed() {
        // A long constant tail keeps the window minimum stable; the de-dup
        // rule must collapse those emissions to a single fingerprint.
        let mut data = sample_source();
        data.extend(std::iter::repeat(b'q').take(4096));
        let wfp = fingerprint_bytes(&data);
        let flat: Vec<u32> = wfp.values().flatten().copied().collect();
        for pair in flat.windows(2) {
            assert_ne!(pair[0], pair[1], "consecutive emissions must differ");
        }
    }
}
