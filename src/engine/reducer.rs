//! Snippet match reduction
//!
//! Takes the bag of per-hash KB hits for one target file and reduces it to
//! a single best-candidate result: pick the candidate with the most hits,
//! enforce the minimum-hits floor, drop single-line ranges (one
//! fingerprint spans one line and is the weakest possible evidence), then
//! coalesce what is left into at most [`MAX_RANGES`] ranges by doubling
//! the merge tolerance until the count fits.

use crate::kb::{FullFileRecord, KnowledgeBase, LineRange, SnippetScan};
use crate::report::MatchResult;
use crate::{PlagiError, PlagiResult};

/// Ranges separated by fewer than this many lines are merged.
pub const RANGE_MERGE_TOLERANCE: u32 = 3;

/// Bounded output shape for downstream reporting.
const MAX_RANGES: usize = 10;

/// Drop ranges that span a single line.
pub fn filter_valid_ranges(ranges: &[LineRange]) -> Vec<LineRange> {
    ranges.iter().filter(|r| r.to > r.from).copied().collect()
}

/// Merge ranges with the given tolerance, doubling it until at most
/// [`MAX_RANGES`] ranges remain (or a single range is left).
pub fn merge_ranges(ranges: &[LineRange], tolerance: u32) -> Vec<LineRange> {
    if ranges.is_empty() {
        return Vec::new();
    }

    let mut current_tolerance = tolerance;
    loop {
        let merged = merge_with_tolerance(ranges, current_tolerance);
        tracing::debug!(
            "merge_ranges: tolerance={current_tolerance} resulted in {} ranges",
            merged.len()
        );
        if merged.len() <= MAX_RANGES || merged.len() == 1 {
            return merged;
        }
        current_tolerance *= 2;
    }
}

/// One merge pass at a fixed tolerance. Two ranges merge when the later
/// `from` is within `to + tolerance + 1` of the earlier range; the merged
/// range keeps the earlier `oss` anchor.
fn merge_with_tolerance(ranges: &[LineRange], tolerance: u32) -> Vec<LineRange> {
    if ranges.is_empty() {
        return Vec::new();
    }

    let mut sorted = ranges.to_vec();
    sorted.sort_by_key(|r| r.from);

    let mut merged = vec![sorted[0]];
    for current in sorted.into_iter().skip(1) {
        let last = merged.last_mut().expect("merged is never empty");
        if current.from <= last.to + tolerance + 1 {
            if current.to > last.to {
                last.to = current.to;
            }
        } else {
            merged.push(current);
        }
    }
    merged
}

/// Render merged ranges as `"a-b,c-d"` pairs for both sides. The
/// reference side copies each target span length onto its `oss` anchor.
pub fn format_ranges(ranges: &[LineRange]) -> (String, String) {
    let target: Vec<String> = ranges.iter().map(|r| format!("{}-{}", r.from, r.to)).collect();
    let reference: Vec<String> = ranges
        .iter()
        .map(|r| format!("{}-{}", r.oss, r.oss + (r.to - r.from)))
        .collect();
    (target.join(","), reference.join(","))
}

/// Reduce a snippet scan to the final per-file result.
///
/// The full-file short-circuit has already happened by the time this
/// runs; every insufficient-evidence outcome is an error the orchestrator
/// demotes to `no_match`.
pub fn reduce(
    scan: &SnippetScan,
    min_hits: u32,
    kb: &dyn KnowledgeBase,
) -> PlagiResult<MatchResult> {
    if scan.matches.is_empty() {
        return Err(PlagiError::Insufficient("no snippet matches found".into()));
    }

    // Max hits wins; ties keep the first candidate the index reported.
    let best = scan
        .matches
        .iter()
        .reduce(|best, m| if m.hits > best.hits { m } else { best })
        .expect("matches is non-empty");

    if best.hits < min_hits {
        return Err(PlagiError::Insufficient(format!(
            "insufficient hits: {} (minimum required: {min_hits})",
            best.hits
        )));
    }

    let valid = filter_valid_ranges(&best.ranges);
    if valid.is_empty() {
        return Err(PlagiError::Insufficient(
            "no valid ranges found (all ranges span a single line)".into(),
        ));
    }

    let record = match kb.lookup_full(&best.kb_file_md5_hex) {
        Ok(Some(record)) => record,
        Ok(None) => FullFileRecord::default(),
        Err(e) => {
            tracing::debug!("lookup for best candidate failed: {e}");
            FullFileRecord::default()
        }
    };

    let merged = merge_ranges(&valid, RANGE_MERGE_TOLERANCE);
    let (target_lines, ref_file_lines) = format_ranges(&merged);
    Ok(MatchResult::code_snippet(
        target_lines,
        ref_file_lines,
        &record,
        best.hits,
        merged,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::{IndexMatchType, MemoryKnowledgeBase, SnippetMatch};
    use crate::report::MatchType;

    fn range(from: u32, to: u32, oss: u32) -> LineRange {
        LineRange { from, to, oss }
    }

    fn scan_with(matches: Vec<SnippetMatch>) -> SnippetScan {
        SnippetScan {
            match_type: IndexMatchType::Snippet,
            matches,
        }
    }

    fn candidate(md5: &str, hits: u32, ranges: Vec<LineRange>) -> SnippetMatch {
        SnippetMatch {
            kb_file_md5_hex: md5.into(),
            hits,
            ranges,
        }
    }

    #[test]
    fn merges_overlapping_and_near_ranges() {
        let merged = merge_ranges(&[range(10, 20, 5), range(15, 25, 10)], 3);
        assert_eq!(merged, vec![range(10, 25, 5)]);

        let merged = merge_ranges(&[range(10, 20, 5), range(22, 30, 15)], 3);
        assert_eq!(merged, vec![range(10, 30, 5)]);

        let merged = merge_ranges(&[range(10, 20, 5), range(30, 40, 25)], 3);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_is_monotonic_in_tolerance() {
        let ranges: Vec<LineRange> = (0..20).map(|k| range(10 * k + 1, 10 * k + 4, k)).collect();
        let mut prev = usize::MAX;
        for tolerance in [0, 1, 3, 6, 12, 24, 48] {
            let merged = merge_with_tolerance(&ranges, tolerance);
            assert!(merged.len() <= prev, "tolerance {tolerance} grew the count");
            prev = merged.len();
        }
    }

    #[test]
    fn adaptive_merge_stays_within_bound() {
        // 25 ranges spaced five lines apart collapse once the doubled
        // tolerance bridges the gap.
        let ranges: Vec<LineRange> =
            (1..=25).map(|k| range(5 * k, 5 * k + 2, 100 + 5 * k)).collect();
        let merged = merge_ranges(&ranges, RANGE_MERGE_TOLERANCE);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0], range(5, 127, 105));

        // Widely spaced ranges still land at or under the cap.
        let sparse: Vec<LineRange> =
            (0..40).map(|k| range(1000 * k + 1, 1000 * k + 10, k)).collect();
        let merged = merge_ranges(&sparse, RANGE_MERGE_TOLERANCE);
        assert!(merged.len() <= 10, "got {} ranges", merged.len());
    }

    #[test]
    fn single_line_ranges_are_filtered() {
        let valid = filter_valid_ranges(&[range(10, 10, 5), range(20, 30, 15), range(40, 40, 35)]);
        assert_eq!(valid, vec![range(20, 30, 15)]);
    }

    #[test]
    fn formats_both_sides_of_the_ranges() {
        let (target, reference) = format_ranges(&[range(10, 20, 5), range(30, 40, 25)]);
        assert_eq!(target, "10-20,30-40");
        assert_eq!(reference, "5-15,25-35");
    }

    #[test]
    fn reduces_to_code_snippet_with_merged_ranges() {
        let mut kb = MemoryKnowledgeBase::new();
        kb.add_full(
            "e27b911d391391f94a862ebbe40ddcc0",
            FullFileRecord {
                reference_file: "zlib/inflate.c".into(),
                reference_url: "https://example.com/zlib".into(),
                instances: 12,
            },
        );
        let scan = scan_with(vec![candidate(
            "e27b911d391391f94a862ebbe40ddcc0",
            8,
            vec![range(10, 20, 100), range(22, 30, 112), range(100, 120, 200)],
        )]);

        let result = reduce(&scan, 3, &kb).expect("reduce");
        assert_eq!(result.match_type, MatchType::CodeSnippet);
        assert_eq!(result.target_lines, "10-30,100-120");
        assert_eq!(result.ref_file_lines, "100-120,200-220");
        assert_eq!(result.instances, 12);
        assert_eq!(result.hits, 8);
    }

    #[test]
    fn best_candidate_wins_and_ties_keep_first_seen() {
        let mut kb = MemoryKnowledgeBase::new();
        kb.add_full(
            "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            FullFileRecord {
                reference_file: "first-seen.c".into(),
                ..FullFileRecord::default()
            },
        );
        kb.add_full(
            "cccccccccccccccccccccccccccccccc",
            FullFileRecord {
                reference_file: "later.c".into(),
                ..FullFileRecord::default()
            },
        );
        let scan = scan_with(vec![
            candidate("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", 5, vec![range(1, 9, 1)]),
            candidate("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", 9, vec![range(1, 9, 1)]),
            candidate("cccccccccccccccccccccccccccccccc", 9, vec![range(1, 9, 1)]),
        ]);
        let result = reduce(&scan, 3, &kb).expect("reduce");
        assert_eq!(result.hits, 9);
        assert_eq!(result.reference_file, "first-seen.c");
        assert_eq!(result.match_type, MatchType::CodeSnippet);
    }

    #[test]
    fn unknown_best_candidate_yields_empty_reference_fields() {
        let kb = MemoryKnowledgeBase::new();
        let scan = scan_with(vec![candidate(
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            5,
            vec![range(1, 9, 1)],
        )]);
        let result = reduce(&scan, 3, &kb).expect("reduce");
        assert_eq!(result.instances, 0);
        assert_eq!(result.reference_file, "");
        assert_eq!(result.reference_url, "");
    }

    #[test]
    fn insufficient_hits_is_an_error() {
        let kb = MemoryKnowledgeBase::new();
        let scan = scan_with(vec![candidate(
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            2,
            vec![range(1, 9, 1)],
        )]);
        assert!(matches!(
            reduce(&scan, 3, &kb),
            Err(PlagiError::Insufficient(msg)) if msg.contains("insufficient hits")
        ));
    }

    #[test]
    fn all_single_line_ranges_is_an_error() {
        let kb = MemoryKnowledgeBase::new();
        let scan = scan_with(vec![candidate(
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            5,
            vec![range(4, 4, 1), range(9, 9, 6)],
        )]);
        assert!(matches!(reduce(&scan, 3, &kb), Err(PlagiError::Insufficient(_))));
    }

    #[test]
    fn empty_scan_is_an_error() {
        let kb = MemoryKnowledgeBase::new();
        assert!(reduce(&scan_with(Vec::new()), 3, &kb).is_err());
    }
}
