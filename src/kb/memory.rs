//! Embedded knowledge base
//!
//! In-process KB backed by two hash maps: content MD5 → full-file record,
//! and fingerprint → index sites. Used by the test suite in place of a
//! real index, and usable by embedders that carry their own reference
//! corpus.

use std::collections::{HashMap, HashSet};

use crate::kb::{
    FullFileRecord, IndexMatchType, KnowledgeBase, LineRange, SnippetMatch, SnippetScan,
};
use crate::wfp::winnow::LineFingerprints;
use crate::wfp::WfpFile;
use crate::PlagiResult;

/// Matched target lines this close together collapse into one reported
/// range; wider gaps start a new range.
const RANGE_GAP: u32 = 4;

/// Where a fingerprint occurs inside the indexed corpus.
#[derive(Debug, Clone)]
struct SnippetSite {
    kb_file_md5_hex: String,
    line: u32,
}

/// In-memory [`KnowledgeBase`] implementation.
#[derive(Debug, Default)]
pub struct MemoryKnowledgeBase {
    full: HashMap<String, FullFileRecord>,
    snippets: HashMap<u32, Vec<SnippetSite>>,
}

impl MemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the full-file record returned for a content hash.
    pub fn add_full(&mut self, md5_hex: &str, record: FullFileRecord) {
        self.full.insert(md5_hex.to_string(), record);
    }

    /// Register one fingerprint occurrence of a KB file.
    pub fn add_snippet(&mut self, hash: u32, kb_file_md5_hex: &str, line: u32) {
        self.snippets.entry(hash).or_default().push(SnippetSite {
            kb_file_md5_hex: kb_file_md5_hex.to_string(),
            line,
        });
    }

    /// Index a whole fingerprinted KB file.
    pub fn index_file(&mut self, kb_file_md5_hex: &str, fingerprints: &LineFingerprints) {
        for (&line, hashes) in fingerprints {
            for &hash in hashes {
                self.add_snippet(hash, kb_file_md5_hex, line);
            }
        }
    }
}

impl KnowledgeBase for MemoryKnowledgeBase {
    fn lookup_full(&self, md5_hex: &str) -> PlagiResult<Option<FullFileRecord>> {
        Ok(self.full.get(md5_hex).cloned())
    }

    fn scan_snippets(&self, wfp: &WfpFile) -> PlagiResult<SnippetScan> {
        // Per KB file, in first-seen order: the distinct fingerprints that
        // matched and the (target line, KB line) evidence pairs.
        let mut order: Vec<String> = Vec::new();
        let mut distinct: HashMap<String, HashSet<u32>> = HashMap::new();
        let mut evidence: HashMap<String, Vec<(u32, u32)>> = HashMap::new();

        for (&hash, &target_line) in wfp.hashes.iter().zip(wfp.lines.iter()) {
            let Some(sites) = self.snippets.get(&hash) else {
                continue;
            };
            let mut seen_files: HashSet<&str> = HashSet::new();
            for site in sites {
                // One emission counts once per KB file, at its first site.
                if !seen_files.insert(site.kb_file_md5_hex.as_str()) {
                    continue;
                }
                let key = site.kb_file_md5_hex.clone();
                if !distinct.contains_key(&key) {
                    order.push(key.clone());
                }
                distinct.entry(key.clone()).or_default().insert(hash);
                evidence.entry(key).or_default().push((target_line, site.line));
            }
        }

        let matches: Vec<SnippetMatch> = order
            .into_iter()
            .map(|md5_hex| {
                let hits = distinct[&md5_hex].len() as u32;
                let ranges = coalesce_evidence(&mut evidence.remove(&md5_hex).unwrap_or_default());
                SnippetMatch {
                    kb_file_md5_hex: md5_hex,
                    hits,
                    ranges,
                }
            })
            .collect();

        let match_type = if self.full.contains_key(&wfp.md5_hex) {
            IndexMatchType::File
        } else if matches.is_empty() {
            IndexMatchType::None
        } else {
            IndexMatchType::Snippet
        };

        Ok(SnippetScan { match_type, matches })
    }
}

/// Turn (target line, KB line) evidence pairs into reported ranges:
/// ascending target order, grouped while the gap stays within
/// [`RANGE_GAP`], each range anchored at the KB line of its first hit.
fn coalesce_evidence(pairs: &mut Vec<(u32, u32)>) -> Vec<LineRange> {
    if pairs.is_empty() {
        return Vec::new();
    }
    pairs.sort_unstable();

    let mut ranges: Vec<LineRange> = Vec::new();
    let (first_target, first_kb) = pairs[0];
    let mut current = LineRange {
        from: first_target,
        to: first_target,
        oss: first_kb,
    };

    for &(target_line, kb_line) in pairs.iter().skip(1) {
        if target_line <= current.to + RANGE_GAP {
            current.to = current.to.max(target_line);
        } else {
            ranges.push(current);
            current = LineRange {
                from: target_line,
                to: target_line,
                oss: kb_line,
            };
        }
    }
    ranges.push(current);
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfp::winnow::fingerprint_bytes;

    fn kb_source() -> Vec<u8> {
        (0..60)
            .map(|i| format!("int reference_symbol_{i} = lookup_table[{i}] ^ rotate({i});\n"))
            .collect::<String>()
            .into_bytes()
    }

    fn wfp_from(fingerprints: &LineFingerprints, md5_hex: &str) -> WfpFile {
        let mut wfp = WfpFile {
            md5_hex: md5_hex.to_string(),
            ..WfpFile::default()
        };
        for (&line, hashes) in fingerprints {
            for &hash in hashes {
                wfp.hashes.push(hash);
                wfp.lines.push(line);
            }
        }
        wfp
    }

    #[test]
    fn finds_indexed_file_with_full_hit_count() {
        let prints = fingerprint_bytes(&kb_source());
        let total: usize = prints.values().map(|v| v.len()).sum();
        assert!(total > 3, "fixture must produce several fingerprints");

        let mut kb = MemoryKnowledgeBase::new();
        kb.index_file("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", &prints);

        let scan = kb
            .scan_snippets(&wfp_from(&prints, "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"))
            .expect("scan");
        assert_eq!(scan.match_type, IndexMatchType::Snippet);
        assert_eq!(scan.matches.len(), 1);

        let m = &scan.matches[0];
        assert_eq!(m.kb_file_md5_hex, "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let distinct: HashSet<u32> = prints.values().flatten().copied().collect();
        assert_eq!(m.hits as usize, distinct.len());
        assert!(!m.ranges.is_empty());
        assert!(m.ranges.iter().any(|r| r.to > r.from));
    }

    #[test]
    fn unknown_fingerprints_produce_no_matches() {
        let kb = MemoryKnowledgeBase::new();
        let wfp = WfpFile {
            md5_hex: "cccccccccccccccccccccccccccccccc".into(),
            hashes: vec![0xdeadbeef, 0x12345678],
            lines: vec![1, 2],
            ..WfpFile::default()
        };
        let scan = kb.scan_snippets(&wfp).expect("scan");
        assert_eq!(scan.match_type, IndexMatchType::None);
        assert!(scan.matches.is_empty());
    }

    #[test]
    fn full_record_signals_file_collision() {
        let mut kb = MemoryKnowledgeBase::new();
        kb.add_full(
            "dddddddddddddddddddddddddddddddd",
            FullFileRecord {
                reference_file: "libfoo/hello.c".into(),
                reference_url: "https://example.com/libfoo".into(),
                instances: 42,
            },
        );

        let record = kb
            .lookup_full("dddddddddddddddddddddddddddddddd")
            .expect("lookup")
            .expect("record");
        assert_eq!(record.instances, 42);

        let wfp = WfpFile {
            md5_hex: "dddddddddddddddddddddddddddddddd".into(),
            ..WfpFile::default()
        };
        let scan = kb.scan_snippets(&wfp).expect("scan");
        assert_eq!(scan.match_type, IndexMatchType::File);
    }

    #[test]
    fn distant_evidence_splits_into_separate_ranges() {
        let mut pairs = vec![(10, 100), (12, 102), (50, 200), (52, 202)];
        let ranges = coalesce_evidence(&mut pairs);
        assert_eq!(
            ranges,
            vec![
                LineRange { from: 10, to: 12, oss: 100 },
                LineRange { from: 50, to: 52, oss: 200 },
            ]
        );
    }
}
