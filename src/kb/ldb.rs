//! Out-of-process KB adapter
//!
//! Talks to a locally installed LDB knowledge base through two external
//! programs, shelling out the way the indexer's own tooling does:
//!
//! - full-file lookup: `echo select from <kb>/file-url key <md5> csv hex 8
//!   | ldb | head -n 1`, answering CSV `key,file,url,instances`;
//! - snippet scan: a `wfp-scanner` helper that consumes one file's WFP
//!   text and answers one `match:<type>` line followed by one line per
//!   candidate, `md5_hex,hits,from-to-oss[;from-to-oss...]`.
//!
//! Both programs are probed once per adapter; a missing binary surfaces
//! as a scan/lookup error, never a panic. Falls back gracefully when the
//! helper is absent.

use std::io::Write;
use std::process::Command;

use crate::kb::{
    FullFileRecord, IndexMatchType, KnowledgeBase, LineRange, SnippetMatch, SnippetScan,
};
use crate::wfp::{codec, WfpFile};
use crate::{PlagiError, PlagiResult};

const SNIPPET_SCANNER_BIN: &str = "wfp-scanner";

/// [`KnowledgeBase`] backed by the `ldb` store and its snippet index.
#[derive(Debug, Clone)]
pub struct LdbKnowledgeBase {
    kb_name: String,
}

impl LdbKnowledgeBase {
    pub fn new(kb_name: &str) -> Self {
        Self {
            kb_name: kb_name.to_string(),
        }
    }

    /// Whether the `ldb` binary resolves on PATH.
    pub fn is_available() -> bool {
        Command::new("sh")
            .arg("-c")
            .arg("command -v ldb")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Whether the snippet-scan helper resolves on PATH.
    pub fn snippet_index_available() -> bool {
        Command::new("sh")
            .arg("-c")
            .arg(format!("command -v {SNIPPET_SCANNER_BIN}"))
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl KnowledgeBase for LdbKnowledgeBase {
    fn lookup_full(&self, md5_hex: &str) -> PlagiResult<Option<FullFileRecord>> {
        let query = format!(
            "echo select from {}/file-url key {} csv hex 8 | ldb | head -n 1",
            self.kb_name, md5_hex
        );
        let output = Command::new("sh")
            .arg("-c")
            .arg(&query)
            .output()
            .map_err(|e| PlagiError::Lookup(format!("ldb query failed: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(line) = stdout.lines().next().map(str::trim).filter(|l| !l.is_empty()) else {
            return Ok(None);
        };

        // CSV: key, file, url, instances. Anything shorter is a miss.
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 4 {
            return Ok(None);
        }
        Ok(Some(FullFileRecord {
            reference_file: fields[1].to_string(),
            reference_url: fields[2].to_string(),
            instances: fields[3].trim().parse().unwrap_or(0),
        }))
    }

    fn scan_snippets(&self, wfp: &WfpFile) -> PlagiResult<SnippetScan> {
        if wfp.hashes.is_empty() {
            return Err(PlagiError::Scan("no hashes in WFP data".into()));
        }
        if !Self::snippet_index_available() {
            return Err(PlagiError::Scan(format!(
                "{SNIPPET_SCANNER_BIN} not found on PATH"
            )));
        }

        let mut tmp = tempfile::NamedTempFile::new()?;
        tmp.write_all(codec::serialize_wfp_file(wfp).as_bytes())?;
        tmp.flush()?;

        let output = Command::new(SNIPPET_SCANNER_BIN)
            .arg("-oss-db-name")
            .arg(&self.kb_name)
            .arg(tmp.path())
            .output()
            .map_err(|e| PlagiError::Scan(format!("{SNIPPET_SCANNER_BIN} failed: {e}")))?;
        if !output.status.success() {
            return Err(PlagiError::Scan(format!(
                "{SNIPPET_SCANNER_BIN} exited with {}",
                output.status
            )));
        }

        Ok(parse_scan_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse the helper's report. Unrecognizable lines are skipped so helper
/// diagnostics on stdout cannot break a scan.
fn parse_scan_output(text: &str) -> SnippetScan {
    let mut scan = SnippetScan::empty();

    for line in text.lines().map(str::trim) {
        if let Some(kind) = line.strip_prefix("match:") {
            scan.match_type = match kind.trim() {
                "file" => IndexMatchType::File,
                "snippet" => IndexMatchType::Snippet,
                "binary" => IndexMatchType::Binary,
                _ => IndexMatchType::None,
            };
            continue;
        }
        if let Some(m) = parse_match_line(line) {
            scan.matches.push(m);
        }
    }

    scan
}

fn parse_match_line(line: &str) -> Option<SnippetMatch> {
    let mut fields = line.splitn(3, ',');
    let md5_hex = fields.next()?.trim();
    if md5_hex.len() != 32 || !md5_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let hits: u32 = fields.next()?.trim().parse().ok()?;

    let mut ranges = Vec::new();
    if let Some(spans) = fields.next() {
        for span in spans.split(';') {
            let mut parts = span.trim().splitn(3, '-');
            let (Some(from), Some(to), Some(oss)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let (Ok(from), Ok(to), Ok(oss)) = (from.parse(), to.parse(), oss.parse()) else {
                continue;
            };
            ranges.push(LineRange { from, to, oss });
        }
    }

    Some(SnippetMatch {
        kb_file_md5_hex: md5_hex.to_lowercase(),
        hits,
        ranges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_helper_report() {
        let text = "Parsing WFP file: /tmp/x.wfp\n\
                    match:snippet\n\
                    e27b911d391391f94a862ebbe40ddcc0,8,10-20-100;22-30-112\n\
                    ffffffffffffffffffffffffffffffff,2,5-5-9\n";
        let scan = parse_scan_output(text);
        assert_eq!(scan.match_type, IndexMatchType::Snippet);
        assert_eq!(scan.matches.len(), 2);
        assert_eq!(scan.matches[0].hits, 8);
        assert_eq!(
            scan.matches[0].ranges,
            vec![
                LineRange { from: 10, to: 20, oss: 100 },
                LineRange { from: 22, to: 30, oss: 112 },
            ]
        );
        assert_eq!(scan.matches[1].ranges, vec![LineRange { from: 5, to: 5, oss: 9 }]);
    }

    #[test]
    fn skips_diagnostics_and_malformed_lines() {
        let text = "Scanning snippets...\n\
                    match:none\n\
                    short,1\n\
                    nothexnothexnothexnothexnothexno,1,1-2-3\n\
                    e27b911d391391f94a862ebbe40ddcc0,notanumber,1-2-3\n";
        let scan = parse_scan_output(text);
        assert_eq!(scan.match_type, IndexMatchType::None);
        assert!(scan.matches.is_empty());
    }

    #[test]
    fn match_line_without_ranges_parses() {
        let m = parse_match_line("e27b911d391391f94a862ebbe40ddcc0,3").expect("match");
        assert_eq!(m.hits, 3);
        assert!(m.ranges.is_empty());
    }
}
