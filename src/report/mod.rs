//! Scan result model and report rendering
//!
//! One [`MatchResult`] per target file, in exactly the JSON shape
//! downstream consumers expect. `hits` and `ranges` are working data for
//! the reducer and never serialize.

pub mod json;

use serde::{Deserialize, Serialize};

use crate::kb::{FullFileRecord, LineRange};

/// How a target file matched the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    FullFile,
    CodeSnippet,
    NoMatch,
}

/// Per-file outcome of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_type: MatchType,
    /// Comma-joined `a-b` spans on the target side; empty unless this is
    /// a snippet match.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub target_lines: String,
    /// Corresponding spans in the reference file.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub ref_file_lines: String,
    pub instances: u32,
    pub reference_url: String,
    pub reference_file: String,
    #[serde(skip)]
    pub hits: u32,
    #[serde(skip)]
    pub ranges: Vec<LineRange>,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self {
            match_type: MatchType::NoMatch,
            target_lines: String::new(),
            ref_file_lines: String::new(),
            instances: 0,
            reference_url: String::new(),
            reference_file: String::new(),
            hits: 0,
            ranges: Vec::new(),
        }
    }

    pub fn full_file(record: &FullFileRecord) -> Self {
        Self {
            match_type: MatchType::FullFile,
            instances: record.instances,
            reference_url: record.reference_url.clone(),
            reference_file: record.reference_file.clone(),
            ..Self::no_match()
        }
    }

    pub fn code_snippet(
        target_lines: String,
        ref_file_lines: String,
        record: &FullFileRecord,
        hits: u32,
        ranges: Vec<LineRange>,
    ) -> Self {
        Self {
            match_type: MatchType::CodeSnippet,
            target_lines,
            ref_file_lines,
            instances: record.instances,
            reference_url: record.reference_url.clone(),
            reference_file: record.reference_file.clone(),
            hits,
            ranges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_serializes_without_line_fields() {
        let json = serde_json::to_value(MatchResult::no_match()).expect("json");
        assert_eq!(json["match_type"], "no_match");
        assert_eq!(json["instances"], 0);
        assert_eq!(json["reference_url"], "");
        assert!(json.get("target_lines").is_none());
        assert!(json.get("ref_file_lines").is_none());
        assert!(json.get("hits").is_none());
        assert!(json.get("ranges").is_none());
    }

    #[test]
    fn snippet_serializes_line_fields_but_not_working_data() {
        let record = FullFileRecord {
            reference_file: "zlib/inflate.c".into(),
            reference_url: "https://example.com/zlib".into(),
            instances: 7,
        };
        let result = MatchResult::code_snippet(
            "10-30,100-120".into(),
            "100-120,200-220".into(),
            &record,
            8,
            vec![LineRange { from: 10, to: 30, oss: 100 }],
        );
        let json = serde_json::to_value(&result).expect("json");
        assert_eq!(json["match_type"], "code_snippet");
        assert_eq!(json["target_lines"], "10-30,100-120");
        assert_eq!(json["ref_file_lines"], "100-120,200-220");
        assert_eq!(json["instances"], 7);
        assert!(json.get("hits").is_none());
        assert!(json.get("ranges").is_none());
    }

    #[test]
    fn full_file_carries_the_kb_record() {
        let record = FullFileRecord {
            reference_file: "libfoo/hello.c".into(),
            reference_url: "https://example.com/libfoo".into(),
            instances: 42,
        };
        let result = MatchResult::full_file(&record);
        assert_eq!(result.match_type, MatchType::FullFile);
        assert_eq!(result.instances, 42);
        assert!(result.target_lines.is_empty());
    }
}
