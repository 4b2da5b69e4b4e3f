//! WFP container codec
//!
//! The textual WFP format is the primary on-disk representation of a
//! fingerprinted tree. One entry per file:
//!
//! ```text
//! file=<md5_hex>,<size_bytes>,<file_path>
//! <line>=<hex8>[,<hex8>...]
//! ```
//!
//! Physical lines never exceed 1024 bytes: overlong hash lists are broken
//! and continued under the same `<line>=` prefix, overlong headers get
//! their trailing path truncated. Parsing is tolerant; malformed hash
//! tokens and unrecognizable lines are skipped. The header's second field
//! is advisory (historically file size, documented as total lines) and
//! must not be relied on; only the md5 and the path are load-bearing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::wfp::winnow::LineFingerprints;
use crate::{PlagiError, PlagiResult};

/// Hard cap on the length of one physical line, terminator included.
pub const MAX_LINE_LEN: usize = 1024;

static FILE_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^file=([a-f0-9]{32}),([0-9]+),(.+)$").expect("header regex"));

/// Header-level view of one WFP entry, enough to drive orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WfpEntry {
    pub md5: [u8; 16],
    pub md5_hex: String,
    pub total_lines: u32,
    pub file_path: String,
}

/// Full parse of one entry: the header plus parallel hash/line vectors in
/// emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WfpFile {
    pub md5: [u8; 16],
    pub md5_hex: String,
    pub total_lines: u32,
    pub file_path: String,
    pub hashes: Vec<u32>,
    pub lines: Vec<u32>,
}

/// Serialize one file's fingerprints into WFP text.
pub fn serialize_entry(file_path: &str, data: &[u8], wfp: &LineFingerprints) -> String {
    let md5_hex = hex::encode(Md5::digest(data));
    let mut out = render_header(&md5_hex, data.len(), file_path);
    for (&line, hashes) in wfp {
        append_hash_lines(line, hashes, &mut out);
    }
    out
}

/// Re-serialize a parsed entry, e.g. to hand one file's fingerprints to
/// an out-of-process snippet scanner. The advisory second header field
/// carries whatever the parse produced.
pub fn serialize_wfp_file(wfp: &WfpFile) -> String {
    let mut grouped = LineFingerprints::new();
    for (&hash, &line) in wfp.hashes.iter().zip(wfp.lines.iter()) {
        grouped.entry(line).or_default().push(hash);
    }

    let mut out = render_header(&wfp.md5_hex, wfp.total_lines as usize, &wfp.file_path);
    for (&line, hashes) in &grouped {
        append_hash_lines(line, hashes, &mut out);
    }
    out
}

fn append_hash_lines(line: u32, hashes: &[u32], out: &mut String) {
    let mut hash_line = format!("{line}=");
    for (i, h) in hashes.iter().enumerate() {
        let token = if i < hashes.len() - 1 {
            format!("{h:08x},")
        } else {
            format!("{h:08x}\n")
        };
        // Break before the token that would push past the cap and
        // continue under the same line-number prefix.
        if hash_line.len() + token.len() > MAX_LINE_LEN {
            hash_line.push('\n');
            out.push_str(&hash_line);
            hash_line = format!("{line}=");
        }
        hash_line.push_str(&token);
    }
    out.push_str(&hash_line);
}

/// Render the `file=` header, truncating the trailing path so the whole
/// header including its terminator fits in [`MAX_LINE_LEN`].
fn render_header(md5_hex: &str, size_bytes: usize, file_path: &str) -> String {
    let header = format!("file={md5_hex},{size_bytes},{file_path}\n");
    if header.len() <= MAX_LINE_LEN {
        return header;
    }

    let overhead = header.len() - file_path.len();
    let max_path_len = MAX_LINE_LEN.saturating_sub(overhead).saturating_sub(1);
    if max_path_len == 0 || max_path_len >= file_path.len() {
        return header;
    }
    let truncated = truncate_at_char_boundary(file_path, max_path_len);
    format!("file={md5_hex},{size_bytes},{truncated}\n")
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char
/// boundary.
fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Header-only scan of a WFP file. Malformed headers are skipped.
pub fn read_headers(path: &Path) -> PlagiResult<Vec<WfpEntry>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let Some(caps) = FILE_HEADER_RE.captures(line.trim()) else {
            continue;
        };
        let md5_hex = caps[1].to_string();
        let Ok(md5_bytes) = hex::decode(&md5_hex) else {
            continue;
        };
        let Ok(total_lines) = caps[2].parse::<u32>() else {
            continue;
        };
        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&md5_bytes);
        entries.push(WfpEntry {
            md5,
            md5_hex,
            total_lines,
            file_path: caps[3].to_string(),
        });
    }

    Ok(entries)
}

/// Full parse of exactly one entry, identified by its md5 hex.
///
/// With `target_md5` empty the first entry is returned (legacy behavior).
/// Parsing stops at the next `file=` header once the target has been
/// consumed; hash lines belonging to other entries are ignored.
pub fn read_for_md5(path: &Path, target_md5: &str) -> PlagiResult<WfpFile> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut wfp = WfpFile::default();
    let mut processing_target = false;
    let mut found_target = false;

    for line in reader.lines() {
        let line = line?;

        if let Some(rest) = line.strip_prefix("file=") {
            let mut parts = rest.splitn(3, ',');
            let (Some(md5_part), Some(lines_part), Some(path_part)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };

            // One entry per call: the first header, or the requested md5.
            if found_target {
                break;
            }

            if target_md5.is_empty() || md5_part == target_md5 {
                processing_target = true;
                found_target = true;

                let md5_bytes = hex::decode(md5_part)
                    .map_err(|e| PlagiError::Parse(format!("bad md5 in header: {e}")))?;
                if md5_bytes.len() != 16 {
                    return Err(PlagiError::Parse("bad md5 length in header".into()));
                }
                wfp.md5.copy_from_slice(&md5_bytes);
                wfp.md5_hex = md5_part.to_string();
                wfp.total_lines = lines_part
                    .parse()
                    .map_err(|e| PlagiError::Parse(format!("bad line count in header: {e}")))?;
                wfp.file_path = path_part.to_string();
            } else {
                processing_target = false;
            }
        } else if processing_target {
            let Some((line_part, hashes_part)) = line.split_once('=') else {
                continue;
            };
            let Ok(line_num) = line_part.parse::<u32>() else {
                continue;
            };
            for token in hashes_part.split(',') {
                let Ok(hash) = u32::from_str_radix(token.trim(), 16) else {
                    continue;
                };
                wfp.hashes.push(hash);
                wfp.lines.push(line_num);
            }
        }
    }

    if !target_md5.is_empty() && !found_target {
        return Err(PlagiError::Parse(format!(
            "file with MD5 {target_md5} not found in WFP"
        )));
    }

    Ok(wfp)
}
