//! Scan orchestration
//!
//! Drives the per-file pipeline over a bounded worker pool: full-file
//! lookup, then snippet scan and match reduction on a miss. Failures are
//! isolated per entry; the only errors that abort a scan are setup-time
//! (unreadable input, no temp WFP, pool construction).

pub mod progress;
pub mod reducer;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tempfile::NamedTempFile;

use crate::kb::KnowledgeBase;
use crate::report::MatchResult;
use crate::wfp::{self, codec, WfpEntry};
use crate::{PlagiError, PlagiResult};

use progress::ProgressTracker;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Knowledge-base name handed to the KB adapter tooling.
    pub kb_name: String,
    /// Minimum hits for a valid snippet match.
    pub min_hits: u32,
    /// Worker-pool size; values below 1 are clamped to 1.
    pub threads: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            kb_name: "osskb-core".into(),
            min_hits: 3,
            threads: 3,
        }
    }
}

/// Scan results keyed by target path (sorted for deterministic output).
/// Every key maps to a one-element list; the list shape is retained for
/// forward compatibility.
pub type ScanMap = BTreeMap<String, Vec<MatchResult>>;

/// The scan orchestrator.
pub struct ScanEngine {
    config: ScanConfig,
    kb: Arc<dyn KnowledgeBase>,
}

impl ScanEngine {
    pub fn new(config: ScanConfig, kb: Arc<dyn KnowledgeBase>) -> Self {
        Self { config, kb }
    }

    /// Scan a file, directory, or prebuilt `.wfp` container.
    ///
    /// Non-WFP input is fingerprinted into a temporary WFP first; the
    /// temp file is removed on every exit path. One
    /// `progress:<done>/<total>` line goes to `progress` per processed
    /// entry (the fingerprinting pass reports its own counter first).
    pub fn scan(
        &self,
        input: &Path,
        mut progress: Option<Box<dyn Write + Send>>,
    ) -> PlagiResult<ScanMap> {
        let meta = std::fs::metadata(input)?;

        let mut _temp: Option<NamedTempFile> = None;
        let wfp_path: PathBuf = if meta.is_file() && has_wfp_extension(input) {
            input.to_path_buf()
        } else {
            let text = if meta.is_dir() {
                let sink = progress.as_deref_mut().map(|w| w as &mut dyn Write);
                wfp::generate_from_dir(input, sink)?
            } else {
                wfp::generate_from_file(input)?
            };
            let mut tmp = NamedTempFile::new()?;
            tmp.write_all(text.as_bytes())?;
            tmp.flush()?;
            let path = tmp.path().to_path_buf();
            _temp = Some(tmp);
            path
        };

        let entries = codec::read_headers(&wfp_path)?;
        let threads = self.config.threads.max(1);
        tracing::info!("processing {} files with {threads} threads", entries.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| PlagiError::Scan(format!("worker pool: {e}")))?;

        let results: Mutex<ScanMap> = Mutex::new(ScanMap::new());
        let tracker = ProgressTracker::new(entries.len(), progress);

        pool.install(|| {
            entries.par_iter().for_each(|entry| {
                let result = match self.process_entry(entry, &wfp_path) {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::debug!("{}: demoted to no_match: {e}", entry.file_path);
                        MatchResult::no_match()
                    }
                };

                {
                    let mut map = results.lock().expect("results mutex poisoned");
                    // Duplicate paths in one WFP get disambiguated by md5.
                    let mut key = entry.file_path.clone();
                    if map.contains_key(&key) {
                        key = format!("{} [{}]", entry.file_path, entry.md5_hex);
                    }
                    map.insert(key, vec![result]);
                }
                tracker.tick();
            });
        });

        Ok(results.into_inner().expect("results mutex poisoned"))
    }

    /// The sequential per-file pipeline one worker runs.
    fn process_entry(&self, entry: &WfpEntry, wfp_path: &Path) -> PlagiResult<MatchResult> {
        tracing::debug!("checking full MD5 match for {}", entry.file_path);
        let full = self.kb.lookup_full(&entry.md5_hex).unwrap_or_else(|e| {
            tracing::debug!("full-file lookup failed, trying snippets: {e}");
            None
        });
        if let Some(record) = full {
            return Ok(MatchResult::full_file(&record));
        }

        tracing::debug!("no full match, parsing WFP for snippet matching");
        let parsed = codec::read_for_md5(wfp_path, &entry.md5_hex)?;
        let scan = self.kb.scan_snippets(&parsed)?;
        reducer::reduce(&scan, self.config.min_hits, self.kb.as_ref())
    }
}

/// Case-insensitive `.wfp` extension check.
pub fn has_wfp_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wfp"))
        .unwrap_or(false)
}
