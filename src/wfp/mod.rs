//! Winnowing fingerprint engine — normalization, winnowing, the WFP
//! container codec, and file selection.
//!
//! The module surface mirrors the two ways a WFP comes into existence:
//! [`generate_from_file`] for a single file and [`generate_from_dir`] for
//! a selected tree, both returning the serialized WFP text that the codec
//! can read back.

pub mod codec;
pub mod normalize;
pub mod selector;
pub mod winnow;

pub use codec::{WfpEntry, WfpFile, MAX_LINE_LEN};
pub use winnow::{GRAM, WINDOW};

use std::io::Write;
use std::path::Path;

use crate::{PlagiError, PlagiResult};

/// Fingerprint one file into WFP text (header plus hash lines).
pub fn fingerprint_file(path: &Path) -> PlagiResult<String> {
    let data = std::fs::read(path)?;
    let wfp = winnow::fingerprint_bytes(&data);
    Ok(codec::serialize_entry(&path.to_string_lossy(), &data, &wfp))
}

/// Generate the WFP for a single file, enforcing the same eligibility
/// rules the selector applies during a tree walk.
pub fn generate_from_file(path: &Path) -> PlagiResult<String> {
    let meta = std::fs::metadata(path)?;
    if meta.is_dir() {
        return Err(PlagiError::Input(
            "path is a directory, use generate_from_dir instead".into(),
        ));
    }
    if meta.len() <= selector::MIN_FILE_SIZE {
        return Err(PlagiError::Input(format!(
            "file too small (must be > {} bytes)",
            selector::MIN_FILE_SIZE
        )));
    }
    if selector::has_filtered_ext(path) {
        return Err(PlagiError::Input(format!(
            "file extension of {} is in the filter list",
            path.display()
        )));
    }
    if selector::has_hash_only_ext(path) {
        return Err(PlagiError::Input(format!(
            "file extension of {} is eligible for full-file matching only",
            path.display()
        )));
    }

    fingerprint_file(path)
}

/// Generate the WFP for every eligible file under `root`, reporting one
/// `progress:<done>/<total>` line to `progress` after each file.
pub fn generate_from_dir(root: &Path, mut progress: Option<&mut dyn Write>) -> PlagiResult<String> {
    let meta = std::fs::metadata(root)?;
    if !meta.is_dir() {
        return Err(PlagiError::Input(
            "path is not a directory, use generate_from_file instead".into(),
        ));
    }

    let files = selector::select_files(root);
    if files.is_empty() {
        return Err(PlagiError::Input("no valid files found in directory".into()));
    }

    let total = files.len();
    let mut result = String::new();
    for (i, file) in files.iter().enumerate() {
        match fingerprint_file(file) {
            Ok(wfp) => result.push_str(&wfp),
            Err(e) => tracing::debug!("skipping {}: {e}", file.display()),
        }
        if let Some(w) = progress.as_deref_mut() {
            let _ = writeln!(w, "progress:{}/{}", i + 1, total);
        }
    }

    if result.is_empty() {
        return Err(PlagiError::Input("failed to generate any fingerprints".into()));
    }

    Ok(result)
}
