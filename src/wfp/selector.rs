//! File selection for fingerprinting
//!
//! Walks a target tree and keeps only the files worth winnowing: hidden
//! paths, tiny files, minified artifacts, and two classes of extensions
//! are skipped. `FILTER_EXT` holds formats that are never useful as match
//! evidence; `HASH_ONLY_EXT` holds binaries and archives that are only
//! eligible for full-file MD5 matching, never snippet generation.
//!
//! Both tables are immutable after first use and shared by every caller.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use walkdir::{DirEntry, WalkDir};

/// Smallest file worth fingerprinting, in bytes.
pub const MIN_FILE_SIZE: u64 = 100;

/// Extensions excluded from matching altogether.
pub static FILTER_EXT: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        ".1", ".2", ".3", ".4", ".5", ".6", ".7", ".8", ".9", ".ac", ".adoc", ".am",
        ".asciidoc", ".bmp", ".build", ".cfg", ".chm", ".class", ".cmake", ".cnf", ".conf",
        ".config", ".contributors", ".copying", ".crt", ".csproj", ".css", ".csv", ".dat",
        ".data", ".doc", ".docx", ".dtd", ".dts", ".iws", ".c9", ".c9revisions", ".dtsi",
        ".dump", ".eot", ".eps", ".geojson", ".gdoc", ".gif", ".glif", ".gmo", ".gradle",
        ".guess", ".hex", ".htm", ".html", ".ico", ".iml", ".in", ".inc", ".info", ".ini",
        ".ipynb", ".jpeg", ".jpg", ".json", ".jsonld", ".lock", ".log", ".m4", ".map",
        ".markdown", ".md", ".md5", ".meta", ".mk", ".mxml", ".o", ".otf", ".out", ".pbtxt",
        ".pdf", ".pem", ".phtml", ".plist", ".png", ".po", ".ppt", ".prefs", ".properties",
        ".pyc", ".qdoc", ".result", ".rgb", ".rst", ".scss", ".sha", ".sha1", ".sha2",
        ".sha256", ".sln", ".spec", ".sql", ".sub", ".svg", ".svn-base", ".tab", ".template",
        ".test", ".tex", ".tiff", ".toml", ".ttf", ".txt", ".utf-8", ".vim", ".wav", ".whl",
        ".woff", ".xht", ".xhtml", ".xls", ".xlsx", ".xml", ".xpm", ".xsd", ".xul", ".yaml",
        ".yml", ".wfp", ".editorconfig", ".dotcover", ".pid", ".lcov", ".egg", ".manifest",
        ".cache", ".coverage", ".cover", ".gem", ".lst", ".pickle", ".pdb", ".gml", ".pot",
        ".plt",
    ]
    .into_iter()
    .collect()
});

/// Extensions eligible for full-file MD5 matching only.
pub static HASH_ONLY_EXT: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Executables and binaries
        ".exe", ".bin", ".app", ".out", ".o", ".a", ".so", ".obj", ".dll", ".lib", ".dylib",
        // Archives
        ".zip", ".tar", ".tgz", ".gz", ".7z", ".rar", ".bz2", ".xz", ".lz", ".lzma", ".Z",
        // Java
        ".jar", ".war", ".ear", ".class",
        // Images
        ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".tiff", ".tif", ".webp", ".svg",
        // Videos
        ".mp4", ".avi", ".mov", ".wmv", ".flv", ".mkv", ".webm", ".m4v",
        // Audio
        ".mp3", ".wav", ".ogg", ".flac", ".aac", ".wma", ".m4a",
        // Documents
        ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".ods", ".odp", ".pages",
        ".key", ".numbers", ".pdf",
        // Python compiled
        ".pyc", ".pyo", ".pyd",
        // Fonts
        ".ttf", ".otf", ".woff", ".woff2", ".eot",
        // Data/Config formats (often not useful for snippet matching)
        ".json", ".xml", ".yml", ".yaml", ".toml", ".ini", ".cfg", ".conf",
        // Web
        ".htm", ".html",
        // Documentation
        ".md", ".txt", ".rst", ".adoc",
        // Other
        ".dat", ".lst", ".mf", ".sum", ".db", ".sqlite", ".sqlite3",
    ]
    .into_iter()
    .collect()
});

/// Dotted extension of a path, e.g. `".json"`. Empty when there is none.
fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Whether the extension is in the never-match table.
pub fn has_filtered_ext(path: &Path) -> bool {
    FILTER_EXT.contains(dotted_extension(path).as_str())
}

/// Whether the extension is in the full-file-only table.
pub fn has_hash_only_ext(path: &Path) -> bool {
    HASH_ONLY_EXT.contains(dotted_extension(path).as_str())
}

/// Whether the basename (sans extension) marks a minified artifact.
pub fn is_minified(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem.ends_with(".min"))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Walk `root` and collect the files eligible for snippet fingerprinting.
///
/// Hidden directories are pruned (their contents are never visited),
/// hidden files, files of [`MIN_FILE_SIZE`] bytes or less, minified
/// artifacts, and both extension tables are skipped.
pub fn select_files(root: &Path) -> Vec<PathBuf> {
    let mut selected = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size <= MIN_FILE_SIZE {
            continue;
        }
        if is_minified(path) {
            tracing::debug!("skipping minified file: {}", path.display());
            continue;
        }
        if has_filtered_ext(path) || has_hash_only_ext(path) {
            continue;
        }
        selected.push(path.to_path_buf());
    }

    selected
}
