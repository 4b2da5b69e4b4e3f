//! Knowledge-base adapter contracts
//!
//! The KB is defined by two operations and nothing else: a full-file
//! lookup keyed by MD5, and a snippet index scan over one file's
//! fingerprints. Any backend satisfying [`KnowledgeBase`] is acceptable —
//! in-process ([`MemoryKnowledgeBase`]), out-of-process
//! ([`LdbKnowledgeBase`]), or networked. The engine never depends on a
//! particular mechanism.
//!
//! Implementations are shared across scan workers, so they must be safe
//! for concurrent use or serialize internally.

pub mod ldb;
pub mod memory;

pub use ldb::LdbKnowledgeBase;
pub use memory::MemoryKnowledgeBase;

use serde::{Deserialize, Serialize};

use crate::wfp::WfpFile;
use crate::PlagiResult;

/// What the snippet index believes it collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMatchType {
    None,
    File,
    Snippet,
    Binary,
}

impl std::fmt::Display for IndexMatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::File => write!(f, "FILE"),
            Self::Snippet => write!(f, "SNIPPET"),
            Self::Binary => write!(f, "BINARY"),
        }
    }
}

/// Inclusive target-line span and the KB-file line it is believed to
/// begin at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub from: u32,
    pub to: u32,
    pub oss: u32,
}

/// First record the KB holds for a content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullFileRecord {
    pub reference_file: String,
    pub reference_url: String,
    /// KB-reported popularity count for the reference file.
    pub instances: u32,
}

/// One KB file sharing fingerprints with the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetMatch {
    pub kb_file_md5_hex: String,
    /// Distinct target fingerprints that matched this KB file.
    pub hits: u32,
    pub ranges: Vec<LineRange>,
}

/// Everything the snippet index reports for one target file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetScan {
    pub match_type: IndexMatchType,
    pub matches: Vec<SnippetMatch>,
}

impl SnippetScan {
    pub fn empty() -> Self {
        Self {
            match_type: IndexMatchType::None,
            matches: Vec::new(),
        }
    }
}

/// The two-operation KB contract.
pub trait KnowledgeBase: Send + Sync {
    /// First (oldest/preferred) record for `md5_hex`. Missing key and
    /// malformed records are both `Ok(None)`; only transport failures are
    /// errors.
    fn lookup_full(&self, md5_hex: &str) -> PlagiResult<Option<FullFileRecord>>;

    /// Scan the snippet index with one file's fingerprints. Matches are
    /// returned in index order; the reducer's max-hits tie-break is
    /// first-seen, so that order matters.
    fn scan_snippets(&self, wfp: &WfpFile) -> PlagiResult<SnippetScan>;
}
