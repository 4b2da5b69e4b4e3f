//! # plagicheck — Open-Source Code Reuse Detection Engine
//!
//! Compares a target source tree against a knowledge base (KB) of known
//! open-source files. For each target file the scan yields a full-file match
//! (the file's MD5 is known to the KB), a code-snippet match (line ranges
//! whose winnowing fingerprints collide with a KB file), or no match.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       ScanEngine                           │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────┐  │
//! │  │ Selector │ │ Winnower │ │WFP Codec │ │ KB Adapters  │  │
//! │  │ (walk)   │ │ (CRC32C) │ │ (text)   │ │ (full+snip)  │  │
//! │  └────┬─────┘ └────┬─────┘ └────┬─────┘ └──────┬───────┘  │
//! │       │            │            │              │          │
//! │  ┌────▼────────────▼────────────▼──────────────▼───────┐  │
//! │  │  Per-file pipeline (bounded rayon worker pool)      │  │
//! │  │  full-file lookup → snippet scan → match reduction  │  │
//! │  └────────────────────────┬────────────────────────────┘  │
//! │                           │                               │
//! │  ┌────────────────────────▼────────────────────────────┐  │
//! │  │  Result map (keyed by path) → pretty JSON report    │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//!
//! - **Winnowing fingerprints**: 30-byte grams, 64-hash windows, CRC32C
//!   (Castagnoli) double hashing, line-addressable output
//! - **WFP container**: compact textual format, 1 KiB physical line cap,
//!   tolerant parsing
//! - **KB adapters**: full-file lookup by MD5 and snippet index scan behind
//!   one trait; ships an out-of-process ldb adapter and an embedded store
//! - **Match reduction**: hits-ranked candidate selection, single-line
//!   filtering, adaptive range coalescing bounded at 10 ranges

pub mod engine;
pub mod kb;
pub mod report;
pub mod wfp;

// Re-exports for convenience
pub use engine::{ScanConfig, ScanEngine, ScanMap};
pub use kb::{FullFileRecord, KnowledgeBase, LineRange, SnippetMatch, SnippetScan};
pub use report::{MatchResult, MatchType};
pub use wfp::{WfpEntry, WfpFile};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlagiError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WFP parse error: {0}")]
    Parse(String),

    #[error("KB lookup error: {0}")]
    Lookup(String),

    #[error("snippet scan error: {0}")]
    Scan(String),

    #[error("insufficient evidence: {0}")]
    Insufficient(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type PlagiResult<T> = Result<T, PlagiError>;
