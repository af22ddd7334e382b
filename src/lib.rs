//! A library for resolving cited journal titles to canonical ISSN-L identifiers.
//!
//! `issnl-match` takes the journal part of a bibliographic citation (cited title, plus
//! optional publication year and volume) and decides which journal it refers to, using a
//! cascade of correction bases built offline from registry indices, Crossref metadata and
//! citation-index exports.
//!
//! # Key Features
//!
//! - **Title normalization**: diacritics, punctuation and case are folded into a stable
//!   join key shared by the correction bases and the incoming citations.
//!
//! - **Matching cascade**:
//!   - Exact title lookup against the Title→ISSN-L base
//!   - Order-preserving fuzzy title matching when the exact lookup fails
//!   - Homonym disambiguation through year-volume bases
//!
//! - **Volume inference**:
//!   - Per-journal linear regression of volume on year
//!   - ±1 prediction windows used to probe the year-volume bases
//!   - Generation of the synthetic ("artificial") year-volume base
//!
//! - **Auditability**: every processed record carries exactly one [`ResultCode`] and,
//!   when resolved, the correction-base key that decided it.
//!
//! # Basic Usage
//!
//! ```no_run
//! use issnl_match::{BasePaths, CitationRecord, CorrectionBases, LoaderConfig};
//! use issnl_match::engine::{MatchEngine, MatchOptions};
//!
//! let paths = BasePaths::new("title_to_issnl.tsv", "issnl_to_all.csv", "year_volume.csv")
//!     .with_synthetic("year_volume_artificial.csv")
//!     .with_equations("equations_issnl.csv");
//! let bases = CorrectionBases::load(&paths, &LoaderConfig::default()).unwrap();
//!
//! let engine = MatchEngine::new(&bases, MatchOptions::default());
//! let record = CitationRecord {
//!     title: Some("Rev Saúde Pública".to_string()),
//!     year: Some("2005".to_string()),
//!     volume: Some("39".to_string()),
//!     ..Default::default()
//! };
//! let enriched = engine.resolve(record);
//! println!("{:?} {:?}", enriched.result_code, enriched.cited_issnl);
//! ```
//!
//! # Error Handling
//!
//! Loading uses the crate [`Result`] type wrapping [`MatchError`]. Missing correction
//! bases and malformed index rows are fatal. Matching itself never fails: undecidable
//! citations are ordinary outcomes reported through their [`ResultCode`].
//!
//! # Thread Safety
//!
//! [`CorrectionBases`] is immutable once loaded and can be shared between threads by
//! reference or behind an `Arc`. [`engine::MatchEngine::resolve_all`] resolves batches in
//! parallel when the `parallel` feature is enabled.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

extern crate csv as csv_crate;

pub mod config;
pub mod csv;
pub mod disambiguate;
pub mod engine;
pub mod fuzzy;
pub mod index;
pub mod jsonl;
pub mod normalize;
pub mod regression;
pub mod result_code;
mod utils;

// Reexports
pub use config::MatchConfig;
pub use csv::CsvParser;
pub use engine::{BatchSummary, MatchEngine, MatchOptions};
pub use jsonl::JsonLinesParser;
pub use index::{BasePaths, ConflictPolicy, CorrectionBases, LoaderConfig};
pub use normalize::{NormalizedTitle, normalize};
pub use result_code::ResultCode;

/// Canonical or variant ISSN, standardized as `NNNN-NNNC` when possible.
pub type Issn = compact_str::CompactString;

/// A specialized Result type for loading and batch operations.
pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors raised while loading correction bases or processing record streams.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing correction base: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Malformed row in {base} at line {line}: expected {expected} columns, found {found}")]
    MalformedRow {
        base: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Invalid field value in {base} at line {line}: {field} - {message}")]
    InvalidFieldValue {
        base: String,
        line: u64,
        field: String,
        message: String,
    },

    #[error("Parse error: {0}")]
    InvalidFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<csv_crate::Error> for MatchError {
    fn from(err: csv_crate::Error) -> Self {
        MatchError::InvalidFormat(err.to_string())
    }
}

impl From<serde_json::Error> for MatchError {
    fn from(err: serde_json::Error) -> Self {
        MatchError::InvalidFormat(err.to_string())
    }
}

impl From<toml::de::Error> for MatchError {
    fn from(err: toml::de::Error) -> Self {
        MatchError::Config(err.to_string())
    }
}

/// Records read from a citation stream, with the number of rows that could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub records: Vec<CitationRecord>,
    pub skipped: usize,
}

/// Trait implemented by the citation stream readers.
pub trait RecordParser {
    /// Parse a string containing one or more citation records.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidFormat`] when the stream as a whole cannot be read.
    /// Individual malformed records are skipped and counted in [`RecordBatch::skipped`].
    fn parse(&self, input: &str) -> Result<RecordBatch>;
}

/// A single cited reference, as read from the citation stream and as written back
/// once enriched.
///
/// Legacy citation export field names (`cited_journal`, `cited_year`, `cited_vol`, ...)
/// are accepted as aliases. Fields the engine does not know about are kept in
/// `extra_fields` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_string")]
    pub id: Option<String>,
    /// Cited journal title
    #[serde(
        default,
        alias = "cited_journal",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_string"
    )]
    pub title: Option<String>,
    /// Alternative source title, used when `title` is empty
    #[serde(
        default,
        alias = "cited_source",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_string"
    )]
    pub source: Option<String>,
    /// Cited publication year, as written in the citation
    #[serde(
        default,
        alias = "cited_year",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_string"
    )]
    pub year: Option<String>,
    /// Cited volume, as written in the citation
    #[serde(
        default,
        alias = "cited_vol",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_string"
    )]
    pub volume: Option<String>,
    #[serde(
        default,
        alias = "cited_issn",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_string"
    )]
    pub issn: Option<String>,
    #[serde(
        default,
        alias = "cited_doi",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_string"
    )]
    pub doi: Option<String>,
    /// Resolved ISSN-L
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_string")]
    pub cited_issnl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_code: Option<ResultCode>,
    /// Year-volume key that decided an ambiguous match
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_string")]
    pub title_year_volume_key: Option<String>,
    /// Candidate ISSN-Ls submitted to disambiguation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_issnls: Vec<String>,
    /// Additional fields not covered by the engine
    #[serde(flatten)]
    pub extra_fields: BTreeMap<String, serde_json::Value>,
}

impl CitationRecord {
    /// Whether a previous run already resolved this record.
    pub fn is_resolved(&self) -> bool {
        self.cited_issnl.as_deref().is_some_and(|i| !i.trim().is_empty())
    }

    /// Whether the record carries a non-empty DOI.
    pub fn has_doi(&self) -> bool {
        self.doi.as_deref().is_some_and(|d| !d.trim().is_empty())
    }

    /// Drops every field written by a previous engine run.
    pub fn clear_results(&mut self) {
        self.cited_issnl = None;
        self.result_code = None;
        self.title_year_volume_key = None;
        self.candidate_issnls.clear();
    }
}

/// Accepts `null`, strings and numbers for loosely typed citation fields.
fn opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
