//! Core search types shared by the index and search crates
//!
//! This module defines:
//! - InternalId: the index's own integer document identifier
//! - fields: stored/indexed field names
//! - QueryMode: the four query constructions
//! - SearchArgs: per-search options (hits, rerank cutoff, tie-break policy)
//! - SimilarityConfig: serializable description of a scoring function
//! - StoredDocument: external id plus stored field values

use crate::error::{QuarryError, QuarryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Integer document identifier assigned by the index, distinct from the
/// external docid string.
pub type InternalId = u32;

/// Field names used by stored documents
pub mod fields {
    /// Default searchable body field
    pub const CONTENTS: &str = "contents";
    /// Raw (unanalyzed) document content
    pub const RAW: &str = "raw";
    /// Entity URI / title
    pub const TITLE: &str = "title";
    /// Entity prior
    pub const PRIOR: &str = "prior";
    /// Entity aliases
    pub const ALIAS: &str = "alias";
}

// ============================================================================
// QueryMode
// ============================================================================

/// How a raw query string is turned into a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Disjunction over analyzed tokens (selected by `normalize = true`)
    BagOfWords,
    /// Exact in-order contiguous token sequence (`"match"`)
    Phrase,
    /// Token-level prefix match on the raw term (`"prefix"`)
    Prefix,
    /// Edit-distance match on the raw term (`"fuzzy"`)
    Fuzzy,
}

impl QueryMode {
    /// Mode string for phrase queries
    pub const MATCH: &'static str = "match";
    /// Mode string for prefix queries
    pub const PREFIX: &'static str = "prefix";
    /// Mode string for fuzzy queries
    pub const FUZZY: &'static str = "fuzzy";

    /// Parse an explicit mode string.
    ///
    /// Only `"match"`, `"prefix"` and `"fuzzy"` are recognized; bag-of-words
    /// is never named explicitly.
    pub fn parse(mode: &str) -> QuarryResult<Self> {
        match mode {
            Self::MATCH => Ok(QueryMode::Phrase),
            Self::PREFIX => Ok(QueryMode::Prefix),
            Self::FUZZY => Ok(QueryMode::Fuzzy),
            other => Err(QuarryError::UnsupportedQueryMode(other.to_string())),
        }
    }

    /// Name for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::BagOfWords => "bag-of-words",
            QueryMode::Phrase => Self::MATCH,
            QueryMode::Prefix => Self::PREFIX,
            QueryMode::Fuzzy => Self::FUZZY,
        }
    }
}

impl FromStr for QueryMode {
    type Err = QuarryError;

    fn from_str(s: &str) -> QuarryResult<Self> {
        QueryMode::parse(s)
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SearchArgs
// ============================================================================

/// Per-search options
///
/// # Default Values
///
/// - hits: 10
/// - rerank_cutoff: 50
/// - arbitrary_score_tie_break: false
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArgs {
    /// Number of results returned to the caller
    pub hits: usize,
    /// Candidate pool fetched before reranking (only when reranking is enabled)
    pub rerank_cutoff: usize,
    /// Break score ties by internal id instead of external docid
    pub arbitrary_score_tie_break: bool,
}

impl Default for SearchArgs {
    fn default() -> Self {
        SearchArgs {
            hits: 10,
            rerank_cutoff: 50,
            arbitrary_score_tie_break: false,
        }
    }
}

impl SearchArgs {
    /// Create SearchArgs requesting `hits` results
    pub fn new(hits: usize) -> Self {
        SearchArgs {
            hits,
            ..Default::default()
        }
    }

    /// Builder: set rerank cutoff
    pub fn with_rerank_cutoff(mut self, cutoff: usize) -> Self {
        self.rerank_cutoff = cutoff;
        self
    }

    /// Builder: set tie-break policy
    pub fn with_arbitrary_score_tie_break(mut self, arbitrary: bool) -> Self {
        self.arbitrary_score_tie_break = arbitrary;
        self
    }

    /// Number of candidates to retrieve before reranking.
    ///
    /// `hits` when reranking is disabled, `rerank_cutoff` otherwise.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if reranking is enabled and `rerank_cutoff < hits`.
    pub fn candidate_pool_size(&self, rerank: bool) -> QuarryResult<usize> {
        if !rerank {
            return Ok(self.hits);
        }
        if self.rerank_cutoff < self.hits {
            return Err(QuarryError::invalid_argument(format!(
                "rerank_cutoff {} must be >= hits {}",
                self.rerank_cutoff, self.hits
            )));
        }
        Ok(self.rerank_cutoff)
    }
}

// ============================================================================
// SimilarityConfig
// ============================================================================

/// Serializable description of the active scoring function
///
/// ```toml
/// [similarity]
/// kind = "bm25"
/// k1 = 1.2
/// b = 0.75
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SimilarityConfig {
    /// Okapi BM25
    Bm25 {
        /// Term frequency saturation
        k1: f32,
        /// Length normalization
        b: f32,
    },
    /// Query likelihood with Dirichlet smoothing
    Dirichlet {
        /// Smoothing mass
        mu: f32,
    },
}

impl SimilarityConfig {
    /// Default BM25 k1
    pub const DEFAULT_K1: f32 = 1.2;
    /// Default BM25 b
    pub const DEFAULT_B: f32 = 0.75;
    /// Default Dirichlet mu
    pub const DEFAULT_MU: f32 = 1000.0;

    /// BM25 with the given parameters
    pub fn bm25(k1: f32, b: f32) -> Self {
        SimilarityConfig::Bm25 { k1, b }
    }

    /// Dirichlet-smoothed query likelihood
    pub fn dirichlet(mu: f32) -> Self {
        SimilarityConfig::Dirichlet { mu }
    }

    /// Check parameter ranges.
    ///
    /// BM25 requires finite `k1 >= 0` and `b` in `[0, 1]`; Dirichlet requires
    /// finite `mu > 0`.
    pub fn validate(&self) -> QuarryResult<()> {
        match *self {
            SimilarityConfig::Bm25 { k1, b } => {
                if !k1.is_finite() || k1 < 0.0 {
                    return Err(QuarryError::invalid_argument(format!(
                        "BM25 k1 must be finite and >= 0, got {}",
                        k1
                    )));
                }
                if !b.is_finite() || !(0.0..=1.0).contains(&b) {
                    return Err(QuarryError::invalid_argument(format!(
                        "BM25 b must be in [0, 1], got {}",
                        b
                    )));
                }
            }
            SimilarityConfig::Dirichlet { mu } => {
                if !mu.is_finite() || mu <= 0.0 {
                    return Err(QuarryError::invalid_argument(format!(
                        "Dirichlet mu must be finite and > 0, got {}",
                        mu
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        SimilarityConfig::Bm25 {
            k1: Self::DEFAULT_K1,
            b: Self::DEFAULT_B,
        }
    }
}

// ============================================================================
// StoredDocument
// ============================================================================

/// A document as stored by the index: external id plus stored field values
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoredDocument {
    /// External document identifier
    pub docid: String,
    /// Stored field values by field name
    pub fields: BTreeMap<String, String>,
}

impl StoredDocument {
    /// Create a document with no stored fields
    pub fn new(docid: impl Into<String>) -> Self {
        StoredDocument {
            docid: docid.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder: add a stored field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Stored value of a field, if present
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Raw document content, if stored
    pub fn raw(&self) -> Option<&str> {
        self.get(fields::RAW)
    }
}
