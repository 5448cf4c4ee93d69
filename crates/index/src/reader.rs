//! Read-only index access
//!
//! This module provides:
//! - Posting / PostingList: positional postings for one (field, term)
//! - TermStats / FieldStats: collection statistics consumed by similarities
//! - IndexReader: the narrow capability the searcher consumes
//!
//! # Thread Safety
//!
//! Readers are shared across concurrent searches without external locking:
//! every method takes `&self` and the index content never changes after
//! it is opened. `close()` only flips the handle to unavailable.

use quarry_core::{InternalId, QuarryResult, StoredDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Postings
// ============================================================================

/// Occurrences of a term in one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Internal document identifier
    pub doc_id: InternalId,
    /// Token positions, ascending
    pub positions: Vec<u32>,
}

impl Posting {
    /// Term frequency in this document
    pub fn tf(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Documents containing a term, sorted by `doc_id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingList {
    /// Document entries
    pub entries: Vec<Posting>,
}

impl PostingList {
    /// Create a new empty posting list
    pub fn new() -> Self {
        PostingList { entries: vec![] }
    }

    /// Number of documents containing this term
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if posting list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Posting for a document, if the term occurs in it
    pub fn get(&self, doc_id: InternalId) -> Option<&Posting> {
        self.entries
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Sum of term frequencies across all documents
    pub fn total_term_freq(&self) -> u64 {
        self.entries.iter().map(|p| p.tf() as u64).sum()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-term collection statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermStats {
    /// Number of documents containing the term
    pub doc_freq: u64,
    /// Total occurrences of the term in the field
    pub total_term_freq: u64,
}

/// Per-field collection statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStats {
    /// Number of documents with at least one token in the field
    pub doc_count: u64,
    /// Total number of tokens in the field
    pub sum_total_term_freq: u64,
}

impl FieldStats {
    /// Average field length in tokens (0.0 for an empty field)
    pub fn avg_len(&self) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.sum_total_term_freq as f32 / self.doc_count as f32
    }
}

// ============================================================================
// IndexReader
// ============================================================================

/// Read-only handle to a built inverted index
///
/// Every method fails with `IndexUnavailable` once the handle is closed.
pub trait IndexReader: Send + Sync {
    /// Fail with `IndexUnavailable` if the handle cannot be used
    fn ensure_open(&self) -> QuarryResult<()>;

    /// Number of documents in the index
    fn num_docs(&self) -> QuarryResult<usize>;

    /// Stored fields of a document
    fn lookup_document(&self, doc_id: InternalId) -> QuarryResult<StoredDocument>;

    /// External identifier of a document
    fn docid(&self, doc_id: InternalId) -> QuarryResult<&str>;

    /// Collection statistics for a field
    fn field_stats(&self, field: &str) -> QuarryResult<FieldStats>;

    /// Collection statistics for a term in a field
    fn term_stats(&self, field: &str, term: &str) -> QuarryResult<TermStats>;

    /// Positional postings for a term in a field
    fn postings(&self, field: &str, term: &str) -> QuarryResult<Option<&PostingList>>;

    /// Length of a document's field in tokens (stopwords excluded)
    fn field_length(&self, field: &str, doc_id: InternalId) -> QuarryResult<u32>;

    /// Indexed terms of a field beginning with `prefix`, ascending
    fn terms_with_prefix(&self, field: &str, prefix: &str) -> QuarryResult<Vec<String>>;

    /// All indexed terms of a field, ascending
    fn terms(&self, field: &str) -> QuarryResult<Vec<String>> {
        self.terms_with_prefix(field, "")
    }

    /// Term frequencies of one document's field, if the field was indexed
    fn term_vector(
        &self,
        doc_id: InternalId,
        field: &str,
    ) -> QuarryResult<Option<BTreeMap<String, u32>>>;

    /// Release the handle; later calls fail with `IndexUnavailable`
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(doc_id: InternalId, positions: &[u32]) -> Posting {
        Posting {
            doc_id,
            positions: positions.to_vec(),
        }
    }

    #[test]
    fn test_posting_list_lookup() {
        let list = PostingList {
            entries: vec![posting(1, &[0, 4]), posting(3, &[2]), posting(7, &[1, 2, 9])],
        };
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(3).map(Posting::tf), Some(1));
        assert_eq!(list.get(7).map(Posting::tf), Some(3));
        assert!(list.get(2).is_none());
        assert_eq!(list.total_term_freq(), 6);
    }

    #[test]
    fn test_posting_list_empty() {
        let list = PostingList::new();
        assert!(list.is_empty());
        assert_eq!(list.total_term_freq(), 0);
    }

    #[test]
    fn test_field_stats_avg_len() {
        let stats = FieldStats {
            doc_count: 2,
            sum_total_term_freq: 6,
        };
        assert!((stats.avg_len() - 3.0).abs() < f32::EPSILON);
        assert_eq!(FieldStats::default().avg_len(), 0.0);
    }
}
