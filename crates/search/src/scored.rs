//! Scored document sets
//!
//! `ScoredDocuments` is the value passed between retrieval, every reranker
//! stage and the materializer. Its order is the ranking.
//!
//! # Canonical Order
//!
//! 1. score descending
//! 2. external docid ascending (byte-wise), or internal id ascending when the
//!    arbitrary tie-break is requested
//!
//! Scores are compared with `f32::total_cmp`, so the order is total even in
//! the presence of NaN.

use crate::execute::TopDocs;
use quarry_core::{InternalId, QuarryResult, SearchArgs, StoredDocument};
use quarry_index::IndexReader;
use std::cmp::Ordering;

// ============================================================================
// TieBreak
// ============================================================================

/// Secondary ordering applied to equal scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// External docid ascending
    #[default]
    ExternalId,
    /// Internal id ascending
    InternalId,
}

impl TieBreak {
    /// Tie-break policy selected by the search arguments
    pub fn from_args(args: &SearchArgs) -> Self {
        if args.arbitrary_score_tie_break {
            TieBreak::InternalId
        } else {
            TieBreak::ExternalId
        }
    }

    /// Compare two ranked entries: score descending, then the tie key
    pub fn compare(
        &self,
        (a_score, a_id, a_docid): (f32, InternalId, &str),
        (b_score, b_id, b_docid): (f32, InternalId, &str),
    ) -> Ordering {
        b_score.total_cmp(&a_score).then_with(|| match self {
            TieBreak::ExternalId => a_docid.cmp(b_docid).then(a_id.cmp(&b_id)),
            TieBreak::InternalId => a_id.cmp(&b_id),
        })
    }
}

// ============================================================================
// ScoredDocument
// ============================================================================

/// One ranked document
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// Internal document identifier
    pub internal_id: InternalId,
    /// Score as assigned by the last stage that touched it
    pub score: f32,
    /// Stored fields
    pub document: StoredDocument,
}

impl ScoredDocument {
    /// External identifier
    pub fn docid(&self) -> &str {
        &self.document.docid
    }

    /// Raw content, if stored
    pub fn raw(&self) -> Option<&str> {
        self.document.raw()
    }

    fn sort_key(&self) -> (f32, InternalId, &str) {
        (self.score, self.internal_id, self.docid())
    }
}

// ============================================================================
// ScoredDocuments
// ============================================================================

/// Ordered sequence of scored documents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoredDocuments {
    docs: Vec<ScoredDocument>,
}

impl ScoredDocuments {
    /// Wrap an already ordered list
    pub fn new(docs: Vec<ScoredDocument>) -> Self {
        ScoredDocuments { docs }
    }

    /// Empty set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve ranked internal ids into documents, keeping their order.
    pub fn from_top_docs(reader: &dyn IndexReader, top: &TopDocs) -> QuarryResult<Self> {
        let docs = top
            .docs
            .iter()
            .map(|hit| {
                Ok(ScoredDocument {
                    internal_id: hit.doc_id,
                    score: hit.score,
                    document: reader.lookup_document(hit.doc_id)?,
                })
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        Ok(ScoredDocuments { docs })
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// True if there are no documents
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Iterate in rank order
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredDocument> {
        self.docs.iter()
    }

    /// Documents in rank order
    pub fn as_slice(&self) -> &[ScoredDocument] {
        &self.docs
    }

    /// Keep at most `len` documents
    pub fn truncate(&mut self, len: usize) {
        self.docs.truncate(len);
    }

    /// Re-impose canonical order
    pub fn sort_canonical(&mut self, tie_break: TieBreak) {
        self.docs
            .sort_by(|a, b| tie_break.compare(a.sort_key(), b.sort_key()));
    }

    /// True if the documents are already in canonical order
    pub fn is_canonical(&self, tie_break: TieBreak) -> bool {
        self.docs
            .windows(2)
            .all(|w| tie_break.compare(w[0].sort_key(), w[1].sort_key()) != Ordering::Greater)
    }

    /// External ids in rank order
    pub fn docids(&self) -> Vec<&str> {
        self.docs.iter().map(ScoredDocument::docid).collect()
    }

    /// Unwrap into the underlying vector
    pub fn into_vec(self) -> Vec<ScoredDocument> {
        self.docs
    }
}

impl IntoIterator for ScoredDocuments {
    type Item = ScoredDocument;
    type IntoIter = std::vec::IntoIter<ScoredDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.into_iter()
    }
}

impl<'a> IntoIterator for &'a ScoredDocuments {
    type Item = &'a ScoredDocument;
    type IntoIter = std::slice::Iter<'a, ScoredDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.iter()
    }
}

impl FromIterator<ScoredDocument> for ScoredDocuments {
    fn from_iter<I: IntoIterator<Item = ScoredDocument>>(iter: I) -> Self {
        ScoredDocuments {
            docs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sd(internal_id: InternalId, docid: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            internal_id,
            score,
            document: StoredDocument::new(docid),
        }
    }

    #[test]
    fn test_tie_break_from_args() {
        assert_eq!(TieBreak::from_args(&SearchArgs::default()), TieBreak::ExternalId);
        let args = SearchArgs::default().with_arbitrary_score_tie_break(true);
        assert_eq!(TieBreak::from_args(&args), TieBreak::InternalId);
    }

    #[test]
    fn test_sort_score_desc_then_docid() {
        let mut docs = ScoredDocuments::new(vec![
            sd(0, "d3", 1.0),
            sd(1, "d1", 1.0),
            sd(2, "d9", 2.0),
            sd(3, "d2", 1.0),
        ]);
        docs.sort_canonical(TieBreak::ExternalId);
        assert_eq!(docs.docids(), vec!["d9", "d1", "d2", "d3"]);
        assert!(docs.is_canonical(TieBreak::ExternalId));
    }

    #[test]
    fn test_docid_compares_as_string() {
        let mut docs = ScoredDocuments::new(vec![sd(0, "d10", 1.0), sd(1, "d9", 1.0)]);
        docs.sort_canonical(TieBreak::ExternalId);
        assert_eq!(docs.docids(), vec!["d10", "d9"]);
    }

    #[test]
    fn test_sort_internal_id_tie_break() {
        let mut docs = ScoredDocuments::new(vec![
            sd(5, "a", 1.0),
            sd(2, "z", 1.0),
            sd(9, "m", 3.0),
        ]);
        docs.sort_canonical(TieBreak::InternalId);
        assert_eq!(docs.docids(), vec!["m", "z", "a"]);
        assert!(!docs.is_canonical(TieBreak::ExternalId));
    }

    #[test]
    fn test_nan_does_not_break_order() {
        let mut docs = ScoredDocuments::new(vec![
            sd(0, "b", f32::NAN),
            sd(1, "a", 1.0),
            sd(2, "c", f32::NAN),
        ]);
        docs.sort_canonical(TieBreak::ExternalId);
        assert!(docs.is_canonical(TieBreak::ExternalId));
        let mut again = docs.clone();
        again.sort_canonical(TieBreak::ExternalId);
        assert_eq!(docs.docids(), again.docids());
    }

    #[test]
    fn test_truncate_and_iter() {
        let mut docs: ScoredDocuments = (0..5).map(|i| sd(i, &format!("d{}", i), 1.0)).collect();
        docs.truncate(2);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs.iter().map(|d| d.internal_id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_scored_document_accessors() {
        let doc = ScoredDocument {
            internal_id: 4,
            score: 0.5,
            document: StoredDocument::new("d4").with_field("raw", "{\"x\":1}"),
        };
        assert_eq!(doc.docid(), "d4");
        assert_eq!(doc.raw(), Some("{\"x\":1}"));
        assert_eq!(sd(0, "x", 1.0).raw(), None);
    }
}
