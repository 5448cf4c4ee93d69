//! In-memory positional inverted index
//!
//! This module provides:
//! - IndexBuilder: concurrent document ingestion
//! - InMemoryIndex: immutable, shareable `IndexReader` implementation
//!
//! # Usage
//!
//! ```
//! use quarry_core::StoredDocument;
//! use quarry_index::{DefaultAnalyzer, IndexBuilder, IndexReader};
//! use std::sync::Arc;
//!
//! let builder = IndexBuilder::new(Arc::new(DefaultAnalyzer));
//! builder
//!     .add_document(StoredDocument::new("d1").with_field("contents", "the quick fox"))
//!     .unwrap();
//! let index = builder.finish();
//! assert_eq!(index.num_docs().unwrap(), 1);
//! ```
//!
//! Internal ids are assigned in ingestion order. When documents are added
//! from several threads the assignment order is unspecified; ranking never
//! depends on it unless the arbitrary tie-break is requested.

use crate::analyzer::Analyzer;
use crate::reader::{FieldStats, IndexReader, Posting, PostingList, TermStats};
use crate::snapshot::{self, INDEX_FILE_NAME};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use quarry_core::{fields, InternalId, QuarryError, QuarryResult, StoredDocument};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Index data (serializable)
// ============================================================================

/// One indexed field
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct FieldIndex {
    /// Term -> postings sorted by doc_id
    pub(crate) postings: BTreeMap<String, PostingList>,
    /// Field length in tokens, by doc_id (0 when the document lacks the field)
    pub(crate) lengths: Vec<u32>,
    /// Per-document term frequencies, by doc_id
    pub(crate) vectors: Vec<Option<BTreeMap<String, u32>>>,
    /// Documents with at least one token in the field
    pub(crate) doc_count: u64,
    /// Total tokens in the field
    pub(crate) sum_total_term_freq: u64,
}

/// Everything persisted by a snapshot
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct IndexData {
    /// Stored documents, indexed by doc_id
    pub(crate) docs: Vec<StoredDocument>,
    /// Indexed fields by name
    pub(crate) fields: HashMap<String, FieldIndex>,
}

impl IndexData {
    /// Check that postings name existing documents in ascending order and
    /// that every per-document table has one slot per document.
    pub(crate) fn check_consistency(&self) -> Result<(), String> {
        let num_docs = self.docs.len();
        for (name, field) in &self.fields {
            if field.lengths.len() != num_docs {
                return Err(format!(
                    "field '{}' has {} lengths for {} documents",
                    name,
                    field.lengths.len(),
                    num_docs
                ));
            }
            if field.vectors.len() != num_docs {
                return Err(format!(
                    "field '{}' has {} term vectors for {} documents",
                    name,
                    field.vectors.len(),
                    num_docs
                ));
            }
            for (term, list) in &field.postings {
                if let Some(posting) = list.entries.iter().find(|p| p.doc_id as usize >= num_docs) {
                    return Err(format!(
                        "posting for '{}' in field '{}' names unknown document {}",
                        term, name, posting.doc_id
                    ));
                }
                if list.entries.windows(2).any(|w| w[0].doc_id >= w[1].doc_id) {
                    return Err(format!(
                        "postings for '{}' in field '{}' are not sorted by document",
                        term, name
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// IndexBuilder
// ============================================================================

#[derive(Default)]
struct FieldAccumulator {
    postings: HashMap<String, Vec<Posting>>,
    lengths: HashMap<InternalId, u32>,
    vectors: HashMap<InternalId, BTreeMap<String, u32>>,
}

/// Builds an `InMemoryIndex`
///
/// # Thread Safety
///
/// `add_document` takes `&self`; several threads may ingest concurrently.
pub struct IndexBuilder {
    analyzer: Arc<dyn Analyzer>,
    indexed_fields: Vec<String>,
    docs: RwLock<Vec<StoredDocument>>,
    ids: DashMap<String, InternalId>,
    fields: DashMap<String, FieldAccumulator>,
}

impl IndexBuilder {
    /// Create a builder that analyzes the `contents` and `title` fields
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        IndexBuilder {
            analyzer,
            indexed_fields: vec![fields::CONTENTS.to_string(), fields::TITLE.to_string()],
            docs: RwLock::new(Vec::new()),
            ids: DashMap::new(),
            fields: DashMap::new(),
        }
    }

    /// Builder: replace the set of analyzed fields
    pub fn with_indexed_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexed_fields = names.into_iter().map(Into::into).collect();
        self
    }

    /// Add a document. All fields are stored; the configured fields are also
    /// analyzed and indexed.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the external id is empty or already present.
    pub fn add_document(&self, doc: StoredDocument) -> QuarryResult<InternalId> {
        if doc.docid.is_empty() {
            return Err(QuarryError::invalid_argument("document id must not be empty"));
        }

        let doc_id = match self.ids.entry(doc.docid.clone()) {
            Entry::Occupied(_) => {
                return Err(QuarryError::invalid_argument(format!(
                    "duplicate document id '{}'",
                    doc.docid
                )))
            }
            Entry::Vacant(slot) => {
                let mut docs = self.docs.write();
                let doc_id = docs.len() as InternalId;
                docs.push(doc.clone());
                slot.insert(doc_id);
                doc_id
            }
        };

        for field in &self.indexed_fields {
            let Some(text) = doc.get(field) else {
                continue;
            };
            let tokens = self.analyzer.analyze(text);

            let mut by_term: BTreeMap<String, Vec<u32>> = BTreeMap::new();
            for token in &tokens {
                by_term
                    .entry(token.term.clone())
                    .or_default()
                    .push(token.position);
            }
            let vector: BTreeMap<String, u32> = by_term
                .iter()
                .map(|(term, positions)| (term.clone(), positions.len() as u32))
                .collect();

            let mut acc = self.fields.entry(field.clone()).or_default();
            for (term, positions) in by_term {
                acc.postings
                    .entry(term)
                    .or_default()
                    .push(Posting { doc_id, positions });
            }
            acc.lengths.insert(doc_id, tokens.len() as u32);
            acc.vectors.insert(doc_id, vector);
        }

        Ok(doc_id)
    }

    /// Number of documents added so far
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    /// True if no document has been added
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the builder into a read-only index
    pub fn finish(self) -> InMemoryIndex {
        let docs = self.docs.into_inner();
        let num_docs = docs.len();

        let mut field_map = HashMap::new();
        for (name, acc) in self.fields.into_iter() {
            let mut field = FieldIndex {
                lengths: vec![0; num_docs],
                vectors: vec![None; num_docs],
                ..Default::default()
            };
            for (term, mut entries) in acc.postings {
                entries.sort_by_key(|p| p.doc_id);
                field.postings.insert(term, PostingList { entries });
            }
            for (doc_id, len) in acc.lengths {
                field.lengths[doc_id as usize] = len;
                if len > 0 {
                    field.doc_count += 1;
                }
                field.sum_total_term_freq += len as u64;
            }
            for (doc_id, vector) in acc.vectors {
                field.vectors[doc_id as usize] = Some(vector);
            }
            field_map.insert(name, field);
        }

        debug!(docs = num_docs, fields = field_map.len(), "index built");
        InMemoryIndex::from_data(
            IndexData {
                docs,
                fields: field_map,
            },
            None,
        )
    }
}

// ============================================================================
// InMemoryIndex
// ============================================================================

/// Immutable in-memory index implementing `IndexReader`
pub struct InMemoryIndex {
    data: IndexData,
    closed: AtomicBool,
    path: Option<PathBuf>,
}

impl InMemoryIndex {
    fn from_data(data: IndexData, path: Option<PathBuf>) -> Self {
        InMemoryIndex {
            data,
            closed: AtomicBool::new(false),
            path,
        }
    }

    /// Open an index directory written by `write_to_dir`.
    ///
    /// # Errors
    ///
    /// `IndexUnavailable` if the path does not exist, is not a readable
    /// directory, or holds no valid snapshot.
    pub fn open(path: impl AsRef<Path>) -> QuarryResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(QuarryError::index_unavailable(format!(
                "{} does not exist or is not a directory",
                path.display()
            )));
        }
        std::fs::read_dir(path).map_err(|e| {
            QuarryError::index_unavailable(format!("{} is not readable: {}", path.display(), e))
        })?;

        let data = snapshot::load_snapshot(&path.join(INDEX_FILE_NAME)).map_err(|e| {
            QuarryError::index_unavailable(format!(
                "cannot load index from {}: {}",
                path.display(),
                e
            ))
        })?;
        data.check_consistency().map_err(|reason| {
            QuarryError::index_unavailable(format!(
                "corrupt index in {}: {}",
                path.display(),
                reason
            ))
        })?;
        info!(path = %path.display(), docs = data.docs.len(), "index opened");
        Ok(Self::from_data(data, Some(path.to_path_buf())))
    }

    /// Persist the index into `dir` (created if missing).
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> QuarryResult<()> {
        self.ensure_open()?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        snapshot::write_snapshot(&dir.join(INDEX_FILE_NAME), &self.data)?;
        Ok(())
    }

    /// Directory this index was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True once `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn field(&self, field: &str) -> Option<&FieldIndex> {
        self.data.fields.get(field)
    }
}

impl IndexReader for InMemoryIndex {
    fn ensure_open(&self) -> QuarryResult<()> {
        if self.is_closed() {
            return Err(QuarryError::index_unavailable("index reader is closed"));
        }
        Ok(())
    }

    fn num_docs(&self) -> QuarryResult<usize> {
        self.ensure_open()?;
        Ok(self.data.docs.len())
    }

    fn lookup_document(&self, doc_id: InternalId) -> QuarryResult<StoredDocument> {
        self.ensure_open()?;
        self.data
            .docs
            .get(doc_id as usize)
            .cloned()
            .ok_or_else(|| QuarryError::invalid_argument(format!("unknown internal id {}", doc_id)))
    }

    fn docid(&self, doc_id: InternalId) -> QuarryResult<&str> {
        self.ensure_open()?;
        self.data
            .docs
            .get(doc_id as usize)
            .map(|d| d.docid.as_str())
            .ok_or_else(|| QuarryError::invalid_argument(format!("unknown internal id {}", doc_id)))
    }

    fn field_stats(&self, field: &str) -> QuarryResult<FieldStats> {
        self.ensure_open()?;
        Ok(self
            .field(field)
            .map(|f| FieldStats {
                doc_count: f.doc_count,
                sum_total_term_freq: f.sum_total_term_freq,
            })
            .unwrap_or_default())
    }

    fn term_stats(&self, field: &str, term: &str) -> QuarryResult<TermStats> {
        Ok(self
            .postings(field, term)?
            .map(|list| TermStats {
                doc_freq: list.len() as u64,
                total_term_freq: list.total_term_freq(),
            })
            .unwrap_or_default())
    }

    fn postings(&self, field: &str, term: &str) -> QuarryResult<Option<&PostingList>> {
        self.ensure_open()?;
        Ok(self.field(field).and_then(|f| f.postings.get(term)))
    }

    fn field_length(&self, field: &str, doc_id: InternalId) -> QuarryResult<u32> {
        self.ensure_open()?;
        Ok(self
            .field(field)
            .and_then(|f| f.lengths.get(doc_id as usize).copied())
            .unwrap_or(0))
    }

    fn terms_with_prefix(&self, field: &str, prefix: &str) -> QuarryResult<Vec<String>> {
        self.ensure_open()?;
        let Some(f) = self.field(field) else {
            return Ok(Vec::new());
        };
        Ok(f.postings
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(|(term, _)| term.starts_with(prefix))
            .map(|(term, _)| term.clone())
            .collect())
    }

    fn term_vector(
        &self,
        doc_id: InternalId,
        field: &str,
    ) -> QuarryResult<Option<BTreeMap<String, u32>>> {
        self.ensure_open()?;
        Ok(self
            .field(field)
            .and_then(|f| f.vectors.get(doc_id as usize))
            .and_then(|v| v.clone()))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(docs = self.data.docs.len(), "index closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::DefaultAnalyzer;

    fn doc(id: &str, contents: &str) -> StoredDocument {
        StoredDocument::new(id)
            .with_field(fields::CONTENTS, contents)
            .with_field(fields::RAW, contents)
    }

    fn build(docs: &[(&str, &str)]) -> InMemoryIndex {
        let builder = IndexBuilder::new(Arc::new(DefaultAnalyzer));
        for (id, text) in docs {
            builder.add_document(doc(id, text)).unwrap();
        }
        builder.finish()
    }

    #[test]
    fn test_index_document() {
        let index = build(&[("d1", "hello world hello")]);

        assert_eq!(index.num_docs().unwrap(), 1);
        let postings = index.postings(fields::CONTENTS, "hello").unwrap().unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings.entries[0].positions, vec![0, 2]);
        assert_eq!(index.field_length(fields::CONTENTS, 0).unwrap(), 3);
    }

    #[test]
    fn test_field_and_term_stats() {
        let index = build(&[("d1", "one two"), ("d2", "one two three four")]);

        let stats = index.field_stats(fields::CONTENTS).unwrap();
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.sum_total_term_freq, 6);
        assert!((stats.avg_len() - 3.0).abs() < 0.01);

        let one = index.term_stats(fields::CONTENTS, "one").unwrap();
        assert_eq!(one.doc_freq, 2);
        assert_eq!(one.total_term_freq, 2);
        assert_eq!(
            index.term_stats(fields::CONTENTS, "missing").unwrap(),
            TermStats::default()
        );
    }

    #[test]
    fn test_unindexed_field_is_stored_only() {
        let builder = IndexBuilder::new(Arc::new(DefaultAnalyzer));
        builder
            .add_document(doc("d1", "text").with_field(fields::PRIOR, "0.7"))
            .unwrap();
        let index = builder.finish();

        assert!(index.postings(fields::PRIOR, "0").unwrap().is_none());
        assert_eq!(index.lookup_document(0).unwrap().get(fields::PRIOR), Some("0.7"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let builder = IndexBuilder::new(Arc::new(DefaultAnalyzer));
        builder.add_document(doc("d1", "a")).unwrap();
        let err = builder.add_document(doc("d1", "b")).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidArgument(_)));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_empty_id_rejected() {
        let builder = IndexBuilder::new(Arc::new(DefaultAnalyzer));
        assert!(builder.add_document(doc("", "a")).is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn test_terms_with_prefix() {
        let index = build(&[("d1", "quick quiet quilt"), ("d2", "quack fox")]);

        assert_eq!(
            index.terms_with_prefix(fields::CONTENTS, "qui").unwrap(),
            vec!["quick", "quiet", "quilt"]
        );
        assert_eq!(index.terms(fields::CONTENTS).unwrap().len(), 5);
        assert!(index.terms_with_prefix("nofield", "q").unwrap().is_empty());
    }

    #[test]
    fn test_term_vector() {
        let index = build(&[("d1", "fox fox dog")]);
        let vector = index.term_vector(0, fields::CONTENTS).unwrap().unwrap();
        assert_eq!(vector.get("fox"), Some(&2));
        assert_eq!(vector.get("dog"), Some(&1));
        assert!(index.term_vector(0, fields::TITLE).unwrap().is_none());
    }

    #[test]
    fn test_closed_index_unavailable() {
        let index = build(&[("d1", "hello")]);
        index.close();

        assert!(index.is_closed());
        assert!(index.num_docs().unwrap_err().is_index_unavailable());
        assert!(index.lookup_document(0).unwrap_err().is_index_unavailable());
        assert!(index
            .postings(fields::CONTENTS, "hello")
            .unwrap_err()
            .is_index_unavailable());

        // Closing twice is harmless
        index.close();
    }

    #[test]
    fn test_concurrent_ingestion() {
        let builder = IndexBuilder::new(Arc::new(DefaultAnalyzer));
        std::thread::scope(|s| {
            for t in 0..4 {
                let builder = &builder;
                s.spawn(move || {
                    for i in 0..25 {
                        builder
                            .add_document(doc(&format!("t{}-{}", t, i), "shared term"))
                            .unwrap();
                    }
                });
            }
        });
        let index = builder.finish();

        assert_eq!(index.num_docs().unwrap(), 100);
        let postings = index.postings(fields::CONTENTS, "shared").unwrap().unwrap();
        assert_eq!(postings.len(), 100);
        assert!(postings
            .entries
            .windows(2)
            .all(|w| w[0].doc_id < w[1].doc_id));
    }

    #[test]
    fn test_open_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let err = InMemoryIndex::open(tmp.path().join("missing")).err().unwrap();
        assert!(err.is_index_unavailable());
    }

    #[test]
    fn test_open_dir_without_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let err = InMemoryIndex::open(tmp.path()).err().unwrap();
        assert!(err.is_index_unavailable());
    }

    fn write_raw(dir: &Path, data: &IndexData) {
        snapshot::write_snapshot(&dir.join(INDEX_FILE_NAME), data).unwrap();
    }

    fn one_doc_data() -> IndexData {
        let mut field = FieldIndex {
            lengths: vec![1],
            vectors: vec![Some(BTreeMap::from([("fox".to_string(), 1)]))],
            doc_count: 1,
            sum_total_term_freq: 1,
            ..Default::default()
        };
        field.postings.insert(
            "fox".to_string(),
            PostingList {
                entries: vec![Posting {
                    doc_id: 0,
                    positions: vec![0],
                }],
            },
        );
        IndexData {
            docs: vec![StoredDocument::new("d1")],
            fields: HashMap::from([(fields::CONTENTS.to_string(), field)]),
        }
    }

    #[test]
    fn test_open_consistent_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        write_raw(tmp.path(), &one_doc_data());
        let index = InMemoryIndex::open(tmp.path()).unwrap();
        assert_eq!(index.num_docs().unwrap(), 1);
    }

    #[test]
    fn test_open_rejects_posting_to_unknown_document() {
        let tmp = tempfile::tempdir().unwrap();
        let mut data = one_doc_data();
        if let Some(field) = data.fields.get_mut(fields::CONTENTS) {
            field.postings.insert(
                "fox".to_string(),
                PostingList {
                    entries: vec![Posting {
                        doc_id: 7,
                        positions: vec![0],
                    }],
                },
            );
        }
        write_raw(tmp.path(), &data);

        let err = InMemoryIndex::open(tmp.path()).err().unwrap();
        assert!(err.is_index_unavailable());
        assert!(err.to_string().contains("unknown document 7"));
    }

    #[test]
    fn test_open_rejects_unsorted_postings() {
        let tmp = tempfile::tempdir().unwrap();
        let mut data = one_doc_data();
        data.docs.push(StoredDocument::new("d2"));
        if let Some(field) = data.fields.get_mut(fields::CONTENTS) {
            field.lengths.push(1);
            field.vectors.push(None);
            field.postings.insert(
                "fox".to_string(),
                PostingList {
                    entries: vec![
                        Posting {
                            doc_id: 1,
                            positions: vec![0],
                        },
                        Posting {
                            doc_id: 0,
                            positions: vec![0],
                        },
                    ],
                },
            );
        }
        write_raw(tmp.path(), &data);

        let err = InMemoryIndex::open(tmp.path()).err().unwrap();
        assert!(err.is_index_unavailable());
    }

    #[test]
    fn test_open_rejects_short_length_table() {
        let tmp = tempfile::tempdir().unwrap();
        let mut data = one_doc_data();
        if let Some(field) = data.fields.get_mut(fields::CONTENTS) {
            field.lengths.clear();
        }
        write_raw(tmp.path(), &data);

        let err = InMemoryIndex::open(tmp.path()).err().unwrap();
        assert!(err.is_index_unavailable());
        assert!(err.to_string().contains("lengths"));
    }

    #[test]
    fn test_write_and_open() {
        let tmp = tempfile::tempdir().unwrap();
        let index = build(&[("d1", "the quick fox"), ("d2", "quick the fox")]);
        index.write_to_dir(tmp.path()).unwrap();

        let reopened = InMemoryIndex::open(tmp.path()).unwrap();
        assert_eq!(reopened.path(), Some(tmp.path()));
        assert_eq!(reopened.num_docs().unwrap(), 2);
        assert_eq!(reopened.lookup_document(1).unwrap().docid, "d2");
        assert_eq!(reopened.docid(0).unwrap(), "d1");
        assert_eq!(
            reopened.postings(fields::CONTENTS, "fox").unwrap(),
            index.postings(fields::CONTENTS, "fox").unwrap()
        );
        assert_eq!(
            reopened.field_stats(fields::CONTENTS).unwrap(),
            index.field_stats(fields::CONTENTS).unwrap()
        );
    }
}
