//! Query execution and reranking for Quarry
//!
//! This crate provides:
//! - Query: bag-of-words, phrase, prefix and fuzzy query construction
//! - Similarity trait with BM25 (default) and Dirichlet implementations
//! - execute: top-k retrieval with deterministic tie-breaking
//! - Reranker trait and RerankerCascade (ScoreTiesAdjuster, Rm3Reranker)
//! - materialize: truncation to `hits` and metadata extraction
//! - Searcher: the public search surface with snapshot configuration
//!
//! # Usage
//!
//! ```
//! use quarry_core::StoredDocument;
//! use quarry_index::{DefaultAnalyzer, IndexBuilder};
//! use quarry_search::Searcher;
//! use std::sync::Arc;
//!
//! let builder = IndexBuilder::new(Arc::new(DefaultAnalyzer));
//! builder
//!     .add_document(StoredDocument::new("d1").with_field("contents", "the quick fox"))
//!     .unwrap();
//! builder
//!     .add_document(StoredDocument::new("d2").with_field("contents", "quick the fox"))
//!     .unwrap();
//!
//! let searcher = Searcher::new(Arc::new(builder.finish()));
//! let results = searcher
//!     .search_with("quick fox", "contents", false, "match", 10)
//!     .unwrap();
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0].docid, "d1");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod execute;
pub mod materialize;
pub mod query;
pub mod rerank;
pub mod scored;
pub mod searcher;
pub mod similarity;

// Re-export commonly used types
pub use execute::{execute, execute_weighted, ScoredDocId, TopDocs};
pub use materialize::{materialize, SearchResult};
pub use query::{fuzzy_edit_distance, Query};
pub use rerank::{
    Reranker, RerankerCascade, RerankerContext, Rm3Reranker, ScoreTiesAdjuster,
};
pub use scored::{ScoredDocument, ScoredDocuments, TieBreak};
pub use searcher::{SearchSettings, Searcher};
pub use similarity::{Bm25Similarity, DirichletSimilarity, Similarity};
