//! Quarry - deterministic lexical search over an inverted index
//!
//! Quarry turns a query string into a ranked, reproducible list of
//! documents: analyze, build a bag-of-words / phrase / prefix / fuzzy query,
//! score with BM25, rerank through a cascade and materialize the top hits.
//!
//! # Quick Start
//!
//! ```
//! use quarry::{DefaultAnalyzer, IndexBuilder, Searcher, StoredDocument};
//! use std::sync::Arc;
//!
//! let builder = IndexBuilder::new(Arc::new(DefaultAnalyzer));
//! builder
//!     .add_document(StoredDocument::new("d1").with_field("contents", "rust search engine"))
//!     .unwrap();
//!
//! let searcher = Searcher::new(Arc::new(builder.finish()));
//! let results = searcher.search("search", 10).unwrap();
//! assert_eq!(results[0].docid, "d1");
//! ```
//!
//! # Architecture
//!
//! - `quarry-core`: errors, search arguments, configuration
//! - `quarry-index`: analyzers and the `IndexReader` collaborator
//! - `quarry-search`: query construction, scoring, reranking, `Searcher`

pub use quarry_core::*;
pub use quarry_index::*;
pub use quarry_search::*;
