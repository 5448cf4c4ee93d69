//! Index collaborators for Quarry
//!
//! The searcher only ever talks to an index and an analyzer through the
//! narrow traits defined here:
//! - `Analyzer`: text → ordered, positioned tokens (default and CJK variants)
//! - `IndexReader`: read-only postings, statistics and stored documents
//!
//! `InMemoryIndex` is the reference reader: built with `IndexBuilder`,
//! persisted with `write_to_dir`, reopened with `InMemoryIndex::open`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analyzer;
pub mod memory;
pub mod reader;
mod snapshot;

pub use analyzer::{analyzer_for_language, Analyzer, CjkAnalyzer, DefaultAnalyzer, Token};
pub use memory::{InMemoryIndex, IndexBuilder};
pub use reader::{FieldStats, IndexReader, Posting, PostingList, TermStats};
pub use snapshot::INDEX_FILE_NAME;
