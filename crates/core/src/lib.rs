//! Core types for Quarry
//!
//! This crate defines the foundational types shared by the index and search
//! crates:
//! - Error: the `QuarryError` taxonomy and `QuarryResult` alias
//! - Search types: SearchArgs, QueryMode, SimilarityConfig, StoredDocument
//! - Field names used by stored documents
//! - Config: `quarry.toml` searcher configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod search_types;

pub use config::{RerankConfig, Rm3Config, SearcherConfig, CONFIG_FILE_NAME};
pub use error::{QuarryError, QuarryResult};
pub use search_types::{
    fields, InternalId, QueryMode, SearchArgs, SimilarityConfig, StoredDocument,
};
