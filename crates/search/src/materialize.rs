//! Result materialization
//!
//! Converts the final scored set into result records. The order of the set
//! is kept exactly; only the first `hits` entries survive. Scores are
//! carried through from the last stage that assigned them.

use crate::scored::ScoredDocuments;
use quarry_core::{fields, InternalId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One externally visible search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// External document identifier
    pub docid: String,
    /// Internal document identifier
    pub internal_id: InternalId,
    /// Final score
    pub score: f32,
    /// Raw document content, `None` when not stored
    pub content: Option<String>,
    /// Requested metadata fields; `None` marks a field absent on the document
    pub metadata: BTreeMap<String, Option<String>>,
}

impl SearchResult {
    /// Value of a requested metadata field.
    ///
    /// `None` both when the field was not requested and when it is absent
    /// on the document; use `metadata` to tell them apart.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).and_then(|v| v.as_deref())
    }

    /// Entity URI (the `title` field)
    pub fn uri(&self) -> Option<&str> {
        self.field(fields::TITLE)
    }

    /// Entity prior (the `prior` field)
    pub fn prior(&self) -> Option<&str> {
        self.field(fields::PRIOR)
    }

    /// Entity aliases (the `alias` field)
    pub fn alias(&self) -> Option<&str> {
        self.field(fields::ALIAS)
    }
}

/// Build at most `hits` results from `docs`, extracting `metadata_fields`.
pub fn materialize(
    docs: ScoredDocuments,
    metadata_fields: &[String],
    hits: usize,
) -> Vec<SearchResult> {
    docs.into_iter()
        .take(hits)
        .map(|scored| {
            let metadata = metadata_fields
                .iter()
                .map(|name| (name.clone(), scored.document.get(name).map(str::to_string)))
                .collect();
            SearchResult {
                content: scored.raw().map(str::to_string),
                docid: scored.document.docid,
                internal_id: scored.internal_id,
                score: scored.score,
                metadata,
            }
        })
        .collect()
}
