//! Reranker cascade
//!
//! After retrieval produces the candidate pool, an ordered list of stages
//! transforms it before materialization:
//!
//! ```text
//! execute(query) → candidate pool
//!     → [feedback stage] → ScoreTiesAdjuster
//!     → materialize(hits)
//! ```
//!
//! Every stage receives the same immutable `RerankerContext`. A stage may
//! reorder, rescore or resize the set; the cascade never skips a stage, an
//! empty set is passed through like any other.

pub mod rm3;
pub mod ties;

pub use rm3::Rm3Reranker;
pub use ties::ScoreTiesAdjuster;

use crate::query::Query;
use crate::scored::{ScoredDocuments, TieBreak};
use crate::similarity::Similarity;
use quarry_core::{QuarryError, QuarryResult, SearchArgs};
use quarry_index::IndexReader;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// RerankerContext
// ============================================================================

/// Per-search state shared read-only with every stage
#[derive(Clone, Copy)]
pub struct RerankerContext<'a> {
    reader: &'a dyn IndexReader,
    similarity: &'a dyn Similarity,
    query: &'a Query,
    query_string: &'a str,
    search_args: SearchArgs,
    candidate_pool: usize,
}

impl<'a> RerankerContext<'a> {
    /// Bundle the state of one search call
    pub fn new(
        reader: &'a dyn IndexReader,
        similarity: &'a dyn Similarity,
        query: &'a Query,
        query_string: &'a str,
        search_args: SearchArgs,
        candidate_pool: usize,
    ) -> Self {
        RerankerContext {
            reader,
            similarity,
            query,
            query_string,
            search_args,
            candidate_pool,
        }
    }

    /// Index the search runs against
    pub fn reader(&self) -> &'a dyn IndexReader {
        self.reader
    }

    /// Similarity captured at the start of the search
    pub fn similarity(&self) -> &'a dyn Similarity {
        self.similarity
    }

    /// The executed query
    pub fn query(&self) -> &'a Query {
        self.query
    }

    /// The query string as given by the caller
    pub fn query_string(&self) -> &'a str {
        self.query_string
    }

    /// Analyzed tokens; absent unless the query is bag-of-words
    pub fn query_tokens(&self) -> Option<&'a [String]> {
        self.query.bag_of_words_tokens()
    }

    /// Search arguments of this call
    pub fn search_args(&self) -> &SearchArgs {
        &self.search_args
    }

    /// Number of candidates retrieved before reranking
    pub fn candidate_pool(&self) -> usize {
        self.candidate_pool
    }

    /// Tie-break policy of this call
    pub fn tie_break(&self) -> TieBreak {
        TieBreak::from_args(&self.search_args)
    }
}

impl Debug for RerankerContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RerankerContext")
            .field("similarity", &self.similarity.name())
            .field("query", self.query)
            .field("query_string", &self.query_string)
            .field("search_args", &self.search_args)
            .field("candidate_pool", &self.candidate_pool)
            .finish()
    }
}

// ============================================================================
// Reranker Trait
// ============================================================================

/// One reranking stage.
///
/// Implementations must not keep state between calls: the same stage object
/// is shared by concurrent searches. The trait is object-safe for use as
/// `Arc<dyn Reranker>`.
///
/// # Implementations
///
/// - `ScoreTiesAdjuster`: re-imposes canonical tie order
/// - `Rm3Reranker`: pseudo-relevance feedback query expansion
pub trait Reranker: Send + Sync + Debug {
    /// Transform the current document set
    fn rerank(
        &self,
        docs: ScoredDocuments,
        context: &RerankerContext<'_>,
    ) -> QuarryResult<ScoredDocuments>;

    /// Stage name, used in logs and failure reports
    fn name(&self) -> &str;
}

// ============================================================================
// RerankerCascade
// ============================================================================

/// Ordered list of reranking stages
#[derive(Debug, Clone)]
pub struct RerankerCascade {
    stages: Vec<Arc<dyn Reranker>>,
}

impl Default for RerankerCascade {
    fn default() -> Self {
        RerankerCascade {
            stages: vec![Arc::new(ScoreTiesAdjuster)],
        }
    }
}

impl RerankerCascade {
    /// Cascade with no stages
    pub fn new() -> Self {
        RerankerCascade { stages: Vec::new() }
    }

    /// Feedback stage followed by the tie adjuster
    pub fn with_feedback(stage: Arc<dyn Reranker>) -> Self {
        RerankerCascade {
            stages: vec![stage, Arc::new(ScoreTiesAdjuster)],
        }
    }

    /// Builder: append a stage
    pub fn add(mut self, stage: Arc<dyn Reranker>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True if there are no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Apply every stage in registration order.
    ///
    /// # Errors
    ///
    /// `StageFailure` naming the first stage that failed (`<position>:<name>`).
    /// Later stages do not run.
    pub fn run(
        &self,
        mut docs: ScoredDocuments,
        context: &RerankerContext<'_>,
    ) -> QuarryResult<ScoredDocuments> {
        for (position, stage) in self.stages.iter().enumerate() {
            let before = docs.len();
            docs = stage.rerank(docs, context).map_err(|e| {
                let identity = format!("{}:{}", position, stage.name());
                warn!(stage = %identity, error = %e, "reranker stage failed");
                QuarryError::stage_failure(identity, e)
            })?;
            debug!(
                stage = stage.name(),
                position,
                before,
                after = docs.len(),
                "reranker stage applied"
            );
        }
        Ok(docs)
    }
}
