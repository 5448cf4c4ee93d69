//! Tie adjustment
//!
//! Last stage of every cascade. Upstream stages may rescore documents and
//! leave equal scores in arbitrary relative order; this stage restores the
//! canonical order (score descending, then the tie key). It never changes
//! scores or membership, so applying it twice equals applying it once.

use super::{Reranker, RerankerContext};
use crate::scored::ScoredDocuments;
use quarry_core::QuarryResult;

/// Re-imposes canonical tie order
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreTiesAdjuster;

impl Reranker for ScoreTiesAdjuster {
    fn rerank(
        &self,
        mut docs: ScoredDocuments,
        context: &RerankerContext<'_>,
    ) -> QuarryResult<ScoredDocuments> {
        docs.sort_canonical(context.tie_break());
        Ok(docs)
    }

    fn name(&self) -> &str {
        "score-ties-adjuster"
    }
}
