//! RM3 pseudo-relevance feedback
//!
//! Builds a relevance model from the term vectors of the top `fb_docs`
//! documents, keeps the `fb_terms` heaviest terms, interpolates it with the
//! original query and re-executes the expanded weighted query.
//!
//! ```text
//! P(t|R)  ∝ Σ_d  tf(t,d) / |d| · score(d)        (top fb_docs, pruned to fb_terms)
//! P(t|Q)  = count(t in query) / |query|
//! w(t)    = λ · P(t|Q) + (1 - λ) · P(t|R)       (λ = original_query_weight)
//! ```
//!
//! Only bag-of-words queries carry tokens; for every other query, and for an
//! empty input, the stage is the identity.

use super::{Reranker, RerankerContext};
use crate::execute::execute_weighted;
use crate::scored::ScoredDocuments;
use quarry_core::{QuarryResult, Rm3Config};
use std::collections::BTreeMap;
use tracing::debug;

/// Expansion terms outside this length range (in chars) are ignored
const MIN_TERM_LEN: usize = 2;
const MAX_TERM_LEN: usize = 20;

/// Query expansion by pseudo-relevance feedback
#[derive(Debug, Clone, Copy, Default)]
pub struct Rm3Reranker {
    config: Rm3Config,
}

impl Rm3Reranker {
    /// Create with explicit parameters
    pub fn new(config: Rm3Config) -> Self {
        Rm3Reranker { config }
    }

    /// Active parameters
    pub fn config(&self) -> &Rm3Config {
        &self.config
    }

    fn is_feedback_term(term: &str) -> bool {
        let len = term.chars().count();
        (MIN_TERM_LEN..=MAX_TERM_LEN).contains(&len) && term.chars().all(char::is_alphanumeric)
    }

    /// Relevance model over the feedback documents, pruned and L1-normalized
    fn feedback_model(
        &self,
        docs: &ScoredDocuments,
        context: &RerankerContext<'_>,
    ) -> QuarryResult<BTreeMap<String, f32>> {
        let field = context.query().field();
        let mut model: BTreeMap<String, f32> = BTreeMap::new();

        for doc in docs.iter().take(self.config.fb_docs) {
            let Some(vector) = context.reader().term_vector(doc.internal_id, field)? else {
                continue;
            };
            let doc_len: u32 = vector.values().sum();
            if doc_len == 0 {
                continue;
            }
            for (term, tf) in vector {
                if !Self::is_feedback_term(&term) {
                    continue;
                }
                *model.entry(term).or_insert(0.0) += tf as f32 / doc_len as f32 * doc.score;
            }
        }

        let mut ranked: Vec<(String, f32)> = model.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.config.fb_terms);
        Ok(l1_normalize(ranked.into_iter().collect()))
    }
}

fn l1_normalize(mut weights: BTreeMap<String, f32>) -> BTreeMap<String, f32> {
    let norm: f32 = weights.values().map(|w| w.abs()).sum();
    if norm > 0.0 {
        for w in weights.values_mut() {
            *w /= norm;
        }
    }
    weights
}

impl Reranker for Rm3Reranker {
    fn rerank(
        &self,
        docs: ScoredDocuments,
        context: &RerankerContext<'_>,
    ) -> QuarryResult<ScoredDocuments> {
        let tokens = match context.query_tokens() {
            Some(tokens) if !tokens.is_empty() => tokens,
            _ => return Ok(docs),
        };
        if docs.is_empty() {
            return Ok(docs);
        }

        let feedback = self.feedback_model(&docs, context)?;
        if feedback.is_empty() {
            return Ok(docs);
        }

        let mut original: BTreeMap<String, f32> = BTreeMap::new();
        for token in tokens {
            *original.entry(token.clone()).or_insert(0.0) += 1.0;
        }
        let original = l1_normalize(original);

        let lambda = self.config.original_query_weight;
        let mut expanded: BTreeMap<String, f32> = BTreeMap::new();
        for (term, weight) in original {
            *expanded.entry(term).or_insert(0.0) += lambda * weight;
        }
        for (term, weight) in feedback {
            *expanded.entry(term).or_insert(0.0) += (1.0 - lambda) * weight;
        }
        let terms: Vec<(String, f32)> = expanded.into_iter().filter(|(_, w)| *w > 0.0).collect();
        debug!(
            query = context.query_string(),
            expansion_terms = terms.len(),
            "rm3 expanded query"
        );

        let reader = context.reader();
        let top = execute_weighted(
            reader,
            context.query().field(),
            &terms,
            context.similarity(),
            context.candidate_pool(),
            context.tie_break(),
        )?;
        ScoredDocuments::from_top_docs(reader, &top)
    }

    fn name(&self) -> &str {
        "rm3"
    }
}
