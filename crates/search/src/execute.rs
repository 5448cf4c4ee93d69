//! Query execution
//!
//! Scores every matching document of a query with the active similarity and
//! keeps the top `pool` entries in canonical order.
//!
//! Scores accumulate in a dense per-document array (indexed by internal id)
//! plus a list of touched ids, so cost is proportional to the postings
//! visited rather than the collection size. Top-k selection uses an O(n)
//! partition before sorting the kept entries.

use crate::query::Query;
use crate::scored::TieBreak;
use crate::similarity::Similarity;
use quarry_core::{InternalId, QuarryResult};
use quarry_index::{FieldStats, IndexReader, PostingList, TermStats};
use std::collections::BTreeMap;
use strsim::osa_distance;
use tracing::trace;

/// Upper bound on the number of indexed terms a fuzzy query expands to
pub const MAX_FUZZY_EXPANSIONS: usize = 50;

/// Score assigned to every document matched by a prefix query
pub const PREFIX_SCORE: f32 = 1.0;

/// A scored document reference from retrieval
///
/// Lightweight: internal id and score only. Resolve the stored fields
/// through `ScoredDocuments::from_top_docs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDocId {
    /// Internal document identifier
    pub doc_id: InternalId,
    /// Similarity score
    pub score: f32,
}

/// Result of executing a query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    /// At most `pool` entries, in canonical order
    pub docs: Vec<ScoredDocId>,
    /// Number of documents that matched before truncation
    pub total_hits: usize,
}

// ============================================================================
// Accumulator
// ============================================================================

struct Accumulator {
    scores: Vec<f32>,
    seen: Vec<bool>,
    touched: Vec<InternalId>,
}

impl Accumulator {
    fn new(num_docs: usize) -> Self {
        Accumulator {
            scores: vec![0.0; num_docs],
            seen: vec![false; num_docs],
            touched: Vec::new(),
        }
    }

    #[inline]
    fn mark(&mut self, doc_id: InternalId) -> usize {
        let did = doc_id as usize;
        if !self.seen[did] {
            self.seen[did] = true;
            self.touched.push(doc_id);
        }
        did
    }

    #[inline]
    fn add(&mut self, doc_id: InternalId, score: f32) {
        let did = self.mark(doc_id);
        self.scores[did] += score;
    }

    #[inline]
    fn set(&mut self, doc_id: InternalId, score: f32) {
        let did = self.mark(doc_id);
        self.scores[did] = score;
    }

    fn top(
        self,
        reader: &dyn IndexReader,
        pool: usize,
        tie_break: TieBreak,
    ) -> QuarryResult<TopDocs> {
        let total_hits = self.touched.len();
        if total_hits == 0 || pool == 0 {
            return Ok(TopDocs {
                docs: Vec::new(),
                total_hits,
            });
        }

        let mut result: Vec<(ScoredDocId, &str)> = self
            .touched
            .into_iter()
            .map(|doc_id| {
                Ok((
                    ScoredDocId {
                        doc_id,
                        score: self.scores[doc_id as usize],
                    },
                    reader.docid(doc_id)?,
                ))
            })
            .collect::<QuarryResult<_>>()?;

        let cmp = |a: &(ScoredDocId, &str), b: &(ScoredDocId, &str)| {
            tie_break.compare(
                (a.0.score, a.0.doc_id, a.1),
                (b.0.score, b.0.doc_id, b.1),
            )
        };

        if result.len() > pool {
            // O(n) partition: puts top-k elements in [0..k] (unordered)
            result.select_nth_unstable_by(pool - 1, cmp);
            result.truncate(pool);
        }
        result.sort_unstable_by(cmp);

        Ok(TopDocs {
            docs: result.into_iter().map(|(hit, _)| hit).collect(),
            total_hits,
        })
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Execute a query and keep the top `pool` matches.
///
/// # Errors
///
/// `IndexUnavailable` if the reader is closed.
pub fn execute(
    reader: &dyn IndexReader,
    query: &Query,
    similarity: &dyn Similarity,
    pool: usize,
    tie_break: TieBreak,
) -> QuarryResult<TopDocs> {
    reader.ensure_open()?;
    match query {
        Query::BagOfWords { field, tokens } => {
            let mut weights: BTreeMap<&str, f32> = BTreeMap::new();
            for token in tokens {
                *weights.entry(token.as_str()).or_insert(0.0) += 1.0;
            }
            let weighted: Vec<(&str, f32)> = weights.into_iter().collect();
            execute_weighted(reader, field, &weighted, similarity, pool, tie_break)
        }
        Query::Phrase { field, tokens } => {
            if tokens.len() == 1 {
                let single = [(tokens[0].as_str(), 1.0f32)];
                return execute_weighted(reader, field, &single, similarity, pool, tie_break);
            }
            let mut acc = Accumulator::new(reader.num_docs()?);
            score_phrase(reader, field, tokens, similarity, &mut acc)?;
            acc.top(reader, pool, tie_break)
        }
        Query::Prefix { field, term } => {
            let mut acc = Accumulator::new(reader.num_docs()?);
            for expanded in reader.terms_with_prefix(field, term)? {
                if let Some(postings) = reader.postings(field, &expanded)? {
                    for posting in &postings.entries {
                        acc.set(posting.doc_id, PREFIX_SCORE);
                    }
                }
            }
            acc.top(reader, pool, tie_break)
        }
        Query::Fuzzy {
            field,
            term,
            max_edit_distance,
        } => {
            let mut acc = Accumulator::new(reader.num_docs()?);
            score_fuzzy(reader, field, term, *max_edit_distance, similarity, &mut acc)?;
            acc.top(reader, pool, tie_break)
        }
    }
}

/// Execute a weighted disjunction of terms over one field.
///
/// Each document scores `sum(weight * similarity(tf))` over the terms it
/// contains. Terms are visited in the given order.
pub fn execute_weighted<S: AsRef<str>>(
    reader: &dyn IndexReader,
    field: &str,
    terms: &[(S, f32)],
    similarity: &dyn Similarity,
    pool: usize,
    tie_break: TieBreak,
) -> QuarryResult<TopDocs> {
    reader.ensure_open()?;
    let mut acc = Accumulator::new(reader.num_docs()?);
    if terms.is_empty() {
        return acc.top(reader, pool, tie_break);
    }

    let field_stats = reader.field_stats(field)?;
    for (term, weight) in terms {
        let term = term.as_ref();
        let Some(postings) = reader.postings(field, term)? else {
            continue;
        };
        let stats = reader.term_stats(field, term)?;
        score_postings(reader, field, postings, &stats, &field_stats, *weight, similarity, &mut acc)?;
    }
    acc.top(reader, pool, tie_break)
}

#[allow(clippy::too_many_arguments)]
fn score_postings(
    reader: &dyn IndexReader,
    field: &str,
    postings: &PostingList,
    stats: &TermStats,
    field_stats: &FieldStats,
    weight: f32,
    similarity: &dyn Similarity,
    acc: &mut Accumulator,
) -> QuarryResult<()> {
    for posting in &postings.entries {
        let dl = reader.field_length(field, posting.doc_id)?;
        let score = similarity.score(posting.tf() as f32, dl, stats, field_stats);
        acc.add(posting.doc_id, weight * score);
    }
    Ok(())
}

/// Number of places where `lists[i]` holds position `start + i` for every i.
fn phrase_freq(lists: &[&[u32]]) -> u32 {
    let Some((first, rest)) = lists.split_first() else {
        return 0;
    };
    first
        .iter()
        .filter(|&&start| {
            rest.iter().enumerate().all(|(i, positions)| {
                positions.binary_search(&(start + i as u32 + 1)).is_ok()
            })
        })
        .count() as u32
}

fn score_phrase(
    reader: &dyn IndexReader,
    field: &str,
    tokens: &[String],
    similarity: &dyn Similarity,
    acc: &mut Accumulator,
) -> QuarryResult<()> {
    let mut lists = Vec::with_capacity(tokens.len());
    for token in tokens {
        match reader.postings(field, token)? {
            Some(list) => lists.push(list),
            // A missing term means no document can hold the phrase
            None => return Ok(()),
        }
    }

    let field_stats = reader.field_stats(field)?;
    let term_stats = tokens
        .iter()
        .map(|t| reader.term_stats(field, t))
        .collect::<QuarryResult<Vec<_>>>()?;

    // Drive from the rarest term's document list
    let Some(driver) = lists.iter().min_by_key(|l| l.len()) else {
        return Ok(());
    };

    'docs: for candidate in &driver.entries {
        let doc_id = candidate.doc_id;
        let mut positions: Vec<&[u32]> = Vec::with_capacity(lists.len());
        for list in &lists {
            match list.get(doc_id) {
                Some(p) => positions.push(&p.positions),
                None => continue 'docs,
            }
        }
        let freq = phrase_freq(&positions);
        if freq == 0 {
            continue;
        }
        let dl = reader.field_length(field, doc_id)?;
        let score: f32 = term_stats
            .iter()
            .map(|stats| similarity.score(freq as f32, dl, stats, &field_stats))
            .sum();
        acc.add(doc_id, score);
    }
    Ok(())
}

/// A fuzzy expansion: indexed term, edit distance and boost
#[derive(Debug, Clone, PartialEq)]
struct Expansion {
    term: String,
    distance: usize,
    boost: f32,
}

/// Indexed terms within `max_edits` of `query`, best first, at most
/// `MAX_FUZZY_EXPANSIONS`.
fn fuzzy_expansions(terms: Vec<String>, query: &str, max_edits: u32) -> Vec<Expansion> {
    let query_len = query.chars().count();
    let mut expansions: Vec<Expansion> = terms
        .into_iter()
        .filter_map(|term| {
            let distance = osa_distance(&term, query);
            if distance > max_edits as usize {
                return None;
            }
            let min_len = term.chars().count().min(query_len).max(1);
            let boost = (1.0 - distance as f32 / min_len as f32).max(0.0);
            Some(Expansion {
                term,
                distance,
                boost,
            })
        })
        .collect();
    expansions.sort_by(|a, b| {
        b.boost
            .total_cmp(&a.boost)
            .then(a.distance.cmp(&b.distance))
            .then_with(|| a.term.cmp(&b.term))
    });
    expansions.truncate(MAX_FUZZY_EXPANSIONS);
    expansions
}

fn score_fuzzy(
    reader: &dyn IndexReader,
    field: &str,
    query: &str,
    max_edits: u32,
    similarity: &dyn Similarity,
    acc: &mut Accumulator,
) -> QuarryResult<()> {
    let expansions = fuzzy_expansions(reader.terms(field)?, query, max_edits);
    if expansions.is_empty() {
        return Ok(());
    }
    trace!(query, expansions = expansions.len(), "fuzzy expansion");

    // Blend statistics so that rare misspellings do not outrank the
    // intended term on idf alone
    let mut blended = TermStats::default();
    for expansion in &expansions {
        let stats = reader.term_stats(field, &expansion.term)?;
        blended.doc_freq = blended.doc_freq.max(stats.doc_freq);
        blended.total_term_freq = blended.total_term_freq.max(stats.total_term_freq);
    }

    let field_stats = reader.field_stats(field)?;
    for expansion in &expansions {
        if let Some(postings) = reader.postings(field, &expansion.term)? {
            score_postings(
                reader,
                field,
                postings,
                &blended,
                &field_stats,
                expansion.boost,
                similarity,
                acc,
            )?;
        }
    }
    Ok(())
}
