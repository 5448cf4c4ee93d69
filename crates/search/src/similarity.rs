//! Similarity functions
//!
//! This module provides:
//! - Similarity trait for pluggable scoring
//! - Bm25Similarity (default: k1 = 1.2, b = 0.75)
//! - DirichletSimilarity (query likelihood, Dirichlet smoothing)
//!
//! A similarity is pure: its score depends only on the term frequency, the
//! document length and collection statistics. Instances are shared across
//! concurrent searches behind an `Arc`.

use quarry_core::{QuarryResult, SimilarityConfig};
use quarry_index::{FieldStats, TermStats};
use std::fmt::Debug;
use std::sync::Arc;

// ============================================================================
// Similarity Trait
// ============================================================================

/// Pluggable scoring interface
///
/// Returns the contribution of one term to one document's score.
/// Higher scores indicate more relevant documents.
///
/// # Thread Safety
///
/// Similarities must be Send + Sync for concurrent search operations.
pub trait Similarity: Send + Sync + Debug {
    /// Score one term occurrence count in one document
    ///
    /// `freq` is the term (or phrase) frequency, `doc_len` the field length
    /// in tokens. A zero `freq` scores 0.
    fn score(&self, freq: f32, doc_len: u32, term: &TermStats, field: &FieldStats) -> f32;

    /// Serializable description of this similarity
    fn config(&self) -> SimilarityConfig;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

/// Instantiate the similarity described by `config`.
///
/// # Errors
///
/// `InvalidArgument` if the parameters are out of range.
pub fn from_config(config: SimilarityConfig) -> QuarryResult<Arc<dyn Similarity>> {
    config.validate()?;
    Ok(match config {
        SimilarityConfig::Bm25 { k1, b } => Arc::new(Bm25Similarity { k1, b }),
        SimilarityConfig::Dirichlet { mu } => Arc::new(DirichletSimilarity { mu }),
    })
}

// ============================================================================
// Bm25Similarity
// ============================================================================

/// Okapi BM25
///
/// # BM25 Formula
///
/// score = IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl/avgdl))
///
/// Where:
/// - IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1)
/// - N = documents with the field, df = documents containing t
/// - dl = field length, avgdl = average field length (floored at 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Similarity {
    /// k1 parameter: term frequency saturation (default 1.2)
    k1: f32,
    /// b parameter: length normalization (default 0.75)
    b: f32,
}

impl Default for Bm25Similarity {
    fn default() -> Self {
        Bm25Similarity {
            k1: SimilarityConfig::DEFAULT_K1,
            b: SimilarityConfig::DEFAULT_B,
        }
    }
}

impl Bm25Similarity {
    /// Create a BM25 similarity with custom parameters
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `k1` is finite and `>= 0` and `b` is in `[0, 1]`.
    pub fn new(k1: f32, b: f32) -> QuarryResult<Self> {
        SimilarityConfig::bm25(k1, b).validate()?;
        Ok(Bm25Similarity { k1, b })
    }

    /// Term frequency saturation
    pub fn k1(&self) -> f32 {
        self.k1
    }

    /// Length normalization
    pub fn b(&self) -> f32 {
        self.b
    }

    /// Inverse document frequency with +1 smoothing (never negative)
    pub fn idf(doc_freq: u64, doc_count: u64) -> f32 {
        let df = doc_freq as f32;
        let n = doc_count as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

impl Similarity for Bm25Similarity {
    fn score(&self, freq: f32, doc_len: u32, term: &TermStats, field: &FieldStats) -> f32 {
        if freq <= 0.0 {
            return 0.0;
        }
        let idf = Self::idf(term.doc_freq, field.doc_count);
        let avg_len = field.avg_len().max(1.0);
        let dl = doc_len as f32;
        let tf_component =
            (freq * (self.k1 + 1.0)) / (freq + self.k1 * (1.0 - self.b + self.b * dl / avg_len));
        idf * tf_component
    }

    fn config(&self) -> SimilarityConfig {
        SimilarityConfig::bm25(self.k1, self.b)
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

// ============================================================================
// DirichletSimilarity
// ============================================================================

/// Query likelihood with Dirichlet prior smoothing
///
/// score = max(0, ln(1 + tf / (mu * p(t|C))) + ln(mu / (dl + mu)))
///
/// where p(t|C) = (ttf + 1) / (total field tokens + 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirichletSimilarity {
    mu: f32,
}

impl Default for DirichletSimilarity {
    fn default() -> Self {
        DirichletSimilarity {
            mu: SimilarityConfig::DEFAULT_MU,
        }
    }
}

impl DirichletSimilarity {
    /// Create with a custom smoothing mass
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `mu` is finite and `> 0`.
    pub fn new(mu: f32) -> QuarryResult<Self> {
        SimilarityConfig::dirichlet(mu).validate()?;
        Ok(DirichletSimilarity { mu })
    }

    /// Smoothing mass
    pub fn mu(&self) -> f32 {
        self.mu
    }
}

impl Similarity for DirichletSimilarity {
    fn score(&self, freq: f32, doc_len: u32, term: &TermStats, field: &FieldStats) -> f32 {
        if freq <= 0.0 {
            return 0.0;
        }
        let collection_prob =
            (term.total_term_freq as f32 + 1.0) / (field.sum_total_term_freq as f32 + 1.0);
        let dl = doc_len as f32;
        let score = (1.0 + freq / (self.mu * collection_prob)).ln() + (self.mu / (dl + self.mu)).ln();
        score.max(0.0)
    }

    fn config(&self) -> SimilarityConfig {
        SimilarityConfig::dirichlet(self.mu)
    }

    fn name(&self) -> &str {
        "dirichlet"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::QuarryError;

    fn field(doc_count: u64, total: u64) -> FieldStats {
        FieldStats {
            doc_count,
            sum_total_term_freq: total,
        }
    }

    fn term(doc_freq: u64, ttf: u64) -> TermStats {
        TermStats {
            doc_freq,
            total_term_freq: ttf,
        }
    }

    // ========================================
    // BM25 Tests
    // ========================================

    #[test]
    fn test_bm25_defaults() {
        let sim = Bm25Similarity::default();
        assert_eq!(sim.k1(), 1.2);
        assert_eq!(sim.b(), 0.75);
        assert_eq!(sim.config(), SimilarityConfig::bm25(1.2, 0.75));
        assert_eq!(sim.name(), "bm25");
    }

    #[test]
    fn test_bm25_zero_freq() {
        let sim = Bm25Similarity::default();
        assert_eq!(sim.score(0.0, 10, &term(1, 1), &field(10, 100)), 0.0);
    }

    #[test]
    fn test_bm25_rare_terms_score_higher() {
        let sim = Bm25Similarity::default();
        let stats = field(100, 1000);
        let rare = sim.score(1.0, 10, &term(1, 1), &stats);
        let common = sim.score(1.0, 10, &term(50, 60), &stats);
        assert!(rare > common);
        assert!(common > 0.0);
    }

    #[test]
    fn test_bm25_shorter_docs_score_higher() {
        let sim = Bm25Similarity::default();
        let stats = field(10, 100);
        let short = sim.score(1.0, 5, &term(2, 2), &stats);
        let long = sim.score(1.0, 20, &term(2, 2), &stats);
        assert!(short > long);
    }

    #[test]
    fn test_bm25_tf_saturates() {
        let sim = Bm25Similarity::default();
        let stats = field(10, 100);
        let s1 = sim.score(1.0, 10, &term(2, 2), &stats);
        let s2 = sim.score(2.0, 10, &term(2, 2), &stats);
        let s3 = sim.score(3.0, 10, &term(2, 2), &stats);
        let s10 = sim.score(10.0, 10, &term(2, 2), &stats);
        assert!(s2 > s1);
        assert!(s3 - s2 < s2 - s1);
        // upper bound: idf * (k1 + 1)
        assert!(s10 < Bm25Similarity::idf(2, 10) * 2.2);
    }

    #[test]
    fn test_bm25_known_value() {
        // N = 2, df = 2, dl = avgdl: idf = ln(0.5 / 2.5 + 1), tf part = 1
        let sim = Bm25Similarity::default();
        let score = sim.score(1.0, 3, &term(2, 2), &field(2, 6));
        let expected = (0.2f32 + 1.0).ln();
        assert!((score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_bm25_b_zero_ignores_length() {
        let sim = Bm25Similarity::new(1.2, 0.0).unwrap();
        let stats = field(10, 100);
        let short = sim.score(1.0, 1, &term(2, 2), &stats);
        let long = sim.score(1.0, 50, &term(2, 2), &stats);
        assert!((short - long).abs() < 1e-6);
    }

    #[test]
    fn test_bm25_rejects_bad_params() {
        assert!(matches!(
            Bm25Similarity::new(-1.0, 0.75),
            Err(QuarryError::InvalidArgument(_))
        ));
        assert!(Bm25Similarity::new(1.2, 1.5).is_err());
        assert!(Bm25Similarity::new(f32::NAN, 0.5).is_err());
    }

    // ========================================
    // Dirichlet Tests
    // ========================================

    #[test]
    fn test_dirichlet_non_negative() {
        let sim = DirichletSimilarity::default();
        let stats = field(10, 100);
        // frequent term in a very long document can go negative before clamping
        let score = sim.score(1.0, 10_000, &term(10, 90), &stats);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_dirichlet_more_occurrences_score_higher() {
        let sim = DirichletSimilarity::new(10.0).unwrap();
        let stats = field(10, 1000);
        let s1 = sim.score(1.0, 10, &term(2, 3), &stats);
        let s3 = sim.score(3.0, 10, &term(2, 3), &stats);
        assert!(s3 > s1);
        assert!(s1 > 0.0);
    }

    #[test]
    fn test_dirichlet_rejects_bad_mu() {
        assert!(DirichletSimilarity::new(0.0).is_err());
        assert!(DirichletSimilarity::new(-5.0).is_err());
    }

    // ========================================
    // from_config Tests
    // ========================================

    #[test]
    fn test_from_config() {
        let sim = from_config(SimilarityConfig::bm25(0.9, 0.4)).unwrap();
        assert_eq!(sim.name(), "bm25");
        assert_eq!(sim.config(), SimilarityConfig::bm25(0.9, 0.4));

        let sim = from_config(SimilarityConfig::dirichlet(500.0)).unwrap();
        assert_eq!(sim.name(), "dirichlet");
    }

    #[test]
    fn test_from_config_validates() {
        assert!(from_config(SimilarityConfig::bm25(1.2, 2.0)).is_err());
    }

    #[test]
    fn test_similarity_is_pure() {
        let sim = Bm25Similarity::default();
        let a = sim.score(2.0, 7, &term(3, 4), &field(20, 140));
        let b = sim.score(2.0, 7, &term(3, 4), &field(20, 140));
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
