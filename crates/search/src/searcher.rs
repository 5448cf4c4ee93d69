//! Searcher: the public search surface
//!
//! A `Searcher` owns a shared index reader and a configuration snapshot
//! (analyzer, similarity, reranker cascade, search defaults).
//!
//! # Flow
//!
//! ```text
//! query string
//!     → analyze → Query::build                     (QueryBuilt)
//!     → execute(query, similarity, pool)           (Retrieved)
//!     → RerankerCascade::run                       (Reranked)
//!     → materialize(hits)                          (Materialized)
//! ```
//!
//! Any failure moves the call straight to `Failed`; no partial result is
//! returned.
//!
//! # Configuration Snapshot
//!
//! Settings live behind `RwLock<Arc<SearchSettings>>`. Every search clones
//! the `Arc` once at its start, and every setter installs a fresh `Arc`.
//! Reconfiguration therefore only affects searches that start after the
//! setter returns; in-flight searches finish on the snapshot they took.

use crate::execute::execute;
use crate::materialize::{materialize, SearchResult};
use crate::query::Query;
use crate::rerank::{RerankerCascade, RerankerContext, Rm3Reranker};
use crate::scored::{ScoredDocuments, TieBreak};
use crate::similarity::{self, Similarity};
use parking_lot::RwLock;
use quarry_core::{
    QueryMode, QuarryError, QuarryResult, Rm3Config, SearchArgs, SearcherConfig, SimilarityConfig,
};
use quarry_index::{analyzer_for_language, Analyzer, InMemoryIndex, IndexReader};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// SearchPhase
// ============================================================================

/// Per-call pipeline state, reported in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchPhase {
    QueryBuilt,
    Retrieved,
    Reranked,
    Materialized,
    Failed,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchPhase::QueryBuilt => "query_built",
            SearchPhase::Retrieved => "retrieved",
            SearchPhase::Reranked => "reranked",
            SearchPhase::Materialized => "materialized",
            SearchPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// SearchSettings
// ============================================================================

/// Immutable configuration snapshot used by one or more searches
#[derive(Debug, Clone)]
pub struct SearchSettings {
    language: String,
    analyzer: Arc<dyn Analyzer>,
    similarity: Arc<dyn Similarity>,
    cascade: RerankerCascade,
    rerank: bool,
    default_field: String,
    args: SearchArgs,
    metadata_fields: Vec<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let config = SearcherConfig::default();
        SearchSettings {
            analyzer: analyzer_for_language(&config.language),
            language: config.language,
            similarity: Arc::new(similarity::Bm25Similarity::default()),
            cascade: RerankerCascade::default(),
            rerank: false,
            default_field: config.default_field,
            args: SearchArgs::default(),
            metadata_fields: config.metadata_fields,
        }
    }
}

impl SearchSettings {
    /// Analyzer language code
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Active analyzer
    pub fn analyzer(&self) -> &dyn Analyzer {
        self.analyzer.as_ref()
    }

    /// Active similarity
    pub fn similarity(&self) -> &dyn Similarity {
        self.similarity.as_ref()
    }

    /// Active reranker cascade
    pub fn cascade(&self) -> &RerankerCascade {
        &self.cascade
    }

    /// Whether the candidate pool is sized by the rerank cutoff
    pub fn rerank(&self) -> bool {
        self.rerank
    }

    /// Field searched by `Searcher::search`
    pub fn default_field(&self) -> &str {
        &self.default_field
    }

    /// Default search arguments (`hits` is overridden per call)
    pub fn search_args(&self) -> &SearchArgs {
        &self.args
    }

    /// Stored fields copied into every result
    pub fn metadata_fields(&self) -> &[String] {
        &self.metadata_fields
    }
}

// ============================================================================
// Searcher
// ============================================================================

/// Executes queries against a shared, read-only index
///
/// # Thread Safety
///
/// `Searcher` is `Send + Sync`; any number of threads may search
/// concurrently, and setters may be called while searches are in flight.
pub struct Searcher {
    reader: Arc<dyn IndexReader>,
    settings: RwLock<Arc<SearchSettings>>,
}

impl fmt::Debug for Searcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Searcher")
            .field("settings", &*self.settings.read())
            .finish_non_exhaustive()
    }
}

impl Searcher {
    /// Create a searcher over an already opened reader with default settings
    pub fn new(reader: Arc<dyn IndexReader>) -> Self {
        Searcher {
            reader,
            settings: RwLock::new(Arc::new(SearchSettings::default())),
        }
    }

    /// Open the index directory at `path` with default settings.
    ///
    /// # Errors
    ///
    /// `IndexUnavailable` if the directory is missing, unreadable or holds
    /// no valid index.
    pub fn open(path: impl AsRef<Path>) -> QuarryResult<Self> {
        let index = InMemoryIndex::open(path)?;
        Ok(Self::new(Arc::new(index)))
    }

    /// Open the index at `path` and apply `config`.
    ///
    /// The config is validated before the index is touched.
    pub fn from_config(path: impl AsRef<Path>, config: &SearcherConfig) -> QuarryResult<Self> {
        config.validate()?;
        let index = InMemoryIndex::open(path)?;
        Self::with_config(Arc::new(index), config)
    }

    /// Create a searcher over `reader` and apply `config`.
    pub fn with_config(
        reader: Arc<dyn IndexReader>,
        config: &SearcherConfig,
    ) -> QuarryResult<Self> {
        config.validate()?;
        let cascade = match config.rerank.rm3 {
            Some(rm3) => RerankerCascade::with_feedback(Arc::new(Rm3Reranker::new(rm3))),
            None => RerankerCascade::default(),
        };
        let settings = SearchSettings {
            language: config.language.clone(),
            analyzer: analyzer_for_language(&config.language),
            similarity: similarity::from_config(config.similarity)?,
            cascade,
            rerank: config.rerank.enabled,
            default_field: config.default_field.clone(),
            args: config.search_args(),
            metadata_fields: config.metadata_fields.clone(),
        };
        Ok(Searcher {
            reader,
            settings: RwLock::new(Arc::new(settings)),
        })
    }

    /// The shared index reader
    pub fn reader(&self) -> &Arc<dyn IndexReader> {
        &self.reader
    }

    /// Current configuration snapshot
    pub fn settings(&self) -> Arc<SearchSettings> {
        Arc::clone(&self.settings.read())
    }

    fn update(&self, f: impl FnOnce(&mut SearchSettings)) {
        let mut guard = self.settings.write();
        let mut next = SearchSettings::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }

    // ========================================================================
    // Reconfiguration
    // ========================================================================

    /// Select the analyzer: `"zh"` → CJK bigrams, anything else → default
    pub fn set_language(&self, language: &str) {
        let analyzer = analyzer_for_language(language);
        info!(language, analyzer = analyzer.name(), "analyzer changed");
        self.update(|s| {
            s.language = language.to_string();
            s.analyzer = analyzer;
        });
    }

    /// Replace the similarity with BM25(k1, b)
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `k1` is finite and `>= 0` and `b` is in `[0, 1]`.
    pub fn configure_bm25(&self, k1: f32, b: f32) -> QuarryResult<()> {
        self.set_similarity(SimilarityConfig::bm25(k1, b))
    }

    /// Replace the similarity
    pub fn set_similarity(&self, config: SimilarityConfig) -> QuarryResult<()> {
        let similarity = similarity::from_config(config)?;
        info!(similarity = ?config, "similarity changed");
        self.update(|s| s.similarity = similarity);
        Ok(())
    }

    /// Replace the reranker cascade. The rerank flag is left unchanged.
    pub fn set_reranker(&self, cascade: RerankerCascade) {
        info!(stages = ?cascade.names(), "reranker cascade changed");
        self.update(|s| s.cascade = cascade);
    }

    /// Restore the single tie-adjuster cascade and disable reranking
    pub fn set_default_reranker(&self) {
        info!("default reranker restored");
        self.update(|s| {
            s.cascade = RerankerCascade::default();
            s.rerank = false;
        });
    }

    /// Enable RM3 feedback before the tie adjuster and enable reranking
    pub fn set_rm3(&self, config: Rm3Config) {
        info!(?config, "rm3 enabled");
        self.update(|s| {
            s.cascade = RerankerCascade::with_feedback(Arc::new(Rm3Reranker::new(config)));
            s.rerank = true;
        });
    }

    /// Toggle reranking and set the candidate pool used when enabled
    pub fn set_rerank(&self, enabled: bool, cutoff: usize) {
        info!(enabled, cutoff, "rerank settings changed");
        self.update(|s| {
            s.rerank = enabled;
            s.args.rerank_cutoff = cutoff;
        });
    }

    /// Break score ties by internal id instead of external docid
    pub fn set_arbitrary_score_tie_break(&self, arbitrary: bool) {
        self.update(|s| s.args.arbitrary_score_tie_break = arbitrary);
    }

    /// Stored fields copied into every result
    pub fn set_metadata_fields(&self, names: Vec<String>) {
        self.update(|s| s.metadata_fields = names);
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Bag-of-words search over the default field
    pub fn search(&self, query: &str, hits: usize) -> QuarryResult<Vec<SearchResult>> {
        let settings = self.settings();
        let field = settings.default_field.clone();
        self.search_in(&settings, query, &field, QueryMode::BagOfWords, hits)
    }

    /// Bag-of-words search over the default field, returning the configured
    /// number of hits (`hits` in `quarry.toml`, 10 by default)
    pub fn search_default(&self, query: &str) -> QuarryResult<Vec<SearchResult>> {
        let settings = self.settings();
        let field = settings.default_field.clone();
        let hits = settings.args.hits;
        self.search_in(&settings, query, &field, QueryMode::BagOfWords, hits)
    }

    /// Search with explicit field and mode.
    ///
    /// `normalize = true` selects bag-of-words and ignores `query_mode`;
    /// otherwise `query_mode` must be `"match"`, `"prefix"` or `"fuzzy"`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedQueryMode` for any other mode string
    /// - `EmptyQueryTerm` for an empty prefix or fuzzy term
    /// - `IndexUnavailable` once the searcher is closed
    /// - `StageFailure` if a reranker stage fails
    pub fn search_with(
        &self,
        query: &str,
        field: &str,
        normalize: bool,
        query_mode: &str,
        hits: usize,
    ) -> QuarryResult<Vec<SearchResult>> {
        let mode = if normalize {
            QueryMode::BagOfWords
        } else {
            QueryMode::parse(query_mode)?
        };
        let settings = self.settings();
        self.search_in(&settings, query, field, mode, hits)
    }

    /// Run a pre-built query. `query_string` is handed to reranker stages.
    pub fn search_query(
        &self,
        query: &Query,
        query_string: &str,
        hits: usize,
    ) -> QuarryResult<Vec<SearchResult>> {
        let settings = self.settings();
        self.run(&settings, query, query_string, hits)
    }

    fn search_in(
        &self,
        settings: &SearchSettings,
        query_string: &str,
        field: &str,
        mode: QueryMode,
        hits: usize,
    ) -> QuarryResult<Vec<SearchResult>> {
        let tokens = match mode {
            QueryMode::BagOfWords | QueryMode::Phrase => settings.analyzer.tokenize(query_string),
            QueryMode::Prefix | QueryMode::Fuzzy => Vec::new(),
        };
        let query = Query::build(mode, field, query_string, tokens).map_err(failed)?;
        debug!(
            phase = %SearchPhase::QueryBuilt,
            mode = %mode,
            field,
            matches_nothing = query.matches_nothing(),
            "search phase"
        );
        self.run(settings, &query, query_string, hits)
    }

    fn run(
        &self,
        settings: &SearchSettings,
        query: &Query,
        query_string: &str,
        hits: usize,
    ) -> QuarryResult<Vec<SearchResult>> {
        let args = SearchArgs {
            hits,
            ..settings.args
        };
        let pool = args.candidate_pool_size(settings.rerank).map_err(failed)?;
        let reader = self.reader.as_ref();
        let similarity = settings.similarity.as_ref();

        let top = execute(reader, query, similarity, pool, TieBreak::from_args(&args))
            .map_err(failed)?;
        let docs = ScoredDocuments::from_top_docs(reader, &top).map_err(failed)?;
        debug!(
            phase = %SearchPhase::Retrieved,
            pool,
            candidates = docs.len(),
            total_hits = top.total_hits,
            "search phase"
        );

        let context = RerankerContext::new(reader, similarity, query, query_string, args, pool);
        let docs = settings.cascade.run(docs, &context).map_err(failed)?;
        debug!(
            phase = %SearchPhase::Reranked,
            stages = settings.cascade.len(),
            docs = docs.len(),
            "search phase"
        );

        let results = materialize(docs, &settings.metadata_fields, hits);
        debug!(phase = %SearchPhase::Materialized, results = results.len(), "search phase");
        Ok(results)
    }

    /// Close the underlying reader; later searches fail with `IndexUnavailable`
    pub fn close(&self) {
        self.reader.close();
    }
}

fn failed(e: QuarryError) -> QuarryError {
    warn!(phase = %SearchPhase::Failed, error = %e, "search failed");
    e
}
