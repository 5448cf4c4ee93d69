//! Searcher configuration via `quarry.toml`
//!
//! The config describes everything a searcher applies on top of an opened
//! index: analyzer language, similarity, reranking and the metadata fields
//! copied into each result. Reconfiguring a live searcher goes through its
//! explicit setters; this file only seeds the initial state.

use crate::error::{QuarryError, QuarryResult};
use crate::search_types::{fields, SearchArgs, SimilarityConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name conventionally placed next to the index directory.
pub const CONFIG_FILE_NAME: &str = "quarry.toml";

/// RM3 pseudo-relevance feedback parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rm3Config {
    /// Number of top documents used as feedback (default: 10)
    #[serde(default = "default_fb_docs")]
    pub fb_docs: usize,
    /// Number of expansion terms kept (default: 10)
    #[serde(default = "default_fb_terms")]
    pub fb_terms: usize,
    /// Weight of the original query in the interpolation (default: 0.5)
    #[serde(default = "default_original_query_weight")]
    pub original_query_weight: f32,
}

fn default_fb_docs() -> usize {
    10
}

fn default_fb_terms() -> usize {
    10
}

fn default_original_query_weight() -> f32 {
    0.5
}

impl Default for Rm3Config {
    fn default() -> Self {
        Self {
            fb_docs: default_fb_docs(),
            fb_terms: default_fb_terms(),
            original_query_weight: default_original_query_weight(),
        }
    }
}

/// Reranking configuration, persisted under `[rerank]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Fetch `cutoff` candidates and run the cascade over them
    #[serde(default)]
    pub enabled: bool,
    /// Candidate pool size when reranking is enabled (default: 50)
    #[serde(default = "default_cutoff")]
    pub cutoff: usize,
    /// Optional feedback stage placed before the tie adjuster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rm3: Option<Rm3Config>,
}

fn default_cutoff() -> usize {
    SearchArgs::default().rerank_cutoff
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cutoff: default_cutoff(),
            rm3: None,
        }
    }
}

/// Searcher configuration loaded from `quarry.toml`.
///
/// # Example
///
/// ```toml
/// language = "en"
/// default_field = "contents"
/// hits = 10
///
/// [similarity]
/// kind = "bm25"
/// k1 = 1.2
/// b = 0.75
///
/// [rerank]
/// enabled = true
/// cutoff = 50
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearcherConfig {
    /// Analyzer language: `"zh"` selects the CJK analyzer, anything else the default.
    #[serde(default = "default_language")]
    pub language: String,
    /// Field searched by the plain `search(query, hits)` entry point.
    #[serde(default = "default_field")]
    pub default_field: String,
    /// Number of results returned by `Searcher::search_default`.
    #[serde(default = "default_hits")]
    pub hits: usize,
    /// Break score ties by internal id instead of external docid.
    #[serde(default)]
    pub arbitrary_score_tie_break: bool,
    /// Stored fields copied into every result.
    #[serde(default = "default_metadata_fields")]
    pub metadata_fields: Vec<String>,
    /// Scoring function.
    #[serde(default)]
    pub similarity: SimilarityConfig,
    /// Reranking.
    #[serde(default)]
    pub rerank: RerankConfig,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_field() -> String {
    fields::CONTENTS.to_string()
}

fn default_hits() -> usize {
    SearchArgs::default().hits
}

fn default_metadata_fields() -> Vec<String> {
    vec![
        fields::TITLE.to_string(),
        fields::PRIOR.to_string(),
        fields::ALIAS.to_string(),
    ]
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            default_field: default_field(),
            hits: default_hits(),
            arbitrary_score_tie_break: false,
            metadata_fields: default_metadata_fields(),
            similarity: SimilarityConfig::default(),
            rerank: RerankConfig::default(),
        }
    }
}

impl SearcherConfig {
    /// Search arguments implied by this config
    pub fn search_args(&self) -> SearchArgs {
        SearchArgs::new(self.hits)
            .with_rerank_cutoff(self.rerank.cutoff)
            .with_arbitrary_score_tie_break(self.arbitrary_score_tie_break)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the similarity parameters are out of range, the
    /// rerank cutoff is smaller than `hits` while reranking is enabled, or
    /// the RM3 parameters are degenerate.
    pub fn validate(&self) -> QuarryResult<()> {
        self.similarity
            .validate()
            .map_err(|e| QuarryError::config(e.to_string()))?;
        if self.default_field.is_empty() {
            return Err(QuarryError::config("default_field must not be empty"));
        }
        self.search_args()
            .candidate_pool_size(self.rerank.enabled)
            .map_err(|e| QuarryError::config(e.to_string()))?;
        if let Some(rm3) = &self.rerank.rm3 {
            if rm3.fb_docs == 0 || rm3.fb_terms == 0 {
                return Err(QuarryError::config(
                    "rm3 fb_docs and fb_terms must be greater than zero",
                ));
            }
            if !(0.0..=1.0).contains(&rm3.original_query_weight) {
                return Err(QuarryError::config(format!(
                    "rm3 original_query_weight must be in [0, 1], got {}",
                    rm3.original_query_weight
                )));
            }
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Quarry searcher configuration
#
# Analyzer language: "zh" selects CJK bigram analysis, anything else the
# default analyzer (lowercase + English stop-words).
language = "en"

# Field searched when no field is given.
default_field = "contents"

# Number of results returned when a search does not name its own count.
hits = 10

# Break score ties by internal id instead of external docid.
arbitrary_score_tie_break = false

# Stored fields copied into every result (absent fields come back empty).
metadata_fields = ["title", "prior", "alias"]

[similarity]
kind = "bm25"
k1 = 1.2
b = 0.75

[rerank]
enabled = false
cutoff = 50

# Pseudo-relevance feedback, runs before the tie adjuster when enabled.
# [rerank.rm3]
# fb_docs = 10
# fb_terms = 10
# original_query_weight = 0.5
"#
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> QuarryResult<Self> {
        let config: SearcherConfig = toml::from_str(content)
            .map_err(|e| QuarryError::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> QuarryResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuarryError::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            QuarryError::Config(msg) => {
                QuarryError::config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> QuarryResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> QuarryResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| QuarryError::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_toml_parses_to_default() {
        let parsed = SearcherConfig::from_toml_str(SearcherConfig::default_toml()).unwrap();
        assert_eq!(parsed, SearcherConfig::default());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let parsed = SearcherConfig::from_toml_str("").unwrap();
        assert_eq!(parsed.language, "en");
        assert_eq!(parsed.default_field, "contents");
        assert_eq!(parsed.hits, 10);
        assert_eq!(parsed.similarity, SimilarityConfig::bm25(1.2, 0.75));
        assert!(!parsed.rerank.enabled);
        assert_eq!(parsed.rerank.cutoff, 50);
    }

    #[test]
    fn test_parse_dirichlet_and_rm3() {
        let content = r#"
language = "zh"

[similarity]
kind = "dirichlet"
mu = 1000.0

[rerank]
enabled = true
cutoff = 20

[rerank.rm3]
fb_terms = 5
"#;
        let cfg = SearcherConfig::from_toml_str(content).unwrap();
        assert_eq!(cfg.language, "zh");
        assert_eq!(cfg.similarity, SimilarityConfig::dirichlet(1000.0));
        let rm3 = cfg.rerank.rm3.unwrap();
        assert_eq!(rm3.fb_docs, 10);
        assert_eq!(rm3.fb_terms, 5);
        assert!((rm3.original_query_weight - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_reject_cutoff_below_hits() {
        let content = r#"
hits = 100

[rerank]
enabled = true
cutoff = 20
"#;
        let err = SearcherConfig::from_toml_str(content).unwrap_err();
        assert!(matches!(err, QuarryError::Config(_)));
    }

    #[test]
    fn test_cutoff_below_hits_allowed_when_rerank_disabled() {
        let content = r#"
hits = 100

[rerank]
cutoff = 20
"#;
        assert!(SearcherConfig::from_toml_str(content).is_ok());
    }

    #[test]
    fn test_reject_bad_bm25_params() {
        let content = r#"
[similarity]
kind = "bm25"
k1 = 1.2
b = 3.0
"#;
        assert!(SearcherConfig::from_toml_str(content).is_err());
    }

    #[test]
    fn test_reject_unknown_similarity_kind() {
        let content = r#"
[similarity]
kind = "tfidf"
"#;
        assert!(SearcherConfig::from_toml_str(content).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut cfg = SearcherConfig::default();
        cfg.language = "zh".to_string();
        cfg.rerank.enabled = true;
        cfg.rerank.rm3 = Some(Rm3Config::default());
        cfg.write_to_file(&path).unwrap();

        let loaded = SearcherConfig::from_file(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_write_default_if_missing_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        SearcherConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        std::fs::write(&path, "hits = 3\n").unwrap();
        SearcherConfig::write_default_if_missing(&path).unwrap();
        assert_eq!(SearcherConfig::from_file(&path).unwrap().hits, 3);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = SearcherConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, QuarryError::Config(_)));
    }
}
