//! Query construction
//!
//! A query is built once per search call from the selected mode, the target
//! field, the raw query string and its analyzed tokens. It is immutable
//! afterwards.
//!
//! | Mode       | Built from      | Matches                                   |
//! |------------|-----------------|-------------------------------------------|
//! | BagOfWords | analyzed tokens | any token (disjunction)                   |
//! | Phrase     | analyzed tokens | all tokens, contiguous and in order       |
//! | Prefix     | raw string      | indexed terms starting with the raw term  |
//! | Fuzzy      | raw string      | indexed terms within the edit bound       |

use quarry_core::{QueryMode, QuarryError, QuarryResult};

/// Structured query over one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Disjunction over analyzed tokens
    BagOfWords {
        /// Target field
        field: String,
        /// Analyzed tokens (duplicates weigh the clause)
        tokens: Vec<String>,
    },
    /// Exact, contiguous, in-order token sequence
    Phrase {
        /// Target field
        field: String,
        /// Analyzed tokens, order significant
        tokens: Vec<String>,
    },
    /// Indexed terms beginning with `term`
    Prefix {
        /// Target field
        field: String,
        /// Raw (unanalyzed) prefix
        term: String,
    },
    /// Indexed terms within `max_edit_distance` of `term`
    Fuzzy {
        /// Target field
        field: String,
        /// Raw (unanalyzed) term
        term: String,
        /// Edit bound derived from the term length
        max_edit_distance: u32,
    },
}

/// Edit bound for a fuzzy term: 0 for length <= 1, 1 up to length 5, 2 beyond.
///
/// Length is counted in characters, not bytes.
pub fn fuzzy_edit_distance(term: &str) -> u32 {
    match term.chars().count() {
        0..=1 => 0,
        2..=5 => 1,
        _ => 2,
    }
}

impl Query {
    /// Build a query.
    ///
    /// `raw` feeds the prefix and fuzzy modes; `tokens` feed bag-of-words and
    /// phrase. An empty token sequence is not an error: the query simply
    /// matches nothing.
    ///
    /// # Errors
    ///
    /// `EmptyQueryTerm` if `raw` is empty for the prefix or fuzzy modes.
    pub fn build(
        mode: QueryMode,
        field: &str,
        raw: &str,
        tokens: Vec<String>,
    ) -> QuarryResult<Query> {
        let field = field.to_string();
        match mode {
            QueryMode::BagOfWords => Ok(Query::BagOfWords { field, tokens }),
            QueryMode::Phrase => Ok(Query::Phrase { field, tokens }),
            QueryMode::Prefix => {
                if raw.is_empty() {
                    return Err(QuarryError::EmptyQueryTerm);
                }
                Ok(Query::Prefix {
                    field,
                    term: raw.to_string(),
                })
            }
            QueryMode::Fuzzy => {
                if raw.is_empty() {
                    return Err(QuarryError::EmptyQueryTerm);
                }
                Ok(Query::Fuzzy {
                    field,
                    term: raw.to_string(),
                    max_edit_distance: fuzzy_edit_distance(raw),
                })
            }
        }
    }

    /// Build from an explicit mode string (`"match"`, `"prefix"`, `"fuzzy"`).
    ///
    /// # Errors
    ///
    /// `UnsupportedQueryMode` for any other string, `EmptyQueryTerm` as in
    /// [`Query::build`].
    pub fn build_with_mode_str(
        mode: &str,
        field: &str,
        raw: &str,
        tokens: Vec<String>,
    ) -> QuarryResult<Query> {
        Query::build(QueryMode::parse(mode)?, field, raw, tokens)
    }

    /// Mode this query was built with
    pub fn mode(&self) -> QueryMode {
        match self {
            Query::BagOfWords { .. } => QueryMode::BagOfWords,
            Query::Phrase { .. } => QueryMode::Phrase,
            Query::Prefix { .. } => QueryMode::Prefix,
            Query::Fuzzy { .. } => QueryMode::Fuzzy,
        }
    }

    /// Target field
    pub fn field(&self) -> &str {
        match self {
            Query::BagOfWords { field, .. }
            | Query::Phrase { field, .. }
            | Query::Prefix { field, .. }
            | Query::Fuzzy { field, .. } => field,
        }
    }

    /// Analyzed tokens, present for bag-of-words queries only
    pub fn bag_of_words_tokens(&self) -> Option<&[String]> {
        match self {
            Query::BagOfWords { tokens, .. } => Some(tokens),
            _ => None,
        }
    }

    /// True if the query cannot match any document
    pub fn matches_nothing(&self) -> bool {
        match self {
            Query::BagOfWords { tokens, .. } | Query::Phrase { tokens, .. } => tokens.is_empty(),
            Query::Prefix { .. } | Query::Fuzzy { .. } => false,
        }
    }
}
