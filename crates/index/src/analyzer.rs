//! Text analyzers
//!
//! An analyzer turns text into an ordered sequence of normalized tokens.
//! Positions are kept so that removed stop-words leave a gap: a phrase
//! can never match across a word that was filtered out.
//!
//! Pipelines:
//! - `DefaultAnalyzer`: UAX#29 word boundaries → strip possessives → remove
//!   non-alphanumeric → lowercase → remove stopwords
//! - `CjkAnalyzer`: same as default for non-CJK words; runs of adjacent CJK
//!   characters become overlapping bigrams (a lone character stays a unigram)

use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// Standard English stopwords (Lucene's default set).
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Language code that selects the CJK analyzer.
pub const CJK_LANGUAGE: &str = "zh";

/// A token and its position in the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Normalized term text
    pub term: String,
    /// Position in the stream (gaps where stopwords were removed)
    pub position: u32,
}

/// Text → token sequence.
///
/// Analyzers are shared across concurrent searches and must be pure.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Analyze text into positioned tokens
    fn analyze(&self, text: &str) -> Vec<Token>;

    /// Name for debugging and logging
    fn name(&self) -> &str;

    /// Analyze text and keep only the terms, in order
    fn tokenize(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.term).collect()
    }
}

/// Pick the analyzer for a language code: `"zh"` → CJK, anything else → default.
pub fn analyzer_for_language(language: &str) -> Arc<dyn Analyzer> {
    if language == CJK_LANGUAGE {
        Arc::new(CjkAnalyzer)
    } else {
        Arc::new(DefaultAnalyzer)
    }
}

#[inline]
fn is_stopword(token: &str) -> bool {
    // Linear scan is fast for ~33 entries (all < cache line).
    STOPWORDS.contains(&token)
}

/// Strip English possessive suffix (`'s` / `\u{2019}s`).
#[inline]
fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s")
        .or_else(|| word.strip_suffix("\u{2019}s"))
        .unwrap_or(word)
}

/// Normalize a non-CJK word. `None` if nothing alphanumeric remains.
fn normalize_word(word: &str) -> Option<String> {
    let cleaned: String = strip_possessive(word)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_lowercase())
    }
}

/// Shared handling of a non-CJK word: emits it unless it is a stopword,
/// advancing the position either way.
fn push_word(word: &str, position: &mut u32, out: &mut Vec<Token>) {
    if let Some(term) = normalize_word(word) {
        if !is_stopword(&term) {
            out.push(Token {
                term,
                position: *position,
            });
        }
        *position += 1;
    }
}

// ============================================================================
// DefaultAnalyzer
// ============================================================================

/// Lowercasing, stop-word removing analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAnalyzer;

impl Analyzer for DefaultAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        let mut out = Vec::new();
        let mut position = 0u32;
        for word in text.unicode_words() {
            push_word(word, &mut position, &mut out);
        }
        out
    }

    fn name(&self) -> &str {
        "default"
    }
}

// ============================================================================
// CjkAnalyzer
// ============================================================================

/// Bigram analyzer for Chinese, Japanese and Korean text
#[derive(Debug, Clone, Copy, Default)]
pub struct CjkAnalyzer;

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x309F     // Hiragana
        | 0x30A0..=0x30FF   // Katakana
        | 0x3400..=0x4DBF   // CJK Extension A
        | 0x4E00..=0x9FFF   // CJK Unified Ideographs
        | 0xAC00..=0xD7AF   // Hangul syllables
        | 0xF900..=0xFAFF   // CJK Compatibility Ideographs
        | 0x20000..=0x2A6DF // CJK Extension B
    )
}

fn flush_cjk_run(run: &mut Vec<char>, position: &mut u32, out: &mut Vec<Token>) {
    match run.len() {
        0 => {}
        1 => {
            out.push(Token {
                term: run[0].to_string(),
                position: *position,
            });
            *position += 1;
        }
        _ => {
            for pair in run.windows(2) {
                out.push(Token {
                    term: pair.iter().collect(),
                    position: *position,
                });
                *position += 1;
            }
        }
    }
    run.clear();
}

impl Analyzer for CjkAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        let mut out = Vec::new();
        let mut position = 0u32;
        let mut run: Vec<char> = Vec::new();
        let mut run_end = 0usize;

        for (offset, word) in text.unicode_word_indices() {
            if word.chars().all(is_cjk) {
                // Adjacent CJK words (UAX#29 splits ideographs) join one run
                if !run.is_empty() && offset != run_end {
                    flush_cjk_run(&mut run, &mut position, &mut out);
                }
                run.extend(word.chars());
                run_end = offset + word.len();
            } else {
                flush_cjk_run(&mut run, &mut position, &mut out);
                push_word(word, &mut position, &mut out);
            }
        }
        flush_cjk_run(&mut run, &mut position, &mut out);
        out
    }

    fn name(&self) -> &str {
        "cjk"
    }
}
