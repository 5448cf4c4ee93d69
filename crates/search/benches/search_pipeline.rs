//! Search Pipeline Benchmarks
//!
//! Run with: cargo bench -p quarry-search --bench search_pipeline
//!
//! Labels:
//! - Layer (execute_*, searcher_*)
//! - Query mode (bag_of_words, phrase, prefix, fuzzy)
//! - Document count (small, medium)

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quarry_core::{fields, QueryMode, StoredDocument};
use quarry_index::{DefaultAnalyzer, InMemoryIndex, IndexBuilder};
use quarry_search::{
    execute, Bm25Similarity, Query, RerankerCascade, Rm3Reranker, Searcher, TieBreak,
};
use std::sync::Arc;

// ============================================================================
// Constants and Utilities
// ============================================================================

/// Fixed seed for reproducible corpora
const BENCH_SEED: u64 = 0xDEADBEEF_CAFEBABE;

const VOCABULARY: &[&str] = &[
    "quick", "brown", "fox", "lazy", "dog", "search", "index", "ranking", "query", "document",
    "retrieval", "score", "token", "phrase", "prefix", "fuzzy", "rust", "engine", "cascade",
    "feedback",
];

/// Simple LCG for deterministic pseudo-random text
fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn build_index(count: usize) -> InMemoryIndex {
    let builder = IndexBuilder::new(Arc::new(DefaultAnalyzer));
    let mut state = BENCH_SEED;
    for i in 0..count {
        let len = 8 + (lcg_next(&mut state) % 24) as usize;
        let text: Vec<&str> = (0..len)
            .map(|_| VOCABULARY[(lcg_next(&mut state) >> 33) as usize % VOCABULARY.len()])
            .collect();
        builder
            .add_document(
                StoredDocument::new(format!("doc{:06}", i))
                    .with_field(fields::CONTENTS, text.join(" ")),
            )
            .unwrap();
    }
    builder.finish()
}

fn tokens(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");
    let sim = Bm25Similarity::default();

    for (label, count) in [("small", 1_000usize), ("medium", 10_000)] {
        let index = build_index(count);
        group.throughput(Throughput::Elements(count as u64));

        let cases = [
            (
                "bag_of_words",
                Query::build(QueryMode::BagOfWords, fields::CONTENTS, "", tokens(&["quick", "fox", "ranking"])),
            ),
            (
                "phrase",
                Query::build(QueryMode::Phrase, fields::CONTENTS, "", tokens(&["quick", "brown"])),
            ),
            ("prefix", Query::build(QueryMode::Prefix, fields::CONTENTS, "re", vec![])),
            ("fuzzy", Query::build(QueryMode::Fuzzy, fields::CONTENTS, "rankign", vec![])),
        ];

        for (mode, query) in cases {
            let query = query.unwrap();
            group.bench_with_input(BenchmarkId::new(mode, label), &query, |b, query| {
                b.iter(|| execute(&index, query, &sim, 10, TieBreak::ExternalId).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_searcher(c: &mut Criterion) {
    let mut group = c.benchmark_group("searcher");
    let searcher = Searcher::new(Arc::new(build_index(10_000)));

    group.bench_function("default_cascade", |b| {
        b.iter(|| searcher.search("quick fox ranking", 10).unwrap())
    });

    searcher.set_reranker(RerankerCascade::with_feedback(Arc::new(Rm3Reranker::default())));
    searcher.set_rerank(true, 50);
    group.bench_function("rm3_cascade", |b| {
        b.iter(|| searcher.search("quick fox ranking", 10).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_execute, bench_searcher);
criterion_main!(benches);
