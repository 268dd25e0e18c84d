//! Criterion benchmarks for Quiver.
//!
//! A synthetic repository is written once to a temporary directory and
//! reused by every group:
//! - Term normalisation
//! - Ranked retrieval under each model
//! - Window expressions
//! - Vocabulary passes

use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use quiver::analysis::{StemmerKind, stem};
use quiver::engine::QueryEnvironment;
use quiver::query::QueryRequest;
use quiver::repository::Repository;
use quiver::testing::RepositoryBuilder;
use tempfile::TempDir;

const WORDS: [&str; 20] = [
    "search",
    "engine",
    "retrieval",
    "index",
    "query",
    "document",
    "ranking",
    "term",
    "window",
    "posting",
    "vocabulary",
    "relevance",
    "smoothing",
    "collection",
    "frequency",
    "language",
    "model",
    "stemming",
    "snippet",
    "corpus",
];

/// Deterministic pseudo-random documents.
fn generate_documents(count: usize, length: usize) -> Vec<String> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..count)
        .map(|_| {
            (0..length)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    WORDS[(state % WORDS.len() as u64) as usize]
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn build_repository(documents: usize) -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let mut builder = RepositoryBuilder::new().stemmer(Some(StemmerKind::Krovetz));
    for (i, text) in generate_documents(documents, 120).into_iter().enumerate() {
        builder = builder.document(format!("DOC-{i:06}"), text);
    }
    builder.build(dir.path()).unwrap();
    let repository = quiver::open(dir.path()).unwrap();
    (dir, repository)
}

/// Benchmark term normalisation.
fn bench_term_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("term_processing");

    group.throughput(Throughput::Elements(WORDS.len() as u64));
    group.bench_function("krovetz_stem_words", |b| {
        b.iter(|| {
            for word in WORDS {
                black_box(stem(black_box(word)));
            }
        })
    });

    group.finish();
}

/// Benchmark ranked retrieval.
fn bench_retrieval(c: &mut Criterion) {
    let mut group = c.benchmark_group("retrieval");
    group.sample_size(20);

    let (_dir, repository) = build_repository(2000);
    let tfidf = QueryEnvironment::tfidf(&repository, 1.2, 0.75).unwrap();
    let okapi = QueryEnvironment::okapi(&repository, 1.2, 0.75, 7.0).unwrap();
    let request = QueryRequest::new("ranking smoothing model").results_requested(100);

    group.bench_function("dirichlet_three_terms", |b| {
        b.iter(|| black_box(repository.query(black_box(&request)).unwrap()))
    });

    group.bench_function("tfidf_three_terms", |b| {
        b.iter(|| black_box(tfidf.query(black_box(&request)).unwrap()))
    });

    group.bench_function("okapi_three_terms", |b| {
        b.iter(|| black_box(okapi.query(black_box(&request)).unwrap()))
    });

    let candidates: Vec<u64> = (1..=200).collect();
    let restricted = QueryRequest::new("ranking smoothing model").document_set(candidates);
    group.bench_function("dirichlet_candidate_set", |b| {
        b.iter(|| black_box(repository.query(black_box(&restricted)).unwrap()))
    });

    let snippets = QueryRequest::new("posting window")
        .results_requested(10)
        .include_snippets(true);
    group.bench_function("dirichlet_with_snippets", |b| {
        b.iter(|| black_box(repository.query(black_box(&snippets)).unwrap()))
    });

    group.finish();
}

/// Benchmark window expressions.
fn bench_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("windows");
    group.sample_size(20);

    let (_dir, repository) = build_repository(2000);

    group.bench_function("ordered_window", |b| {
        b.iter(|| black_box(repository.expression_list(black_box("#od2(term posting)")).unwrap()))
    });

    group.bench_function("unordered_window", |b| {
        b.iter(|| black_box(repository.expression_list(black_box("#uw8(term posting)")).unwrap()))
    });

    group.finish();
}

/// Benchmark full vocabulary passes.
fn bench_vocabulary(c: &mut Criterion) {
    let mut group = c.benchmark_group("vocabulary");

    let (_dir, repository) = build_repository(500);

    group.bench_function("build_dictionary", |b| {
        b.iter(|| black_box(repository.build_dictionary().unwrap()))
    });

    group.bench_function("build_term_frequencies", |b| {
        b.iter(|| black_box(repository.build_term_frequencies().unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_term_processing,
    bench_retrieval,
    bench_windows,
    bench_vocabulary
);
criterion_main!(benches);
