use criterion::{Criterion, black_box, criterion_group, criterion_main};
use findex_core::{Document, InvertedIndex};
use rand::prelude::*;
use rand::rngs::SmallRng;
use std::path::PathBuf;

const VOCAB: &[&str] = &[
    "search", "index", "token", "query", "ranking", "posting", "document", "frequency", "engine",
    "worker", "thread", "buffer", "cursor", "parser", "scanner", "vector", "matrix", "kernel",
    "socket", "stream",
];

fn build_corpus(num_docs: usize, words_per_doc: usize) -> InvertedIndex {
    let mut rng = SmallRng::seed_from_u64(42);
    let index = InvertedIndex::default();
    for id in 1..=num_docs as u64 {
        let words: Vec<&str> = (0..words_per_doc)
            .map(|_| VOCAB[rng.gen_range(0..VOCAB.len())])
            .collect();
        let content = words.join(" ");
        if let Some(doc) = Document::build(
            id,
            PathBuf::from(format!("/corpus/doc{id}.txt")),
            content.as_bytes(),
        ) {
            index.add(doc);
        }
    }
    index
}

fn bench_ranked_search(c: &mut Criterion) {
    let index = build_corpus(10_000, 120);
    let query = vec!["ranking".to_string(), "posting".to_string()];

    c.bench_function("search/two_terms_10k_docs", |b| {
        b.iter(|| black_box(index.search(black_box(&query))))
    });
}

fn bench_substring_search(c: &mut Criterion) {
    let index = build_corpus(10_000, 120);

    c.bench_function("search_substring/8_bytes_10k_docs", |b| {
        b.iter(|| black_box(index.search_substring(black_box("frequenc"))))
    });
}

fn bench_ingestion(c: &mut Criterion) {
    c.bench_function("add/1k_docs_120_words", |b| {
        b.iter(|| black_box(build_corpus(1_000, 120)))
    });
}

criterion_group!(
    benches,
    bench_ranked_search,
    bench_substring_search,
    bench_ingestion
);
criterion_main!(benches);
