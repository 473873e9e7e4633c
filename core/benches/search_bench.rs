use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::thread;
use warcsearch_core::{parse, search, IndexBuilder, IndexableDocument, InvertedIndex};

const WORDS: &[&str] = &["archive", "crawl", "record", "payload", "header", "index", "query", "score", "shard", "term"];

fn doc(i: usize) -> IndexableDocument {
    let text: Vec<&str> = (0..50).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect();
    IndexableDocument::new(format!("r{i}"), format!("http://example.com/{i}"), "", text.join(" "))
}

fn build(threads: usize, docs: usize) -> InvertedIndex {
    let builder = IndexBuilder::default();
    thread::scope(|s| {
        for t in 0..threads {
            let builder = &builder;
            s.spawn(move || {
                for i in (t..docs).step_by(threads) {
                    let _ = builder.insert(doc(i));
                }
            });
        }
    });
    builder.commit()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_2000_docs");
    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &t| b.iter(|| build(t, 2000)));
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let index = build(4, 5000);
    let expr = parse("+archive record -shard \"payload header\"").unwrap();
    c.bench_function("search_top10", |b| b.iter(|| search(&index, &expr, 10)));
}

criterion_group!(benches, bench_insert, bench_search);
criterion_main!(benches);
