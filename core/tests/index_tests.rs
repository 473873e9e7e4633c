use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread;
use warcsearch_core::persist::{load_index, save_index, IndexPaths};
use warcsearch_core::{Analyzer, IndexBuilder, IndexError, IndexableDocument, InvertedIndex};

fn corpus() -> Vec<IndexableDocument> {
    (0..200)
        .map(|i| {
            let text = format!("doc{i} shared {} {} tail", ["red", "green", "blue"][i % 3], if i % 7 == 0 { "seventh seventh" } else { "plain" });
            IndexableDocument::new(format!("<urn:uuid:{i}>"), format!("http://example.com/{i}"), "2014-03-28T10:00:00Z", text)
        })
        .collect()
}

fn build_concurrently(docs: Vec<IndexableDocument>, threads: usize) -> InvertedIndex {
    let builder = IndexBuilder::new(Analyzer::Simple, 8);
    let chunks: Vec<Vec<IndexableDocument>> = {
        let mut chunks = vec![Vec::new(); threads];
        for (i, d) in docs.into_iter().enumerate() {
            chunks[i % threads].push(d);
        }
        chunks
    };
    thread::scope(|s| {
        for chunk in chunks {
            let builder = &builder;
            s.spawn(move || {
                for d in chunk {
                    builder.insert(d).unwrap();
                }
            });
        }
    });
    builder.commit()
}

/// term -> multiset of (record id, tf), independent of DocId assignment.
fn postings_by_record(index: &InvertedIndex) -> BTreeMap<String, BTreeSet<(String, u32)>> {
    index
        .dictionary()
        .keys()
        .map(|term| {
            let set = index
                .postings(term)
                .unwrap()
                .entries
                .iter()
                .map(|p| (index.stored_fields(p.doc_id).unwrap().record_id.clone(), p.tf))
                .collect();
            (term.clone(), set)
        })
        .collect()
}

#[test]
fn total_documents_counts_successful_inserts() {
    let builder = IndexBuilder::default();
    let mut ok = 0;
    for (i, text) in ["alpha", "", "beta gamma", "!!!", "delta"].iter().enumerate() {
        match builder.insert(IndexableDocument::new(format!("r{i}"), "", "", *text)) {
            Ok(_) => ok += 1,
            Err(IndexError::Insertion { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    let index = builder.commit();
    assert_eq!(ok, 3);
    assert_eq!(index.total_documents(), 3);
    assert_eq!(index.docs().len(), 3);
}

#[test]
fn document_frequency_matches_postings() {
    let index = build_concurrently(corpus(), 4);
    index.validate().unwrap();
    for term in index.vocabulary() {
        let list = index.postings(term).unwrap();
        let distinct: BTreeSet<u32> = list.entries.iter().map(|p| p.doc_id).collect();
        assert_eq!(index.document_frequency(term) as usize, list.len());
        assert_eq!(distinct.len(), list.len());
    }
    assert_eq!(index.document_frequency("shared"), 200);
    assert_eq!(index.document_frequency("seventh"), 29);
}

#[test]
fn concurrent_builds_agree() {
    let one = build_concurrently(corpus(), 1);
    let two = build_concurrently(corpus(), 2);
    let eight = build_concurrently(corpus(), 8);

    for other in [&two, &eight] {
        assert_eq!(one.vocabulary(), other.vocabulary());
        for term in one.vocabulary() {
            assert_eq!(one.document_frequency(term), other.document_frequency(term));
        }
        let a: BTreeSet<_> = one.docs().values().map(|f| (f.record_id.clone(), f.target_uri.clone(), f.text.clone())).collect();
        let b: BTreeSet<_> = other.docs().values().map(|f| (f.record_id.clone(), f.target_uri.clone(), f.text.clone())).collect();
        assert_eq!(a, b);
        assert_eq!(postings_by_record(&one), postings_by_record(other));
    }
}

#[test]
fn doc_ids_are_dense_and_unique_under_contention() {
    let index = build_concurrently(corpus(), 8);
    let ids: BTreeSet<u32> = index.docs().keys().copied().collect();
    assert_eq!(ids, (0..200).collect());
}

#[test]
fn shared_handles_block_commit() {
    let builder = Arc::new(IndexBuilder::default());
    let worker = Arc::clone(&builder);
    let handle = thread::spawn(move || {
        worker.insert(IndexableDocument::new("r0", "", "", "text")).unwrap();
        worker
    });
    let worker = handle.join().unwrap();
    assert!(matches!(IndexBuilder::commit_shared(builder), Err(IndexError::CommitMisuse(_))));
    assert!(matches!(worker.insert(IndexableDocument::new("r1", "", "", "more")), Err(IndexError::CommitMisuse(_))));
}

#[test]
fn persisted_index_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("idx"));
    let index = build_concurrently(corpus(), 4);
    save_index(&paths, &index).unwrap();
    assert!(paths.exists());

    let loaded = load_index(&paths).unwrap();
    assert_eq!(loaded.total_documents(), index.total_documents());
    assert_eq!(loaded.vocabulary(), index.vocabulary());
    assert_eq!(loaded.docs(), index.docs());
    assert_eq!(loaded.postings_lists(), index.postings_lists());
    assert_eq!(loaded.analyzer(), index.analyzer());
    assert_eq!(loaded.search_str("seventh", 5).unwrap(), index.search_str("seventh", 5).unwrap());
}

#[test]
fn loading_a_missing_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_index(&IndexPaths::new(dir.path())).is_err());
}
