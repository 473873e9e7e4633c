//! Concurrent index construction.
//!
//! The vocabulary is split into `K` shards by a hash of the term, each behind
//! its own mutex, so workers inserting different documents only contend when
//! they touch the same shard. Stored fields and corpus counters use their own
//! synchronization and never share a shard lock.

use crate::error::IndexError;
use crate::index::{CorpusStats, DocId, IndexableDocument, InvertedIndex, Posting, PostingsList, StoredFields, TermId};
use crate::tokenizer::Analyzer;
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const DEFAULT_SHARDS: usize = 16;

type Shard = HashMap<String, PostingsList>;

pub struct IndexBuilder {
    analyzer: Analyzer,
    shards: Vec<Mutex<Shard>>,
    docs: Mutex<HashMap<DocId, StoredFields>>,
    next_doc_id: AtomicU32,
    total_documents: AtomicU64,
    frozen: AtomicBool,
}

impl Default for IndexBuilder {
    fn default() -> Self { Self::new(Analyzer::default(), DEFAULT_SHARDS) }
}

impl IndexBuilder {
    /// Create an empty builder. A `shard_count` of zero is treated as one.
    pub fn new(analyzer: Analyzer, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            analyzer,
            shards: (0..shard_count).map(|_| Mutex::new(Shard::new())).collect(),
            docs: Mutex::new(HashMap::new()),
            next_doc_id: AtomicU32::new(0),
            total_documents: AtomicU64::new(0),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn analyzer(&self) -> Analyzer { self.analyzer }

    pub fn shard_count(&self) -> usize { self.shards.len() }

    /// Documents successfully inserted so far.
    pub fn total_documents(&self) -> u64 { self.total_documents.load(Ordering::Acquire) }

    fn shard_of(&self, term: &str) -> usize {
        let mut hasher = FxHasher::default();
        term.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Insert one document and return the DocId it was assigned.
    ///
    /// Safe to call from any number of threads. A document whose text yields
    /// no tokens is rejected without consuming a DocId.
    pub fn insert(&self, doc: IndexableDocument) -> Result<DocId, IndexError> {
        if self.frozen.load(Ordering::Acquire) {
            error!(record_id = %doc.source_record_id, "insert after commit");
            return Err(IndexError::CommitMisuse("insert"));
        }

        // term -> positions, computed from a single tokenization pass
        let mut terms: HashMap<String, Vec<u32>> = HashMap::new();
        for (term, pos) in self.analyzer.tokenize(&doc.text) {
            terms.entry(term).or_default().push(pos as u32);
        }
        if terms.is_empty() {
            return Err(IndexError::Insertion {
                record_id: doc.source_record_id,
                reason: "extracted text contains no indexable tokens".into(),
            });
        }

        let doc_id = self
            .next_doc_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |id| id.checked_add(1))
            .map_err(|_| IndexError::Insertion {
                record_id: doc.source_record_id.clone(),
                reason: "document id space exhausted".into(),
            })?;

        // Fields land before any posting can reference the id.
        self.docs.lock().insert(doc_id, StoredFields::from(doc));

        let mut by_shard: Vec<Vec<(String, Vec<u32>)>> = vec![Vec::new(); self.shards.len()];
        for (term, positions) in terms {
            by_shard[self.shard_of(&term)].push((term, positions));
        }
        for (shard, entries) in self.shards.iter().zip(by_shard) {
            if entries.is_empty() {
                continue;
            }
            let mut shard = shard.lock();
            for (term, positions) in entries {
                let tf = positions.len() as u32;
                shard.entry(term).or_default().push(Posting { doc_id, tf, positions });
            }
        }

        self.total_documents.fetch_add(1, Ordering::AcqRel);
        debug!(doc_id, "document indexed");
        Ok(doc_id)
    }

    /// Freeze the builder into a queryable snapshot.
    ///
    /// Consumes the builder, so every worker must have released it first.
    pub fn commit(self) -> InvertedIndex {
        self.frozen.store(true, Ordering::Release);
        let IndexBuilder { analyzer, shards, docs, total_documents, .. } = self;

        let mut lists: Vec<(String, PostingsList)> = shards
            .into_iter()
            .flat_map(|shard| shard.into_inner().into_iter())
            .collect();
        lists.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut dictionary = HashMap::with_capacity(lists.len());
        let mut postings = Vec::with_capacity(lists.len());
        for (tid, (term, mut list)) in lists.into_iter().enumerate() {
            list.sort();
            dictionary.insert(term, tid as TermId);
            postings.push(list);
        }

        let index = InvertedIndex {
            dictionary,
            postings,
            docs: docs.into_inner(),
            stats: CorpusStats { total_documents: total_documents.into_inner() },
            analyzer,
        };
        info!(num_docs = index.total_documents(), num_terms = index.num_terms(), "index committed");
        index
    }

    /// Commit through a shared handle.
    ///
    /// The builder is frozen first, so even when other handles are still alive
    /// (and the commit fails) their later inserts are rejected.
    pub fn commit_shared(this: Arc<Self>) -> Result<InvertedIndex, IndexError> {
        this.frozen.store(true, Ordering::Release);
        match Arc::try_unwrap(this) {
            Ok(builder) => Ok(builder.commit()),
            Err(shared) => {
                error!(handles = Arc::strong_count(&shared), "commit while builder is still shared");
                Err(IndexError::CommitMisuse("commit while other handles are alive"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str) -> IndexableDocument {
        IndexableDocument::new(id, format!("http://example.com/{id}"), "2014-03-28T10:00:00Z", text)
    }

    #[test]
    fn assigns_dense_ids() {
        let b = IndexBuilder::default();
        assert_eq!(b.insert(doc("a", "one")).unwrap(), 0);
        assert_eq!(b.insert(doc("b", "two")).unwrap(), 1);
        assert_eq!(b.total_documents(), 2);
    }

    #[test]
    fn empty_text_is_rejected_without_burning_an_id() {
        let b = IndexBuilder::default();
        let err = b.insert(doc("blank", "  ... ")).unwrap_err();
        assert!(matches!(err, IndexError::Insertion { ref record_id, .. } if record_id == "blank"));
        assert_eq!(b.insert(doc("a", "text")).unwrap(), 0);
        assert_eq!(b.total_documents(), 1);
    }

    #[test]
    fn term_frequency_and_positions() {
        let b = IndexBuilder::new(Analyzer::Simple, 4);
        b.insert(doc("a", "dog cat dog")).unwrap();
        let index = b.commit();
        let p = &index.postings("dog").unwrap().entries[0];
        assert_eq!(p.tf, 2);
        assert_eq!(p.positions, vec![0, 2]);
    }

    #[test]
    fn zero_shards_means_one() {
        assert_eq!(IndexBuilder::new(Analyzer::Simple, 0).shard_count(), 1);
    }

    #[test]
    fn commit_assigns_term_ids_in_order() {
        let b = IndexBuilder::default();
        b.insert(doc("a", "zebra apple mango")).unwrap();
        let index = b.commit();
        assert_eq!(index.vocabulary(), vec!["apple", "mango", "zebra"]);
        assert_eq!(index.term_id("apple"), Some(0));
        assert!(index.validate().is_ok());
    }

    #[test]
    fn shared_commit_with_live_handle_fails_and_freezes() {
        let b = Arc::new(IndexBuilder::default());
        let other = Arc::clone(&b);
        other.insert(doc("a", "alpha")).unwrap();
        let err = IndexBuilder::commit_shared(b).unwrap_err();
        assert!(matches!(err, IndexError::CommitMisuse(_)));
        assert!(matches!(other.insert(doc("b", "beta")), Err(IndexError::CommitMisuse("insert"))));
    }

    #[test]
    fn shared_commit_with_single_handle_succeeds() {
        let b = Arc::new(IndexBuilder::default());
        b.insert(doc("a", "alpha")).unwrap();
        let index = IndexBuilder::commit_shared(b).unwrap();
        assert_eq!(index.total_documents(), 1);
    }
}
