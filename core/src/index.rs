use crate::error::IndexError;
use crate::tokenizer::Analyzer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TermId = u32;
pub type DocId = u32;

/// One captured response, ready for insertion. Moved, never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexableDocument {
    pub source_record_id: String,
    pub target_uri: String,
    pub date: String,
    pub text: String,
    pub warcinfo_id: Option<String>,
    pub trec_id: Option<String>,
}

impl IndexableDocument {
    pub fn new(source_record_id: impl Into<String>, target_uri: impl Into<String>, date: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_record_id: source_record_id.into(),
            target_uri: target_uri.into(),
            date: date.into(),
            text: text.into(),
            warcinfo_id: None,
            trec_id: None,
        }
    }
}

/// Retained per-document fields, addressable by [`DocId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFields {
    pub record_id: String,
    pub target_uri: String,
    pub date: String,
    pub warcinfo_id: Option<String>,
    pub trec_id: Option<String>,
    /// Extracted body text, kept for display and snippets.
    pub text: String,
}

impl From<IndexableDocument> for StoredFields {
    fn from(doc: IndexableDocument) -> Self {
        Self {
            record_id: doc.source_record_id,
            target_uri: doc.target_uri,
            date: doc.date,
            warcinfo_id: doc.warcinfo_id,
            trec_id: doc.trec_id,
            text: doc.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
    /// Token positions of the term in the document, ascending. `tf == positions.len()`.
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingsList {
    pub entries: Vec<Posting>, // sorted by doc_id once committed
}

impl PostingsList {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, posting: Posting) { self.entries.push(posting); }

    /// Number of documents containing the term; always the list length.
    pub fn document_frequency(&self) -> u32 { self.entries.len() as u32 }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Posting for `doc_id`. Requires the committed (sorted) order.
    pub fn get(&self, doc_id: DocId) -> Option<&Posting> {
        self.entries
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| &self.entries[i])
    }

    pub(crate) fn sort(&mut self) { self.entries.sort_unstable_by_key(|p| p.doc_id); }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_documents: u64,
}

/// Committed, read-only index snapshot.
///
/// Produced once by [`IndexBuilder::commit`](crate::IndexBuilder::commit) and
/// safe to share across any number of query threads without locking.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub(crate) dictionary: HashMap<String, TermId>,
    pub(crate) postings: Vec<PostingsList>, // indexed by TermId
    pub(crate) docs: HashMap<DocId, StoredFields>,
    pub(crate) stats: CorpusStats,
    pub(crate) analyzer: Analyzer,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn total_documents(&self) -> u64 { self.stats.total_documents }

    pub fn stats(&self) -> &CorpusStats { &self.stats }

    /// The analyzer documents were indexed with; queries must use the same one.
    pub fn analyzer(&self) -> Analyzer { self.analyzer }

    pub fn dictionary(&self) -> &HashMap<String, TermId> { &self.dictionary }

    /// Every postings list, indexed by [`TermId`].
    pub fn postings_lists(&self) -> &[PostingsList] { &self.postings }

    pub fn docs(&self) -> &HashMap<DocId, StoredFields> { &self.docs }

    pub fn num_terms(&self) -> usize { self.dictionary.len() }

    pub fn term_id(&self, term: &str) -> Option<TermId> { self.dictionary.get(term).copied() }

    pub fn postings(&self, term: &str) -> Option<&PostingsList> {
        self.term_id(term).and_then(|tid| self.postings.get(tid as usize))
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.postings(term).map_or(0, PostingsList::document_frequency)
    }

    /// Smoothed inverse document frequency `ln(1 + N / df)`; zero for an absent term.
    pub fn idf(&self, df: u32) -> f64 {
        if df == 0 {
            return 0.0;
        }
        (1.0 + self.stats.total_documents as f64 / df as f64).ln()
    }

    pub fn stored_fields(&self, doc_id: DocId) -> Option<&StoredFields> { self.docs.get(&doc_id) }

    /// Vocabulary in term-id order (which is lexicographic order).
    pub fn vocabulary(&self) -> Vec<&str> {
        let mut terms: Vec<(&str, TermId)> = self.dictionary.iter().map(|(t, id)| (t.as_str(), *id)).collect();
        terms.sort_unstable_by_key(|(_, id)| *id);
        terms.into_iter().map(|(t, _)| t).collect()
    }

    /// Check the structural invariants every snapshot must hold.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.stats.total_documents != self.docs.len() as u64 {
            return Err(IndexError::Corrupt(format!(
                "total_documents is {} but {} documents are stored",
                self.stats.total_documents,
                self.docs.len()
            )));
        }
        if self.dictionary.len() != self.postings.len() {
            return Err(IndexError::Corrupt(format!(
                "{} terms but {} postings lists",
                self.dictionary.len(),
                self.postings.len()
            )));
        }
        let mut claimed = vec![false; self.postings.len()];
        for (term, &tid) in &self.dictionary {
            let list = self
                .postings
                .get(tid as usize)
                .ok_or_else(|| IndexError::Corrupt(format!("term `{term}` points at missing postings {tid}")))?;
            if std::mem::replace(&mut claimed[tid as usize], true) {
                return Err(IndexError::Corrupt(format!("term id {tid} is shared by more than one term")));
            }
            if list.is_empty() {
                return Err(IndexError::Corrupt(format!("term `{term}` has an empty postings list")));
            }
            let mut prev: Option<DocId> = None;
            for p in &list.entries {
                if prev.is_some_and(|d| d >= p.doc_id) {
                    return Err(IndexError::Corrupt(format!("postings for `{term}` are not strictly ascending")));
                }
                if !self.docs.contains_key(&p.doc_id) {
                    return Err(IndexError::Corrupt(format!("term `{term}` references unknown doc {}", p.doc_id)));
                }
                if p.tf as usize != p.positions.len() {
                    return Err(IndexError::Corrupt(format!("term `{term}` doc {} has tf {} but {} positions", p.doc_id, p.tf, p.positions.len())));
                }
                prev = Some(p.doc_id);
            }
        }
        Ok(())
    }
}
