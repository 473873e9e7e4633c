//! TF-IDF ranked retrieval over a committed [`InvertedIndex`].
//!
//! Weight of a clause in a document is `tf * ln(1 + N / df)`; a document's
//! score is the sum over the positive clauses it matches. Scores are not
//! normalized by document length.

use crate::error::QueryError;
use crate::index::{DocId, InvertedIndex, PostingsList};
use crate::query::{Occur, QueryExpr, QueryParser, TermQuery};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredResult {
    pub doc_id: DocId,
    pub score: f64,
}

impl Eq for ScoredResult {}

// Greater means better: higher score, then lower doc id.
impl Ord for ScoredResult {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

impl PartialOrd for ScoredResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    /// Every document that matched, including those cut by `top_k`.
    pub total_hits: usize,
    /// Best hits, best first.
    pub hits: Vec<ScoredResult>,
}

impl InvertedIndex {
    /// Parse `query` with this index's analyzer and search it.
    pub fn search_str(&self, query: &str, top_k: usize) -> Result<TopDocs, QueryError> {
        let expr = QueryParser::new(self.analyzer).parse(query)?;
        Ok(search(self, &expr, top_k))
    }
}

/// Per-document term frequency for one clause.
fn clause_matches(index: &InvertedIndex, query: &TermQuery) -> HashMap<DocId, u32> {
    match query {
        TermQuery::Term(term) => index
            .postings(term)
            .map(|list| list.entries.iter().map(|p| (p.doc_id, p.tf)).collect())
            .unwrap_or_default(),
        TermQuery::Phrase(terms) => phrase_matches(index, terms),
    }
}

fn phrase_matches(index: &InvertedIndex, terms: &[(String, u32)]) -> HashMap<DocId, u32> {
    let mut lists: Vec<(&PostingsList, u32)> = Vec::with_capacity(terms.len());
    for (term, offset) in terms {
        match index.postings(term) {
            Some(list) => lists.push((list, *offset)),
            None => return HashMap::new(),
        }
    }
    let Some(((first, _), rest)) = lists.split_first() else {
        return HashMap::new();
    };

    let mut out = HashMap::new();
    'docs: for head in &first.entries {
        let mut others = Vec::with_capacity(rest.len());
        for (list, offset) in rest {
            match list.get(head.doc_id) {
                Some(p) => others.push((&p.positions, *offset)),
                None => continue 'docs,
            }
        }
        let count = head
            .positions
            .iter()
            .filter(|&&start| {
                others
                    .iter()
                    .all(|(positions, offset)| positions.binary_search(&(start + offset)).is_ok())
            })
            .count() as u32;
        if count > 0 {
            out.insert(head.doc_id, count);
        }
    }
    out
}

/// Evaluate `expr` against `index` and return the `top_k` best documents.
///
/// Ties in score are broken by ascending DocId.
pub fn search(index: &InvertedIndex, expr: &QueryExpr, top_k: usize) -> TopDocs {
    let excluded: HashSet<DocId> = expr
        .iter(Occur::MustNot)
        .flat_map(|q| clause_matches(index, q).into_keys())
        .collect();

    // (occur, per-doc tf, idf) for every positive clause
    let mut positive: Vec<(Occur, HashMap<DocId, u32>, f64)> = Vec::new();
    for clause in &expr.clauses {
        if clause.occur == Occur::MustNot {
            continue;
        }
        let matches = clause_matches(index, &clause.query);
        let idf = index.idf(matches.len() as u32);
        positive.push((clause.occur, matches, idf));
    }

    let has_must = expr.has(Occur::Must);
    let candidates: HashSet<DocId> = if has_must {
        let mut musts: Vec<&HashMap<DocId, u32>> = positive
            .iter()
            .filter(|(o, ..)| *o == Occur::Must)
            .map(|(_, m, _)| m)
            .collect();
        musts.sort_by_key(|m| m.len());
        let (smallest, others) = musts.split_first().map_or((None, &[][..]), |(s, o)| (Some(*s), o));
        smallest
            .into_iter()
            .flat_map(|m| m.keys().copied())
            .filter(|d| others.iter().all(|m| m.contains_key(d)))
            .collect()
    } else {
        positive.iter().flat_map(|(_, m, _)| m.keys().copied()).collect()
    };

    let mut heap: BinaryHeap<Reverse<ScoredResult>> = BinaryHeap::with_capacity(top_k.saturating_add(1).min(1024));
    let mut total_hits = 0;
    for doc_id in candidates {
        if excluded.contains(&doc_id) {
            continue;
        }
        total_hits += 1;
        if top_k == 0 {
            continue;
        }
        let score = positive
            .iter()
            .filter_map(|(_, m, idf)| m.get(&doc_id).map(|tf| *tf as f64 * idf))
            .sum();
        heap.push(Reverse(ScoredResult { doc_id, score }));
        if heap.len() > top_k {
            heap.pop();
        }
    }

    let mut hits: Vec<ScoredResult> = heap.into_iter().map(|Reverse(r)| r).collect();
    hits.sort_unstable_by(|a, b| b.cmp(a));
    TopDocs { total_hits, hits }
}
