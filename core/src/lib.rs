//! In-memory inverted index for web-archive full-text search.
//!
//! Documents are inserted concurrently through an [`IndexBuilder`], frozen
//! into an immutable [`InvertedIndex`] by [`IndexBuilder::commit`], and
//! queried with the `+must -exclude "phrase"` syntax parsed by [`query`]
//! and ranked by [`search`].

pub mod builder;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod search;
pub mod tokenizer;

pub use builder::{IndexBuilder, DEFAULT_SHARDS};
pub use error::{IndexError, QueryError};
pub use index::{
    CorpusStats, DocId, IndexableDocument, InvertedIndex, Posting, PostingsList, StoredFields,
    TermId,
};
pub use query::{parse, Clause, Occur, QueryExpr, QueryParser, TermQuery};
pub use search::{search, ScoredResult, TopDocs, DEFAULT_TOP_K};
pub use tokenizer::Analyzer;
