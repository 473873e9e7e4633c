use thiserror::Error;

/// Errors raised while building or validating an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A mutating call reached a builder that was already committed.
    #[error("index already committed, `{0}` is not allowed")]
    CommitMisuse(&'static str),

    /// The builder refused a single document; the pipeline skips it.
    #[error("document `{record_id}` rejected: {reason}")]
    Insertion { record_id: String, reason: String },

    /// A snapshot broke one of its structural invariants.
    #[error("index is inconsistent: {0}")]
    Corrupt(String),
}

/// Errors raised while parsing a query string. Neither touches the index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query syntax error near `{fragment}`: {reason}")]
    Syntax { fragment: String, reason: &'static str },

    #[error("query contains no searchable terms")]
    Empty,
}
