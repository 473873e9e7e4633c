//! Query parsing.
//!
//! A query is a whitespace-separated list of clauses. Each clause is a bare
//! word or a `"quoted phrase"`, optionally prefixed with `+` (must match) or
//! `-` (must not match). Unprefixed clauses are optional and only contribute
//! to ranking once a mandatory clause exists.

use crate::error::QueryError;
use crate::tokenizer::Analyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermQuery {
    Term(String),
    /// Analyzed terms with their offsets relative to the first term.
    Phrase(Vec<(String, u32)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub occur: Occur,
    pub query: TermQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExpr {
    pub clauses: Vec<Clause>,
}

impl QueryExpr {
    pub fn iter(&self, occur: Occur) -> impl Iterator<Item = &TermQuery> {
        self.clauses.iter().filter(move |c| c.occur == occur).map(|c| &c.query)
    }

    pub fn has(&self, occur: Occur) -> bool { self.iter(occur).next().is_some() }
}

/// Parse with the default analyzer.
pub fn parse(query: &str) -> Result<QueryExpr, QueryError> {
    QueryParser::default().parse(query)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParser {
    analyzer: Analyzer,
}

impl QueryParser {
    pub fn new(analyzer: Analyzer) -> Self { Self { analyzer } }

    pub fn parse(&self, query: &str) -> Result<QueryExpr, QueryError> {
        let mut clauses = Vec::new();
        for (occur, text) in split_clauses(query)? {
            if let Some(query) = self.analyze(text) {
                clauses.push(Clause { occur, query });
            }
        }
        if clauses.is_empty() {
            return Err(QueryError::Empty);
        }
        Ok(QueryExpr { clauses })
    }

    // None when the analyzer leaves nothing (punctuation, stopwords).
    fn analyze(&self, text: &str) -> Option<TermQuery> {
        let mut tokens = self.analyzer.tokenize(text);
        match tokens.len() {
            0 => None,
            1 => tokens.pop().map(|(t, _)| TermQuery::Term(t)),
            _ => {
                let base = tokens[0].1;
                Some(TermQuery::Phrase(
                    tokens.into_iter().map(|(t, p)| (t, (p - base) as u32)).collect(),
                ))
            }
        }
    }
}

fn syntax(fragment: &str, reason: &'static str) -> QueryError {
    QueryError::Syntax { fragment: fragment.to_string(), reason }
}

/// Split raw query text into (occur, clause body) pairs without analyzing.
fn split_clauses(query: &str) -> Result<Vec<(Occur, &str)>, QueryError> {
    let mut out = Vec::new();
    let mut rest = query.trim_start();
    while !rest.is_empty() {
        let clause_start = rest;
        let occur = match rest.as_bytes()[0] {
            b'+' => Occur::Must,
            b'-' => Occur::MustNot,
            _ => Occur::Should,
        };
        if occur != Occur::Should {
            rest = &rest[1..];
            match rest.chars().next() {
                None => return Err(syntax(clause_start, "operator without a term")),
                Some(c) if c.is_whitespace() => return Err(syntax(first_word(clause_start), "operator without a term")),
                Some('+') | Some('-') => return Err(syntax(first_word(clause_start), "repeated operator")),
                _ => {}
            }
        }

        if let Some(after_quote) = rest.strip_prefix('"') {
            let end = after_quote.find('"').ok_or_else(|| syntax(clause_start, "unterminated quote"))?;
            let body = &after_quote[..end];
            rest = &after_quote[end + 1..];
            if let Some(c) = rest.chars().next() {
                if !c.is_whitespace() {
                    return Err(syntax(first_word(clause_start), "phrase must be followed by whitespace"));
                }
            }
            out.push((occur, body));
        } else {
            let word = first_word(rest);
            if word.contains('"') {
                return Err(syntax(word, "quote inside a word"));
            }
            rest = &rest[word.len()..];
            out.push((occur, word));
        }
        rest = rest.trim_start();
    }
    Ok(out)
}

fn first_word(s: &str) -> &str {
    s.split(char::is_whitespace).next().unwrap_or(s)
}
