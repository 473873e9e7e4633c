use serde::Serialize;
use std::io::{self, Write};
use std::str::FromStr;
use warcsearch_core::{DocId, InvertedIndex, TopDocs};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `rank<TAB>docId<TAB>score` lines.
    #[default]
    Tsv,
    /// One JSON object per hit.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tsv" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format `{other}` (expected `tsv` or `json`)")),
        }
    }
}

#[derive(Serialize)]
struct JsonHit<'a> {
    rank: usize,
    doc_id: DocId,
    score: f64,
    record_id: Option<&'a str>,
    target_uri: Option<&'a str>,
    date: Option<&'a str>,
}

/// Print ranked hits, best first, ranks starting at 1.
///
/// `long` appends the WARC record id and target URI to each TSV line.
pub fn write_results<W: Write>(out: &mut W, index: &InvertedIndex, top: &TopDocs, format: OutputFormat, long: bool) -> io::Result<()> {
    for (i, hit) in top.hits.iter().enumerate() {
        let fields = index.stored_fields(hit.doc_id);
        match format {
            OutputFormat::Tsv => {
                write!(out, "{}\t{}\t{}", i + 1, hit.doc_id, hit.score)?;
                if long {
                    let (record_id, uri) = fields.map_or(("", ""), |f| (f.record_id.as_str(), f.target_uri.as_str()));
                    write!(out, "\t{record_id}\t{uri}")?;
                }
                writeln!(out)?;
            }
            OutputFormat::Json => {
                let line = JsonHit {
                    rank: i + 1,
                    doc_id: hit.doc_id,
                    score: hit.score,
                    record_id: fields.map(|f| f.record_id.as_str()),
                    target_uri: fields.map(|f| f.target_uri.as_str()),
                    date: fields.map(|f| f.date.as_str()),
                };
                serde_json::to_writer(&mut *out, &line)?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warcsearch_core::{IndexBuilder, IndexableDocument};

    fn index() -> InvertedIndex {
        let b = IndexBuilder::default();
        b.insert(IndexableDocument::new("<urn:a>", "http://a/", "2014", "cat dog")).unwrap();
        b.insert(IndexableDocument::new("<urn:b>", "http://b/", "2014", "dog")).unwrap();
        b.commit()
    }

    #[test]
    fn tsv_lines() {
        let index = index();
        let top = index.search_str("cat", 10).unwrap();
        let mut out = Vec::new();
        write_results(&mut out, &index, &top, OutputFormat::Tsv, false).unwrap();
        let score = (1.0f64 + 2.0).ln();
        assert_eq!(String::from_utf8(out).unwrap(), format!("1\t0\t{score}\n"));
    }

    #[test]
    fn long_tsv_adds_record_fields() {
        let index = index();
        let top = index.search_str("dog", 10).unwrap();
        let mut out = Vec::new();
        write_results(&mut out, &index, &top, OutputFormat::Tsv, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1\t0\t"));
        assert!(lines[0].ends_with("\t<urn:a>\thttp://a/"));
        assert!(lines[1].ends_with("\t<urn:b>\thttp://b/"));
    }

    #[test]
    fn json_lines() {
        let index = index();
        let top = index.search_str("dog", 1).unwrap();
        let mut out = Vec::new();
        write_results(&mut out, &index, &top, OutputFormat::Json, false).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v["rank"], 1);
        assert_eq!(v["record_id"], "<urn:a>");
    }

    #[test]
    fn format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
