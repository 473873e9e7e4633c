use std::collections::VecDeque;
use std::path::PathBuf;
use thiserror::Error;
use warcsearch_core::IndexableDocument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    /// Captured HTTP response; the only kind that gets indexed.
    Response,
    /// Archive bookkeeping (`warcinfo`, `metadata`), skipped silently.
    Metadata,
    /// Anything else, logged and skipped.
    Other(String),
}

impl RecordKind {
    pub fn from_warc_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "response" => RecordKind::Response,
            "warcinfo" | "metadata" => RecordKind::Metadata,
            _ => RecordKind::Other(value.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub id: String,
    pub target_uri: String,
    pub date: String,
    pub warcinfo_id: Option<String>,
    pub trec_id: Option<String>,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn response(id: impl Into<String>, target_uri: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: RecordKind::Response,
            id: id.into(),
            target_uri: target_uri.into(),
            date: String::new(),
            warcinfo_id: None,
            trec_id: None,
            payload: payload.into(),
        }
    }

    /// Pair the record's header fields with its extracted text.
    pub fn into_document(self, text: String) -> IndexableDocument {
        IndexableDocument {
            source_record_id: self.id,
            target_uri: self.target_uri,
            date: self.date,
            text,
            warcinfo_id: self.warcinfo_id,
            trec_id: self.trec_id,
        }
    }
}

/// Archive decoding failures. All of them end the ingestion run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: std::io::Error },

    #[error("no .warc files found under {0}")]
    NoArchives(PathBuf),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive is gzip-compressed; decompress it first")]
    Compressed,

    #[error("record {record}: expected a WARC version line, found `{line}`")]
    BadVersion { record: u64, line: String },

    #[error("record {record}: malformed header line `{line}`")]
    MalformedHeader { record: u64, line: String },

    #[error("record {record}: missing `{header}` header")]
    MissingHeader { record: u64, header: &'static str },

    #[error("record {record}: invalid Content-Length `{value}`")]
    InvalidContentLength { record: u64, value: String },

    #[error("record {record}: archive ends inside the record")]
    Truncated { record: u64 },
}

/// Sequential supplier of archive records. Called by a single producer only.
pub trait RecordSource {
    /// Next record, or `None` once the archive is exhausted.
    fn next_record(&mut self) -> Result<Option<Record>, SourceError>;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn next_record(&mut self) -> Result<Option<Record>, SourceError> { (**self).next_record() }
}

/// In-memory record source.
#[derive(Debug, Default)]
pub struct VecSource {
    records: VecDeque<Result<Record, SourceError>>,
}

impl VecSource {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        Self { records: records.into_iter().map(Ok).collect() }
    }

    /// Queue a decode failure after the records already added.
    pub fn then_fail(mut self, err: SourceError) -> Self {
        self.records.push_back(Err(err));
        self
    }
}

impl RecordSource for VecSource {
    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        self.records.pop_front().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warc_type_mapping() {
        assert_eq!(RecordKind::from_warc_type("response"), RecordKind::Response);
        assert_eq!(RecordKind::from_warc_type(" WARCINFO "), RecordKind::Metadata);
        assert_eq!(RecordKind::from_warc_type("metadata"), RecordKind::Metadata);
        assert_eq!(RecordKind::from_warc_type("request"), RecordKind::Other("request".into()));
    }

    #[test]
    fn vec_source_yields_then_fails() {
        let mut src = VecSource::new([Record::response("a", "u", "x")]).then_fail(SourceError::Truncated { record: 1 });
        assert!(src.next_record().unwrap().is_some());
        assert!(matches!(src.next_record(), Err(SourceError::Truncated { record: 1 })));
        assert!(src.next_record().unwrap().is_none());
    }

    #[test]
    fn into_document_keeps_headers() {
        let mut rec = Record::response("<urn:1>", "http://a/", "payload");
        rec.trec_id = Some("clueweb12-0000tw-00-00000".into());
        let doc = rec.into_document("text".into());
        assert_eq!(doc.source_record_id, "<urn:1>");
        assert_eq!(doc.trec_id.as_deref(), Some("clueweb12-0000tw-00-00000"));
        assert_eq!(doc.text, "text");
    }
}
