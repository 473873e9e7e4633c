//! WARC 1.0/1.1 container decoding.
//!
//! Records are read strictly in order: a `WARC/x.y` version line, a header
//! block terminated by an empty line, then exactly `Content-Length` payload
//! bytes. Blank lines between records are skipped.

use crate::record::{Record, RecordKind, RecordSource, SourceError};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub struct WarcReader<R> {
    reader: R,
    records_read: u64,
    line: Vec<u8>,
}

impl WarcReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Open { path: path.to_path_buf(), source })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, records_read: 0, line: Vec::new() }
    }

    pub fn records_read(&self) -> u64 { self.records_read }

    // One line without its trailing CRLF/LF; None at end of input.
    fn read_line(&mut self) -> Result<Option<String>, SourceError> {
        self.line.clear();
        if self.reader.read_until(b'\n', &mut self.line)? == 0 {
            return Ok(None);
        }
        while matches!(self.line.last(), Some(b'\n' | b'\r')) {
            self.line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.line).into_owned()))
    }

    fn read_headers(&mut self, record: u64) -> Result<Vec<(String, String)>, SourceError> {
        let mut headers: Vec<(String, String)> = Vec::new();
        loop {
            let line = self.read_line()?.ok_or(SourceError::Truncated { record })?;
            if line.is_empty() {
                return Ok(headers);
            }
            if line.starts_with([' ', '\t']) {
                // folded continuation of the previous header
                let (_, value) = headers
                    .last_mut()
                    .ok_or_else(|| SourceError::MalformedHeader { record, line: line.clone() })?;
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| SourceError::MalformedHeader { record, line: line.clone() })?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

impl<R: BufRead> RecordSource for WarcReader<R> {
    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        let record = self.records_read;
        if record == 0 && self.reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
            return Err(SourceError::Compressed);
        }

        let version = loop {
            match self.read_line()? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
            }
        };
        if !version.starts_with("WARC/") {
            return Err(SourceError::BadVersion { record, line: version });
        }

        let headers = self.read_headers(record)?;
        let kind = header(&headers, "WARC-Type")
            .map(RecordKind::from_warc_type)
            .ok_or(SourceError::MissingHeader { record, header: "WARC-Type" })?;
        let length = header(&headers, "Content-Length").ok_or(SourceError::MissingHeader { record, header: "Content-Length" })?;
        let length: u64 = length
            .parse()
            .map_err(|_| SourceError::InvalidContentLength { record, value: length.to_string() })?;

        let mut payload = Vec::new();
        let read = (&mut self.reader).take(length).read_to_end(&mut payload)?;
        if (read as u64) < length {
            return Err(SourceError::Truncated { record });
        }

        let owned = |name: &str| header(&headers, name).unwrap_or_default().to_string();
        let optional = |name: &str| header(&headers, name).map(str::to_string);
        self.records_read += 1;
        Ok(Some(Record {
            kind,
            id: owned("WARC-Record-ID"),
            target_uri: owned("WARC-Target-URI"),
            date: owned("WARC-Date"),
            warcinfo_id: optional("WARC-Warcinfo-ID"),
            trec_id: optional("WARC-TREC-ID"),
            payload,
        }))
    }
}

/// Every `.warc` file under a path, read one after another.
///
/// A file path yields just that archive; a directory is walked recursively
/// and its archives are read in path order.
pub struct ArchiveSource {
    pending: VecDeque<PathBuf>,
    current: Option<WarcReader<BufReader<File>>>,
}

impl ArchiveSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|source| SourceError::Open { path: path.to_path_buf(), source })?;
        let mut files = Vec::new();
        if meta.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("warc") {
                    files.push(p.to_path_buf());
                }
            }
            files.sort();
            if files.is_empty() {
                return Err(SourceError::NoArchives(path.to_path_buf()));
            }
        } else {
            files.push(path.to_path_buf());
        }
        info!(archives = files.len(), "opening archives");
        Ok(Self { pending: files.into(), current: None })
    }
}

impl RecordSource for ArchiveSource {
    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                if let Some(record) = reader.next_record()? {
                    return Ok(Some(record));
                }
                debug!(records = reader.records_read(), "archive exhausted");
                self.current = None;
            }
            match self.pending.pop_front() {
                Some(path) => {
                    debug!(path = %path.display(), "reading archive");
                    self.current = Some(WarcReader::open(&path)?);
                }
                None => return Ok(None),
            }
        }
    }
}
