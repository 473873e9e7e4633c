use crate::index::{CorpusStats, DocId, InvertedIndex, PostingsList, StoredFields, TermId};
use crate::tokenizer::Analyzer;
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    pub num_terms: usize,
    pub analyzer: Analyzer,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    /// True when the directory holds a saved index.
    pub fn exists(&self) -> bool { self.meta().is_file() }
}

fn write_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, value).with_context(|| format!("encoding {}", path.display()))?;
    w.flush()?;
    Ok(())
}

fn read_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    bincode::deserialize_from(BufReader::new(f)).with_context(|| format!("decoding {}", path.display()))
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Write a committed index to `paths.root`, creating the directory.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root).with_context(|| format!("creating index dir {}", paths.root.display()))?;
    write_bin(&paths.dictionary(), &index.dictionary)?;
    write_bin(&paths.postings(), &index.postings)?;
    write_bin(&paths.docs(), &index.docs)?;
    let meta = MetaFile {
        num_docs: index.total_documents(),
        num_terms: index.num_terms(),
        analyzer: index.analyzer,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: FORMAT_VERSION,
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "index saved");
    Ok(())
}

/// Load an index saved by [`save_index`] and check its invariants.
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        bail!("unsupported index version {} (expected {FORMAT_VERSION})", meta.version);
    }
    let dictionary: HashMap<String, TermId> = read_bin(&paths.dictionary())?;
    let postings: Vec<PostingsList> = read_bin(&paths.postings())?;
    let docs: HashMap<DocId, StoredFields> = read_bin(&paths.docs())?;
    let index = InvertedIndex {
        dictionary,
        postings,
        docs,
        stats: CorpusStats { total_documents: meta.num_docs },
        analyzer: meta.analyzer,
    };
    index.validate().with_context(|| format!("validating index at {}", paths.root.display()))?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, created_at = %meta.created_at, "index loaded");
    Ok(index)
}
