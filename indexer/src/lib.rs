//! Ingestion side of warcsearch: decode WARC archives, extract body text
//! from captured HTML responses and feed a concurrent index build.

pub mod extract;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod report;
pub mod warc;

pub use extract::{ExtractionError, HtmlExtractor, PlainTextExtractor, TextExtractor};
pub use pipeline::{build_index, run, worker_count, Message, PipelineConfig, PipelineError, PipelineReport, StopSignal, DEFAULT_QUEUE_CAPACITY};
pub use queue::BoundedQueue;
pub use report::{write_results, OutputFormat};
pub use record::{Record, RecordKind, RecordSource, SourceError, VecSource};
pub use warc::{ArchiveSource, WarcReader};
