//! Producer/consumer ingestion.
//!
//! One producer (the calling thread) reads the archive sequentially, extracts
//! body text and puts documents on a [`BoundedQueue`]. `workers` scoped
//! threads take from the queue and insert into a shared [`IndexBuilder`].
//! When the producer is done it enqueues exactly one [`Message::Stop`] per
//! worker, so every worker exits after draining whatever was queued ahead of
//! its sentinel.

use crate::extract::TextExtractor;
use crate::queue::BoundedQueue;
use crate::record::{RecordKind, RecordSource, SourceError};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};
use warcsearch_core::{Analyzer, IndexBuilder, IndexableDocument, InvertedIndex};

pub const DEFAULT_QUEUE_CAPACITY: usize = 512;

/// Queue element: a document to index, or the per-worker end-of-work sentinel.
#[derive(Debug)]
pub enum Message {
    Data(IndexableDocument),
    Stop,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to spawn indexing worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("archive decoding failed: {0}")]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: worker_count(None), queue_capacity: DEFAULT_QUEUE_CAPACITY }
    }
}

impl PipelineConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self { workers, ..Self::default() }
    }
}

/// Number of indexing workers for a requested count.
///
/// Missing or zero means one per logical core; requests above four times the
/// core count are clamped to it.
pub fn worker_count(requested: Option<usize>) -> usize {
    let cores = thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1);
    worker_count_for(requested, cores)
}

fn worker_count_for(requested: Option<usize>, cores: usize) -> usize {
    let limit = cores * 4;
    match requested {
        None | Some(0) => cores,
        Some(n) if n > limit => {
            info!(requested = n, workers = limit, "adjusting number of threads");
            limit
        }
        Some(n) => n,
    }
}

/// Cooperative cancellation for a running pipeline.
///
/// Once set, the producer stops reading the archive and sends the sentinels;
/// documents already queued are still indexed.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self { Self::default() }

    pub fn stop(&self) { self.0.store(true, Ordering::Release); }

    pub fn is_stopped(&self) -> bool { self.0.load(Ordering::Acquire) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub records_read: u64,
    pub documents_queued: u64,
    /// Metadata and unrecognized records.
    pub skipped: u64,
    pub extraction_failures: u64,
    pub indexed: u64,
    pub rejected: u64,
    pub stopped_early: bool,
    pub queue_high_water: usize,
    /// From start until the producer finished reading the archive.
    pub parsing_elapsed: Duration,
    /// From start until every worker exited.
    pub elapsed: Duration,
}

#[derive(Default)]
struct ProducerOutcome {
    records_read: u64,
    documents_queued: u64,
    skipped: u64,
    extraction_failures: u64,
    stopped_early: bool,
    error: Option<SourceError>,
    finished: Duration,
}

#[derive(Default)]
struct WorkerStats {
    indexed: u64,
    rejected: u64,
}

fn produce<S, E>(
    source: &mut S,
    extractor: &E,
    queue: &BoundedQueue<Message>,
    workers: usize,
    stop: &StopSignal,
    started: Instant,
) -> ProducerOutcome
where
    S: RecordSource + ?Sized,
    E: TextExtractor + ?Sized,
{
    let mut out = ProducerOutcome::default();
    loop {
        if stop.is_stopped() {
            info!(records_read = out.records_read, "stop requested, ending ingestion early");
            out.stopped_early = true;
            break;
        }
        let record = match source.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, records_read = out.records_read, "archive decoding failed");
                out.error = Some(e);
                break;
            }
        };
        out.records_read += 1;
        match &record.kind {
            RecordKind::Response => {}
            RecordKind::Metadata => {
                out.skipped += 1;
                continue;
            }
            RecordKind::Other(kind) => {
                info!(kind = %kind, record_id = %record.id, "found record of unhandled type, skipping");
                out.skipped += 1;
                continue;
            }
        }
        match extractor.extract_body_text(&record.payload) {
            Ok(text) => {
                queue.put(Message::Data(record.into_document(text)));
                out.documents_queued += 1;
            }
            Err(e) => {
                info!(record_id = %record.id, error = %e, "text extraction failed, skipping");
                out.extraction_failures += 1;
            }
        }
    }
    out.finished = started.elapsed();
    debug!(records_read = out.records_read, parsing_s = out.finished.as_secs_f64(), "producer finished");
    for _ in 0..workers {
        queue.put(Message::Stop);
    }
    out
}

fn worker_loop(worker: usize, queue: &BoundedQueue<Message>, builder: &IndexBuilder) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        match queue.take() {
            Message::Stop => break,
            Message::Data(doc) => match builder.insert(doc) {
                Ok(_) => stats.indexed += 1,
                Err(e) => {
                    info!(worker, error = %e, "document skipped");
                    stats.rejected += 1;
                }
            },
        }
    }
    debug!(worker, indexed = stats.indexed, rejected = stats.rejected, "worker finished");
    stats
}

/// Drain `source` into `builder` using `config.workers` indexing threads.
///
/// Returns once every worker has exited. On a decode failure the documents
/// inserted so far stay in `builder` and [`PipelineError::Source`] is returned.
pub fn run<S, E>(
    source: &mut S,
    extractor: &E,
    builder: &IndexBuilder,
    config: &PipelineConfig,
    stop: &StopSignal,
) -> Result<PipelineReport, PipelineError>
where
    S: RecordSource + ?Sized,
    E: TextExtractor + ?Sized,
{
    if config.workers == 0 {
        return Err(PipelineError::InvalidConfig("at least one worker is required"));
    }
    if config.queue_capacity == 0 {
        return Err(PipelineError::InvalidConfig("queue capacity must be positive"));
    }

    let started = Instant::now();
    let queue = BoundedQueue::new(config.queue_capacity);
    info!(workers = config.workers, queue_capacity = config.queue_capacity, "starting ingestion");

    let (produced, workers) = thread::scope(|s| {
        let mut handles = Vec::with_capacity(config.workers);
        let mut spawn_error = None;
        for i in 0..config.workers {
            let queue = &queue;
            let spawned = thread::Builder::new()
                .name(format!("indexer-{i}"))
                .spawn_scoped(s, move || worker_loop(i, queue, builder));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            }
        }

        let produced = match spawn_error {
            None => Ok(produce(source, extractor, &queue, handles.len(), stop, started)),
            Some(e) => {
                error!(error = %e, "could not start indexing workers");
                for _ in 0..handles.len() {
                    queue.put(Message::Stop);
                }
                Err(PipelineError::Spawn(e))
            }
        };
        let stats: Vec<WorkerStats> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect();
        (produced, stats)
    });
    let produced = produced?;

    let report = PipelineReport {
        records_read: produced.records_read,
        documents_queued: produced.documents_queued,
        skipped: produced.skipped,
        extraction_failures: produced.extraction_failures,
        indexed: workers.iter().map(|w| w.indexed).sum(),
        rejected: workers.iter().map(|w| w.rejected).sum(),
        stopped_early: produced.stopped_early,
        queue_high_water: queue.high_water_mark(),
        parsing_elapsed: produced.finished,
        elapsed: started.elapsed(),
    };
    debug_assert!(queue.is_empty());

    if let Some(e) = produced.error {
        error!(indexed = report.indexed, "ingestion aborted by archive error");
        return Err(PipelineError::Source(e));
    }
    info!(
        records = report.records_read,
        indexed = report.indexed,
        rejected = report.rejected,
        skipped = report.skipped,
        extraction_failures = report.extraction_failures,
        elapsed_s = report.elapsed.as_secs_f64(),
        "ingestion finished"
    );
    Ok(report)
}

/// Run the pipeline into a fresh builder and commit it.
pub fn build_index<S, E>(
    source: &mut S,
    extractor: &E,
    analyzer: Analyzer,
    shards: usize,
    config: &PipelineConfig,
) -> Result<(InvertedIndex, PipelineReport), PipelineError>
where
    S: RecordSource + ?Sized,
    E: TextExtractor + ?Sized,
{
    let builder = IndexBuilder::new(analyzer, shards);
    let report = run(source, extractor, &builder, config, &StopSignal::new())?;
    Ok((builder.commit(), report))
}
