use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};
use warcsearch::{build_index, worker_count, write_results, ArchiveSource, HtmlExtractor, OutputFormat, PipelineConfig, DEFAULT_QUEUE_CAPACITY};
use warcsearch_core::persist::{load_index, save_index, IndexPaths};
use warcsearch_core::{Analyzer, InvertedIndex, DEFAULT_SHARDS, DEFAULT_TOP_K};

#[derive(Parser)]
#[command(name = "warcsearch")]
#[command(about = "Index WARC archives and run ranked full-text queries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IndexArgs {
    /// WARC file, or a directory searched recursively for .warc files
    #[arg(long, short = 'a')]
    archive: PathBuf,
    /// Indexing threads (default: logical cores, at most 4x cores)
    #[arg(long, short = 't')]
    threads: Option<usize>,
    /// Documents buffered between the archive reader and the workers
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,
    /// Vocabulary shards (independent locks)
    #[arg(long, default_value_t = DEFAULT_SHARDS)]
    shards: usize,
    /// Text analyzer: simple or english
    #[arg(long, default_value = "simple")]
    analyzer: Analyzer,
}

#[derive(Args)]
struct OutputArgs {
    /// Number of ranked results to print
    #[arg(long, short = 'k', default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
    /// Output format: tsv or json
    #[arg(long, default_value = "tsv")]
    format: OutputFormat,
    /// Append record id and target URI to TSV lines
    #[arg(long)]
    long: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index an archive and run one query against it
    Search {
        #[command(flatten)]
        index: IndexArgs,
        #[arg(long, short = 'q')]
        query: String,
        #[command(flatten)]
        output: OutputArgs,
        /// Also save the index to this directory
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Index an archive and save the index
    Build {
        #[command(flatten)]
        index: IndexArgs,
        /// Output index directory
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
    /// Query a saved index
    Query {
        /// Index directory written by `build`
        #[arg(long)]
        index: PathBuf,
        #[arg(long, short = 'q')]
        query: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Prompt for the archive path and the query
    Interactive {
        #[arg(long, short = 't')]
        threads: Option<usize>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warcsearch=info,warcsearch_core=info"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { index, query, output, save } => {
            let built = index_archive(&index)?;
            if let Some(dir) = save {
                save_to(&built, &dir)?;
            }
            run_query(&built, &query, &output)
        }
        Commands::Build { index, output } => {
            let built = index_archive(&index)?;
            save_to(&built, &output)
        }
        Commands::Query { index, query, output } => {
            let paths = IndexPaths::new(&index);
            if !paths.exists() {
                bail!("no index found at {}", index.display());
            }
            let loaded = load_index(&paths)?;
            run_query(&loaded, &query, &output)
        }
        Commands::Interactive { threads, output } => {
            let archive = prompt("Please enter the path to WARC archive:")?;
            let query = prompt("Please enter the query:")?;
            let args = IndexArgs {
                archive: PathBuf::from(archive),
                threads,
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                shards: DEFAULT_SHARDS,
                analyzer: Analyzer::default(),
            };
            let built = index_archive(&args)?;
            run_query(&built, &query, &output)
        }
    }
}

fn prompt(message: &str) -> Result<String> {
    eprintln!("{message}");
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("no input given");
    }
    Ok(line.trim().to_string())
}

fn index_archive(args: &IndexArgs) -> Result<InvertedIndex> {
    let mut source = ArchiveSource::open(&args.archive).with_context(|| format!("opening archive {}", args.archive.display()))?;
    let config = PipelineConfig { workers: worker_count(args.threads), queue_capacity: args.queue_capacity };
    let (index, report) = build_index(&mut source, &HtmlExtractor::new(), args.analyzer, args.shards, &config)
        .with_context(|| format!("indexing {}", args.archive.display()))?;
    tracing::info!(records = report.records_read, elapsed_s = report.parsing_elapsed.as_secs_f64(), "parsing done");
    tracing::info!(
        documents = report.indexed,
        terms = index.num_terms(),
        elapsed_s = report.elapsed.as_secs_f64(),
        "indexing done"
    );
    Ok(index)
}

fn save_to(index: &InvertedIndex, dir: &Path) -> Result<()> {
    save_index(&IndexPaths::new(dir), index).with_context(|| format!("saving index to {}", dir.display()))
}

fn run_query(index: &InvertedIndex, query: &str, output: &OutputArgs) -> Result<()> {
    tracing::info!(query, "searching");
    let start = Instant::now();
    let top = index.search_str(query, output.top_k)?;
    tracing::info!(elapsed_s = start.elapsed().as_secs_f64(), "Found {} hits", top.total_hits);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_results(&mut out, index, &top, output.format, output.long)?;
    out.flush()?;
    Ok(())
}
