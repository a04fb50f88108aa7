use clap::Parser;
use findex::engine::{EngineOptions, SearchEngine};
use findex::log;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Multi-threaded full-text search engine. Reads commands from stdin, one
/// per line; see `find`, `find_substring`, `add_dir_recursive` and friends.
#[derive(Parser, Debug)]
#[command(name = "findex", version)]
struct Args {
    /// Worker threads for ingestion and batched queries
    /// (defaults to the hardware parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Width of the substring-search n-grams
    #[arg(long, default_value_t = findex_core::DEFAULT_NGRAM_SIZE)]
    ngram_size: usize,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match log::init(args.log_file.as_deref(), &args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            return ExitCode::FAILURE;
        }
    };

    if args.ngram_size == 0 {
        eprintln!("--ngram-size must be at least 1");
        return ExitCode::FAILURE;
    }

    let options = EngineOptions {
        threads: args
            .threads
            .unwrap_or_else(findex_pool::default_worker_count),
        ngram_size: args.ngram_size,
    };
    let engine = SearchEngine::new(io::stdout(), options);

    let stdin = io::stdin();
    match engine.run(stdin.lock()) {
        Ok(()) => {
            info!("input closed, shutting down");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "input loop failed");
            ExitCode::FAILURE
        }
    }
}
