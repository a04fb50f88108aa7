//! The command dispatcher.
//!
//! Reads line commands, resolves filesystem inputs, and drives the index.
//! Directory ingestion and batched queries fan out across the worker pool;
//! everything else runs on the calling thread. Console output is serialized
//! on one mutex, one coherent block per acquisition, and result blocks are
//! formatted before the lock is taken so the output mutex is never held
//! while calling into the index.

use findex_core::{Document, DocumentStore, InvertedIndex, StoredDoc, persist, snippet, tokenizer};
use findex_pool::ThreadPool;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("empty query")]
    EmptyQuery,
    #[error("empty path")]
    EmptyPath,
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("file not in index: {0}")]
    NotIndexed(String),
    #[error("cannot read file: {0}")]
    CannotRead(String),
    #[error("cannot open file: {0}")]
    CannotOpen(String),
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),
    #[error("document not found: {0}")]
    DocumentNotFound(u64),
    #[error(transparent)]
    Pool(#[from] findex_pool::PoolError),
    #[error(transparent)]
    Snapshot(#[from] findex_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Worker threads for ingestion and batch-query fan-out.
    pub threads: usize,
    /// Width of the substring-search n-grams.
    pub ngram_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: findex_pool::default_worker_count(),
            ngram_size: findex_core::DEFAULT_NGRAM_SIZE,
        }
    }
}

pub struct SearchEngine<W: Write + Send + 'static> {
    index: Arc<InvertedIndex>,
    store: Arc<DocumentStore>,
    pool: ThreadPool,
    /// Ids are allocated here and never reused; files that fail to read after
    /// allocation simply leave a gap.
    next_doc_id: Arc<AtomicU64>,
    output: Arc<Mutex<W>>,
}

impl<W: Write + Send + 'static> SearchEngine<W> {
    pub fn new(output: W, options: EngineOptions) -> Self {
        Self::with_shared_output(Arc::new(Mutex::new(output)), options)
    }

    /// Construct around an output sink the caller keeps a handle to. Tests
    /// inject a byte buffer here and read it back after [`run`](Self::run).
    pub fn with_shared_output(output: Arc<Mutex<W>>, options: EngineOptions) -> Self {
        info!(
            threads = options.threads,
            ngram_size = options.ngram_size,
            "starting search engine"
        );
        Self {
            index: Arc::new(InvertedIndex::new(options.ngram_size)),
            store: Arc::new(DocumentStore::new()),
            pool: ThreadPool::new(options.threads),
            next_doc_id: Arc::new(AtomicU64::new(1)),
            output,
        }
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// The command loop: prompt, read a line, dispatch, repeat until EOF.
    /// Handler errors are printed and never terminate the loop.
    pub fn run<R: BufRead>(&self, input: R) -> io::Result<()> {
        self.prompt()?;
        for line in input.lines() {
            let line = line?;
            if !line.is_empty() {
                self.handle_command(&line);
            }
            self.prompt()?;
        }
        Ok(())
    }

    fn prompt(&self) -> io::Result<()> {
        let mut out = self.output.lock();
        write!(out, ">")?;
        out.flush()
    }

    fn handle_command(&self, line: &str) {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        let result = match command {
            "add_file" => self.add_file(rest),
            "add_dir" => self.add_directory(rest, false),
            "add_dir_recursive" => self.add_directory(rest, true),
            "find" => self.find(rest),
            "find_substring" => self.find_substring(rest),
            "find_batch" => self.find_batch(rest),
            "remove_file" => self.remove_file(rest),
            "remove_dir" => self.remove_directory(rest, false),
            "remove_dir_recursive" => self.remove_directory(rest, true),
            "print_indexed_documents" => self.print_indexed_documents(),
            "save_snapshot" => self.save_snapshot(rest),
            "load_snapshot" => self.load_snapshot(rest),
            "preview" => self.preview(rest),
            _ => {
                self.print_block("error: unknown command\n");
                return;
            }
        };

        if let Err(err) = result {
            warn!(command, %err, "command failed");
            self.print_block(&format!("error: {err}\n"));
        }
    }

    fn print_block(&self, block: &str) {
        let mut out = self.output.lock();
        let _ = out.write_all(block.as_bytes());
    }

    fn add_file(&self, args: &str) -> Result<()> {
        let raw = first_token(args).ok_or(EngineError::EmptyQuery)?;
        let path = absolute(raw)?;
        if !path.is_file() {
            return Err(EngineError::PathNotFound(raw.to_string()));
        }
        let content = fs::read(&path).map_err(|_| EngineError::CannotRead(raw.to_string()))?;

        let id = self.next_doc_id.fetch_add(1, Ordering::Relaxed);
        ingest(&self.index, &self.store, id, path, &content);
        Ok(())
    }

    fn add_directory(&self, args: &str, recursive: bool) -> Result<()> {
        let raw = first_token(args).ok_or(EngineError::EmptyPath)?;
        let dir = absolute(raw)?;
        if !dir.is_dir() {
            return Err(EngineError::PathNotFound(raw.to_string()));
        }

        let started = Instant::now();
        let files = collect_files(&dir, recursive)
            .map_err(|err| EngineError::PathNotFound(format!("{} ({err})", dir.display())))?;
        if files.is_empty() {
            self.print_block("No files to add.\n");
            return Ok(());
        }

        let added = Arc::new(AtomicUsize::new(0));
        for file in files {
            let index = Arc::clone(&self.index);
            let store = Arc::clone(&self.store);
            let next_doc_id = Arc::clone(&self.next_doc_id);
            let added = Arc::clone(&added);
            self.pool.execute(move || {
                // Unreadable files are skipped without consuming an id.
                let Ok(content) = fs::read(&file) else {
                    debug!(path = %file.display(), "skipping unreadable file");
                    return;
                };
                let id = next_doc_id.fetch_add(1, Ordering::Relaxed);
                ingest(&index, &store, id, file, &content);
                added.fetch_add(1, Ordering::Relaxed);
            })?;
        }
        self.pool.wait();

        let elapsed = started.elapsed().as_secs_f64();
        let mut block = String::new();
        let _ = writeln!(block, "Adding took {elapsed:.4}s:");
        let _ = writeln!(
            block,
            "Added {} file(s) from directory: {}",
            added.load(Ordering::Relaxed),
            dir.display()
        );
        self.print_block(&block);
        Ok(())
    }

    fn find(&self, query: &str) -> Result<()> {
        let terms = query_terms(query)?;

        let started = Instant::now();
        let results = self.index.search(&terms);
        let elapsed = started.elapsed().as_secs_f64();

        let mut block = String::new();
        let _ = writeln!(block, "Search took {elapsed:.4}s:");
        for (i, (id, relevance)) in results.iter().enumerate() {
            let path = self.index.path_by_id(*id).unwrap_or_default();
            let _ = writeln!(
                block,
                "{}. id:{id}, relevance:{relevance:.5}, path:{}",
                i + 1,
                path.display()
            );
        }
        if !results.is_empty() {
            let _ = writeln!(block, "---");
        }
        self.print_block(&block);
        Ok(())
    }

    fn find_substring(&self, substring: &str) -> Result<()> {
        if substring.is_empty() {
            return Err(EngineError::EmptyQuery);
        }

        let started = Instant::now();
        let doc_ids = self.index.search_substring(substring);
        let elapsed = started.elapsed().as_secs_f64();

        let mut block = String::new();
        let _ = writeln!(block, "Substring search took {elapsed:.4}s:");
        for (i, id) in doc_ids.iter().enumerate() {
            let path = self.index.path_by_id(*id).unwrap_or_default();
            let _ = writeln!(block, "{}. id:{id}, path:{}", i + 1, path.display());
        }
        if !doc_ids.is_empty() {
            let _ = writeln!(block, "---");
        }
        self.print_block(&block);
        Ok(())
    }

    fn find_batch(&self, args: &str) -> Result<()> {
        let raw = first_token(args).ok_or(EngineError::EmptyPath)?;
        let path = absolute(raw)?;
        if !path.is_file() {
            return Err(EngineError::PathNotFound(raw.to_string()));
        }
        let file = fs::File::open(&path).map_err(|_| EngineError::CannotOpen(raw.to_string()))?;
        let queries: Vec<String> = io::BufReader::new(file)
            .lines()
            .collect::<io::Result<Vec<_>>>()?
            .into_iter()
            .filter(|line| !line.is_empty())
            .collect();

        if queries.is_empty() {
            self.print_block("No queries found in file.\n");
            return Ok(());
        }
        self.print_block(&format!(
            "Processing {} query(ies) from: {}\n",
            queries.len(),
            path.display()
        ));

        // Ordinals are fixed at submission; blocks may print in any order.
        for (i, query) in queries.into_iter().enumerate() {
            let ordinal = i + 1;
            let index = Arc::clone(&self.index);
            let output = Arc::clone(&self.output);
            self.pool.execute(move || {
                let terms = tokenizer::extract_words(query.as_bytes());
                if terms.is_empty() {
                    return;
                }

                let started = Instant::now();
                let results = index.search(&terms);
                let elapsed = started.elapsed().as_secs_f64();

                let mut block = String::new();
                let _ = writeln!(block, "{ordinal}. query: {query}");
                let _ = writeln!(block, "  Search took {elapsed:.4}s:");
                for (j, (id, relevance)) in results.iter().enumerate() {
                    let path = index.path_by_id(*id).unwrap_or_default();
                    let _ = writeln!(
                        block,
                        "  {}. id:{id}, relevance:{relevance:.5}, path:{}",
                        j + 1,
                        path.display()
                    );
                }
                if !results.is_empty() {
                    let _ = writeln!(block, "  ---");
                }

                let mut out = output.lock();
                let _ = out.write_all(block.as_bytes());
            })?;
        }
        self.pool.wait();
        Ok(())
    }

    fn remove_file(&self, args: &str) -> Result<()> {
        let raw = first_token(args).ok_or(EngineError::EmptyQuery)?;
        let path = absolute(raw)?;
        if !self.index.has_document(&path) {
            return Err(EngineError::NotIndexed(raw.to_string()));
        }
        if let Some(id) = self.index.remove(&path) {
            self.store.remove(id);
        }
        Ok(())
    }

    fn remove_directory(&self, args: &str, recursive: bool) -> Result<()> {
        let raw = first_token(args).ok_or(EngineError::EmptyQuery)?;
        let dir = absolute(raw)?;
        if !dir.is_dir() {
            return Err(EngineError::PathNotFound(raw.to_string()));
        }

        let removed = self.index.remove_in_dir(&dir, recursive);
        for id in &removed {
            self.store.remove(*id);
        }
        debug!(
            count = removed.len(),
            dir = %dir.display(),
            recursive,
            "removed indexed documents under directory"
        );
        Ok(())
    }

    fn print_indexed_documents(&self) -> Result<()> {
        let documents = self.index.documents();
        let mut block = String::new();
        for document in documents {
            let _ = writeln!(block, "{}", document.path.display());
        }
        self.print_block(&block);
        Ok(())
    }

    fn save_snapshot(&self, args: &str) -> Result<()> {
        let raw = first_token(args).ok_or(EngineError::EmptyPath)?;
        let path = absolute(raw)?;
        let count = persist::save(&self.store, &path)?;
        self.print_block(&format!("Saved {count} document(s) to: {}\n", path.display()));
        Ok(())
    }

    fn load_snapshot(&self, args: &str) -> Result<()> {
        let raw = first_token(args).ok_or(EngineError::EmptyPath)?;
        let path = absolute(raw)?;
        let snapshot = persist::load(&path)?;

        let mut restored = 0;
        let mut max_id = 0;
        for (id, stored) in snapshot {
            if ingest(&self.index, &self.store, id, stored.path, stored.content.as_bytes()) {
                restored += 1;
            }
            max_id = max_id.max(id);
        }
        // Fresh allocations must stay above every restored id.
        self.next_doc_id.fetch_max(max_id + 1, Ordering::Relaxed);

        self.print_block(&format!(
            "Loaded {restored} document(s) from: {}\n",
            path.display()
        ));
        Ok(())
    }

    fn preview(&self, args: &str) -> Result<()> {
        let (id_token, query) = args.split_once(' ').unwrap_or((args, ""));
        if id_token.is_empty() || query.is_empty() {
            return Err(EngineError::EmptyQuery);
        }
        let id: u64 = id_token
            .parse()
            .map_err(|_| EngineError::InvalidDocumentId(id_token.to_string()))?;
        let terms = query_terms(query)?;

        let stored = self.store.get(id).ok_or(EngineError::DocumentNotFound(id))?;
        let preview = snippet::extract(&stored.content, &terms, snippet::DEFAULT_MAX_WORDS);

        let mut block = String::new();
        let _ = writeln!(block, "{}", stored.path.display());
        let _ = writeln!(block, "{preview}");
        self.print_block(&block);
        Ok(())
    }
}

/// Tokenize a raw query, rejecting inputs that carry no terms.
fn query_terms(query: &str) -> Result<Vec<String>> {
    if query.is_empty() {
        return Err(EngineError::EmptyQuery);
    }
    let terms = tokenizer::extract_words(query.as_bytes());
    if terms.is_empty() {
        return Err(EngineError::EmptyQuery);
    }
    Ok(terms)
}

/// Index `content` under `id` and mirror it into the store. Returns false
/// when the content held no words and nothing was recorded.
fn ingest(
    index: &InvertedIndex,
    store: &DocumentStore,
    id: u64,
    path: PathBuf,
    content: &[u8],
) -> bool {
    let Some(document) = Document::build(id, path.clone(), content) else {
        return false;
    };
    if let Some(displaced) = index.add(document) {
        store.remove(displaced);
    }
    store.insert(id, StoredDoc::new(path, content));
    true
}

fn first_token(args: &str) -> Option<&str> {
    args.split_whitespace().next()
}

fn absolute(raw: &str) -> Result<PathBuf> {
    std::path::absolute(raw).map_err(|_| EngineError::PathNotFound(raw.to_string()))
}

fn collect_files(dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if recursive {
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    } else {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
    }
    Ok(files)
}
