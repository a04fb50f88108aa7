//! findex-core - engine of the findex full-text search service.
//!
//! The pieces compose bottom-up: the [`tokenizer`] turns bytes into terms,
//! [`Document`] carries per-file term statistics, and [`InvertedIndex`] maps
//! terms and n-grams to document ids under one reader-writer lock. The
//! [`DocumentStore`] keeps raw text on the side for [`snippet`] previews and
//! [`persist`] snapshots.
//!
//! All state is instance-based; there are no process-wide singletons. The
//! index never performs I/O — callers read files, build documents, and hand
//! them in.

pub mod document;
pub mod index;
pub mod persist;
pub mod snippet;
pub mod store;
pub mod tokenizer;

mod error;

pub use document::Document;
pub use error::{Error, Result};
pub use index::{DEFAULT_NGRAM_SIZE, InvertedIndex, MAX_RESULTS};
pub use store::{DocumentStore, StoredDoc};
