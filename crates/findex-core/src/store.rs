//! Raw-content side table for indexed documents.
//!
//! The index works on bytes and keeps only term statistics; this store keeps
//! the text itself so snippets and snapshots never re-read the filesystem.
//! The dispatcher keeps it mirroring the index's live-document set.

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredDoc {
    pub path: PathBuf,
    pub content: String,
    pub title: String,
}

impl StoredDoc {
    /// Content is decoded lossily; the store is presentation-side, the index
    /// keeps the exact byte view.
    pub fn new(path: PathBuf, content: &[u8]) -> Self {
        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            content: String::from_utf8_lossy(content).into_owned(),
            title,
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    docs: RwLock<AHashMap<u64, StoredDoc>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: u64, doc: StoredDoc) {
        self.docs.write().insert(id, doc);
    }

    pub fn get(&self, id: u64) -> Option<StoredDoc> {
        self.docs.read().get(&id).cloned()
    }

    pub fn remove(&self, id: u64) {
        self.docs.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Snapshot of the whole store, ids ascending.
    pub fn all(&self) -> Vec<(u64, StoredDoc)> {
        let mut entries: Vec<(u64, StoredDoc)> = self
            .docs
            .read()
            .iter()
            .map(|(&id, doc)| (id, doc.clone()))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries
    }
}
