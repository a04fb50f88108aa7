//! JSON snapshot of the document store.
//!
//! The shape on disk is `{document_id: {path, content, title}}`. Restoring is
//! the caller's job: replay the entries through the normal add path in id
//! order and advance the id allocator past the largest restored id, so the
//! index invariants hold by construction.

use crate::error::{Error, Result};
use crate::store::{DocumentStore, StoredDoc};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Write the store's full contents to `path`, ids ascending.
pub fn save(store: &DocumentStore, path: &Path) -> Result<usize> {
    let snapshot: BTreeMap<u64, StoredDoc> = store.all().into_iter().collect();
    let count = snapshot.len();

    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), &snapshot).map_err(Error::SnapshotEncode)?;
    info!(count, path = %path.display(), "wrote snapshot");
    Ok(count)
}

/// Read a snapshot back. Entries come out in id order.
pub fn load(path: &Path) -> Result<BTreeMap<u64, StoredDoc>> {
    let file = File::open(path)?;
    let snapshot: BTreeMap<u64, StoredDoc> =
        serde_json::from_reader(BufReader::new(file)).map_err(Error::SnapshotDecode)?;
    info!(count = snapshot.len(), path = %path.display(), "read snapshot");
    Ok(snapshot)
}
