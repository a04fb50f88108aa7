#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("cannot open snapshot file: {0}")]
    SnapshotIo(#[from] std::io::Error),
    #[error("failed to encode snapshot: {0}")]
    SnapshotEncode(#[source] serde_json::Error),
    #[error("failed to decode snapshot: {0}")]
    SnapshotDecode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
