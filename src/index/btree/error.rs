use std::path::PathBuf;

use thiserror::Error;

use crate::storage::buffer::BufferPoolError;
use crate::storage::disk::DiskManagerError;

#[derive(Error, Debug)]
pub enum BTreeError {
    #[error("index entry not found")]
    EntryNotFound,

    #[error("key is {got} bytes but the index stores {expected}-byte keys")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("index already exists: {0}")]
    IndexExists(PathBuf),

    #[error("index not found: {0}")]
    IndexNotFound(PathBuf),

    #[error("column type/length lists do not describe a valid key: {0}")]
    InvalidSchema(String),

    #[error("index header serialization failed: {0}")]
    Header(String),

    #[error("tree structure corrupted: {0}")]
    Corrupted(String),

    #[error("buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("disk manager error: {0}")]
    Disk(#[from] DiskManagerError),
}
