use thiserror::Error;

use crate::common::types::Rid;
use crate::storage::buffer::BufferPoolError;
use crate::storage::disk::DiskManagerError;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("record {0} not found")]
    RecordNotFound(Rid),

    #[error("slot {0} is already occupied")]
    SlotOccupied(Rid),

    #[error("record is {got} bytes but the file stores {expected}-byte records")]
    RecordSizeMismatch { expected: usize, got: usize },

    #[error("table {0} is not open")]
    TableNotOpen(String),

    #[error("buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("disk manager error: {0}")]
    Disk(#[from] DiskManagerError),
}
