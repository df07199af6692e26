use thiserror::Error;

use crate::common::types::PageId;
use crate::storage::disk::DiskManagerError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("page {0} not found in buffer pool")]
    PageNotFound(PageId),

    #[error("page {0} is pinned")]
    PagePinned(PageId),

    #[error("buffer pool is full: no evictable frame")]
    BufferPoolFull,

    #[error("disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),
}
