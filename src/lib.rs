// Export public modules
pub mod common;
pub mod index;
pub mod record;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use common::types::{Iid, PageId, Rid, PAGE_SIZE};
pub use index::btree::{BTreeError, IxIndexHandle, IxScan};
pub use index::IndexManager;
pub use record::{RecordError, RecordManager, RmFileHandle, RmScan};
pub use storage::buffer::{BufferPoolError, BufferPoolManager, ClockReplacer};
pub use storage::disk::{DiskManager, DiskManagerError};
pub use transaction::{
    LockManager, Transaction, TransactionError, TransactionManager, TransactionState,
};
