use std::collections::HashSet;

use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Rid, TxnId};
use crate::record::RecordError;
use crate::transaction::lock_manager::LockDataId;

/// Transaction states under two-phase locking.
///
/// A transaction starts in `Default`, enters `Growing` on its first
/// lock, `Shrinking` on its first unlock, and ends `Committed` or
/// `Aborted`. Once shrinking it must not acquire another lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Default,
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction {0} attempted to lock after releasing a lock")]
    LockOnShrinking(TxnId),

    #[error("transaction {0} refused a lock: no-wait deadlock prevention")]
    DeadlockPrevention(TxnId),

    #[error("transaction {0} not found")]
    TxnNotFound(TxnId),

    #[error("table {0} is not open")]
    TableNotOpen(String),

    #[error("record error during rollback: {0}")]
    Record(#[from] RecordError),
}

/// One entry of a transaction's write log: enough to undo the mutation.
/// Deletes and updates snapshot the prior tuple bytes.
#[derive(Debug, Clone)]
pub enum WriteRecord {
    Insert {
        table: String,
        rid: Rid,
    },
    Delete {
        table: String,
        rid: Rid,
        record: Vec<u8>,
    },
    Update {
        table: String,
        rid: Rid,
        old_record: Vec<u8>,
    },
}

/// An active database transaction: its 2PL state, the set of locks it
/// holds, and the ordered log of its writes.
pub struct Transaction {
    id: TxnId,
    state: Mutex<TransactionState>,
    lock_set: Mutex<HashSet<LockDataId>>,
    write_set: Mutex<Vec<WriteRecord>>,
}

impl Transaction {
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            state: Mutex::new(TransactionState::Default),
            lock_set: Mutex::new(HashSet::new()),
            write_set: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    /// Record a lock this transaction holds
    pub fn add_lock(&self, data_id: LockDataId) {
        self.lock_set.lock().insert(data_id);
    }

    /// Drain the lock set for release at commit or abort
    pub fn take_lock_set(&self) -> Vec<LockDataId> {
        self.lock_set.lock().drain().collect()
    }

    pub fn holds_locks(&self) -> bool {
        !self.lock_set.lock().is_empty()
    }

    /// Append to the write log at mutation time
    pub fn append_write_record(&self, record: WriteRecord) {
        self.write_set.lock().push(record);
    }

    /// Drain the write log, oldest first
    pub fn take_write_set(&self) -> Vec<WriteRecord> {
        std::mem::take(&mut *self.write_set.lock())
    }

    pub fn write_count(&self) -> usize {
        self.write_set.lock().len()
    }
}
