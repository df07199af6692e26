use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::types::TxnId;
use crate::record::RecordManager;
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{
    Transaction, TransactionError, TransactionState, WriteRecord,
};

/// Transaction manager: owns the transaction lifecycle and drives
/// physical undo on abort by replaying the write log in reverse.
pub struct TransactionManager {
    next_txn_id: AtomicU32,
    lock_manager: Arc<LockManager>,
    record_manager: Arc<RecordManager>,
    txn_map: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>, record_manager: Arc<RecordManager>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
            lock_manager,
            record_manager,
            txn_map: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Begin a transaction and register it in the global map. Given
    /// `None`, a fresh transaction is created under a new id; an
    /// externally constructed transaction is registered as-is.
    pub fn begin(&self, txn: Option<Arc<Transaction>>) -> Arc<Transaction> {
        let txn = txn.unwrap_or_else(|| {
            let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
            Arc::new(Transaction::new(txn_id))
        });
        self.txn_map.lock().insert(txn.id(), txn.clone());
        txn
    }

    /// Commit: release every lock and finish. The write log is dropped;
    /// a WAL commit record would be appended and flushed here, before
    /// the locks are released.
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        txn.take_write_set();

        for data_id in txn.take_lock_set() {
            self.lock_manager.unlock(txn, &data_id)?;
        }
        txn.set_state(TransactionState::Committed);
        self.txn_map.lock().remove(&txn.id());
        Ok(())
    }

    /// Abort: walk the write log newest-first and apply the inverse
    /// record operation for each entry, then release all locks.
    pub fn abort(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        let writes = txn.take_write_set();
        debug!("aborting txn {}: undoing {} writes", txn.id(), writes.len());

        for write in writes.iter().rev() {
            match write {
                WriteRecord::Insert { table, rid } => {
                    let handle = self.table_handle(table)?;
                    handle.delete_record(*rid)?;
                }
                WriteRecord::Delete { table, rid, record } => {
                    let handle = self.table_handle(table)?;
                    handle.insert_record_at(*rid, record)?;
                }
                WriteRecord::Update {
                    table,
                    rid,
                    old_record,
                } => {
                    let handle = self.table_handle(table)?;
                    handle.update_record(*rid, old_record)?;
                }
            }
        }

        for data_id in txn.take_lock_set() {
            self.lock_manager.unlock(txn, &data_id)?;
        }
        txn.set_state(TransactionState::Aborted);
        self.txn_map.lock().remove(&txn.id());
        Ok(())
    }

    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.txn_map.lock().get(&txn_id).cloned()
    }

    pub fn active_transaction_ids(&self) -> Vec<TxnId> {
        self.txn_map.lock().keys().copied().collect()
    }

    fn table_handle(
        &self,
        table: &str,
    ) -> Result<Arc<crate::record::RmFileHandle>, TransactionError> {
        self.record_manager
            .handle(table)
            .ok_or_else(|| TransactionError::TableNotOpen(table.to_string()))
    }
}
