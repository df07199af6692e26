use std::collections::HashMap;

use log::warn;
use parking_lot::Mutex;

use crate::common::types::{Rid, TxnId};
use crate::transaction::transaction::{Transaction, TransactionError, TransactionState};

/// Lock modes for multi-granularity two-phase locking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    IntentionShared,
    IntentionExclusive,
    Shared,
    SharedIntentionExclusive,
    Exclusive,
}

/// Aggregate mode of a lock request queue: the least upper bound of all
/// granted modes, or `NonLock` for an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum GroupLockMode {
    #[default]
    NonLock,
    IntentionShared,
    IntentionExclusive,
    Shared,
    SharedIntentionExclusive,
    Exclusive,
}

impl GroupLockMode {
    fn from_mode(mode: LockMode) -> Self {
        match mode {
            LockMode::IntentionShared => GroupLockMode::IntentionShared,
            LockMode::IntentionExclusive => GroupLockMode::IntentionExclusive,
            LockMode::Shared => GroupLockMode::Shared,
            LockMode::SharedIntentionExclusive => GroupLockMode::SharedIntentionExclusive,
            LockMode::Exclusive => GroupLockMode::Exclusive,
        }
    }

    /// Whether a request in `mode` is compatible with this group mode
    fn compatible_with(self, mode: LockMode) -> bool {
        use GroupLockMode::*;
        use LockMode as M;
        match self {
            NonLock => true,
            IntentionShared => mode != M::Exclusive,
            IntentionExclusive => {
                matches!(mode, M::IntentionShared | M::IntentionExclusive)
            }
            Shared => matches!(mode, M::IntentionShared | M::Shared),
            SharedIntentionExclusive => mode == M::IntentionShared,
            Exclusive => false,
        }
    }

    /// Least upper bound of this group mode and a newly granted mode
    fn join(self, mode: LockMode) -> Self {
        use GroupLockMode::*;
        let other = GroupLockMode::from_mode(mode);
        match (self, other) {
            (Exclusive, _) | (_, Exclusive) => Exclusive,
            (SharedIntentionExclusive, _) | (_, SharedIntentionExclusive) => {
                SharedIntentionExclusive
            }
            // S and IX only coexist transiently; their join is SIX
            (Shared, IntentionExclusive) | (IntentionExclusive, Shared) => {
                SharedIntentionExclusive
            }
            (Shared, _) | (_, Shared) => Shared,
            (IntentionExclusive, _) | (_, IntentionExclusive) => IntentionExclusive,
            (IntentionShared, _) | (_, IntentionShared) => IntentionShared,
            (NonLock, NonLock) => NonLock,
        }
    }
}

/// Granularity of a lockable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockTarget {
    Table,
    Record(Rid),
}

/// Key of the global lock table: one table or one record of it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockDataId {
    pub table: String,
    pub target: LockTarget,
}

impl LockDataId {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            target: LockTarget::Table,
        }
    }

    pub fn record(table: &str, rid: Rid) -> Self {
        Self {
            table: table.to_string(),
            target: LockTarget::Record(rid),
        }
    }
}

/// A granted lock request
#[derive(Debug, Clone)]
struct LockRequest {
    txn_id: TxnId,
    mode: LockMode,
}

/// All requests on one lock data id plus their aggregate mode.
///
/// Entries are created on first reference and kept for the life of the
/// process; reclaiming empty queues is a known gap for long-running use.
#[derive(Debug, Default)]
struct LockRequestQueue {
    requests: Vec<LockRequest>,
    group_mode: GroupLockMode,
}

impl LockRequestQueue {
    fn recompute_group_mode(&mut self) {
        let mut mode = GroupLockMode::NonLock;
        for request in &self.requests {
            mode = mode.join(request.mode);
        }
        self.group_mode = mode;
    }
}

/// Multi-granularity two-phase lock manager with no-wait deadlock
/// prevention: an incompatible request is refused immediately and the
/// requester aborts, so the wait-for graph is empty by construction.
pub struct LockManager {
    lock_table: Mutex<HashMap<LockDataId, LockRequestQueue>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            lock_table: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_shared_on_table(
        &self,
        txn: &Transaction,
        table: &str,
    ) -> Result<bool, TransactionError> {
        self.lock(txn, LockDataId::table(table), LockMode::Shared)
    }

    pub fn lock_exclusive_on_table(
        &self,
        txn: &Transaction,
        table: &str,
    ) -> Result<bool, TransactionError> {
        self.lock(txn, LockDataId::table(table), LockMode::Exclusive)
    }

    pub fn lock_is_on_table(
        &self,
        txn: &Transaction,
        table: &str,
    ) -> Result<bool, TransactionError> {
        self.lock(txn, LockDataId::table(table), LockMode::IntentionShared)
    }

    pub fn lock_ix_on_table(
        &self,
        txn: &Transaction,
        table: &str,
    ) -> Result<bool, TransactionError> {
        self.lock(txn, LockDataId::table(table), LockMode::IntentionExclusive)
    }

    pub fn lock_shared_on_record(
        &self,
        txn: &Transaction,
        table: &str,
        rid: Rid,
    ) -> Result<bool, TransactionError> {
        self.lock(txn, LockDataId::record(table, rid), LockMode::Shared)
    }

    pub fn lock_exclusive_on_record(
        &self,
        txn: &Transaction,
        table: &str,
        rid: Rid,
    ) -> Result<bool, TransactionError> {
        self.lock(txn, LockDataId::record(table, rid), LockMode::Exclusive)
    }

    /// Release one lock and recompute the queue's aggregate mode.
    /// Returns `Ok(false)` when no such queue exists.
    pub fn unlock(
        &self,
        txn: &Transaction,
        data_id: &LockDataId,
    ) -> Result<bool, TransactionError> {
        let mut table = self.lock_table.lock();
        let queue = match table.get_mut(data_id) {
            Some(queue) => queue,
            None => return Ok(false),
        };

        queue.requests.retain(|request| request.txn_id != txn.id());
        queue.recompute_group_mode();

        if txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }
        Ok(true)
    }

    /// Shared skeleton of all six lock entry points
    fn lock(
        &self,
        txn: &Transaction,
        data_id: LockDataId,
        mode: LockMode,
    ) -> Result<bool, TransactionError> {
        match txn.state() {
            TransactionState::Shrinking => {
                return Err(TransactionError::LockOnShrinking(txn.id()))
            }
            TransactionState::Default | TransactionState::Growing => {}
            TransactionState::Committed | TransactionState::Aborted => {
                return Err(TransactionError::TxnNotFound(txn.id()))
            }
        }

        let mut table = self.lock_table.lock();
        let queue = table.entry(data_id.clone()).or_default();

        // Idempotent reacquire; true upgrades are not supported
        if queue
            .requests
            .iter()
            .any(|request| request.txn_id == txn.id())
        {
            return Ok(true);
        }

        if !queue.group_mode.compatible_with(mode) {
            warn!(
                "txn {} refused {mode:?} on {data_id:?} (held: {:?})",
                txn.id(),
                queue.group_mode
            );
            return Err(TransactionError::DeadlockPrevention(txn.id()));
        }

        queue.requests.push(LockRequest {
            txn_id: txn.id(),
            mode,
        });
        queue.group_mode = queue.group_mode.join(mode);

        txn.add_lock(data_id);
        if txn.state() == TransactionState::Default {
            txn.set_state(TransactionState::Growing);
        }
        Ok(true)
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
