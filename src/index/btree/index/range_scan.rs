use crate::common::types::{Iid, Rid, INVALID_PAGE_NO};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::NodeMut;

use super::base::{IxIndexHandle, TreeState};

impl IxIndexHandle {
    /// Position of the first entry with key >= `key`
    pub fn lower_bound(&self, key: &[u8]) -> Result<Iid, BTreeError> {
        self.check_key(key)?;
        let state = self.state.lock();
        self.bound(&state, key, false)
    }

    /// Position one past the last entry with key <= `key`
    pub fn upper_bound(&self, key: &[u8]) -> Result<Iid, BTreeError> {
        self.check_key(key)?;
        let state = self.state.lock();
        self.bound(&state, key, true)
    }

    /// Position of the first entry in key order
    pub fn leaf_begin(&self) -> Result<Iid, BTreeError> {
        let state = self.state.lock();
        let first_leaf = state.first_leaf;
        let page = self.fetch(first_leaf)?;
        let mut guard = page.write();
        let num_keys = NodeMut::new(&mut guard, &self.schema).num_keys();
        drop(guard);
        self.unpin(first_leaf, false)?;

        if num_keys == 0 {
            return Ok(Iid::END);
        }
        Ok(Iid::new(first_leaf, 0))
    }

    /// The end-of-scan sentinel
    pub fn leaf_end(&self) -> Iid {
        Iid::END
    }

    /// Record id stored at a scan position
    pub fn get_rid(&self, iid: Iid) -> Result<Rid, BTreeError> {
        if iid == Iid::END {
            return Err(BTreeError::EntryNotFound);
        }
        let _state = self.state.lock();
        let page = self.fetch(iid.page_no)?;
        let mut guard = page.write();
        let node = NodeMut::new(&mut guard, &self.schema);
        if iid.slot_no as usize >= node.num_keys() {
            drop(guard);
            self.unpin(iid.page_no, false)?;
            return Err(BTreeError::EntryNotFound);
        }
        let rid = node.rid_at(iid.slot_no as usize);
        drop(guard);
        self.unpin(iid.page_no, false)?;
        Ok(rid)
    }

    /// The position following `iid`: the next slot in its leaf, or the
    /// first slot of the next leaf, or the end sentinel.
    pub fn next_iid(&self, iid: Iid) -> Result<Iid, BTreeError> {
        if iid == Iid::END {
            return Ok(Iid::END);
        }
        let _state = self.state.lock();
        let page = self.fetch(iid.page_no)?;
        let mut guard = page.write();
        let node = NodeMut::new(&mut guard, &self.schema);
        let num_keys = node.num_keys();
        let next_leaf = node.next_leaf();
        drop(guard);
        self.unpin(iid.page_no, false)?;

        let slot = iid.slot_no + 1;
        if (slot as usize) < num_keys {
            return Ok(Iid::new(iid.page_no, slot));
        }
        if next_leaf == INVALID_PAGE_NO {
            return Ok(Iid::END);
        }
        Ok(Iid::new(next_leaf, 0))
    }

    fn bound(&self, state: &TreeState, key: &[u8], upper: bool) -> Result<Iid, BTreeError> {
        let leaf_no = self.find_leaf(state, key)?;
        let page = self.fetch(leaf_no)?;
        let mut guard = page.write();
        let node = NodeMut::new(&mut guard, &self.schema);
        let pos = if upper {
            node.upper_bound(key)
        } else {
            node.lower_bound(key)
        };
        let num_keys = node.num_keys();
        let next_leaf = node.next_leaf();
        drop(guard);
        self.unpin(leaf_no, false)?;

        if pos < num_keys {
            return Ok(Iid::new(leaf_no, pos as u32));
        }
        if next_leaf == INVALID_PAGE_NO {
            return Ok(Iid::END);
        }
        Ok(Iid::new(next_leaf, 0))
    }
}

/// Forward scan over a half-open range of leaf positions.
///
/// Steps slot by slot within a leaf and follows the leaf chain at the
/// boundary; the position compares against the end exactly. Structural
/// changes to the index invalidate an in-flight scan, so callers must
/// not interleave scans with writes to the same index.
pub struct IxScan<'a> {
    handle: &'a IxIndexHandle,
    iid: Iid,
    end: Iid,
}

impl<'a> IxScan<'a> {
    pub fn new(handle: &'a IxIndexHandle, lower: Iid, upper: Iid) -> Self {
        Self {
            handle,
            iid: lower,
            end: upper,
        }
    }

    pub fn is_end(&self) -> bool {
        // The global end sentinel terminates any scan, even one whose
        // upper bound was never reached
        self.iid == self.end || self.iid == Iid::END
    }

    pub fn iid(&self) -> Iid {
        self.iid
    }

    pub fn rid(&self) -> Result<Rid, BTreeError> {
        self.handle.get_rid(self.iid)
    }

    pub fn next(&mut self) -> Result<(), BTreeError> {
        if !self.is_end() {
            self.iid = self.handle.next_iid(self.iid)?;
        }
        Ok(())
    }
}
