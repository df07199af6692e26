use std::cmp::Ordering;

use crate::common::types::{PageNo, Rid, INVALID_PAGE_NO};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::NodeMut;

use super::base::{IxIndexHandle, TreeState};

impl IxIndexHandle {
    /// Insert a key/rid pair. Returns `Ok(false)` without modification
    /// when the key is already present: duplicates are forbidden.
    pub fn insert_entry(&self, key: &[u8], rid: Rid) -> Result<bool, BTreeError> {
        self.check_key(key)?;
        let mut state = self.state.lock();
        let leaf_no = self.find_leaf(&state, key)?;

        let page = self.fetch(leaf_no)?;
        let mut guard = page.write();
        let mut node = NodeMut::new(&mut guard, &self.schema);
        let pos = node.lower_bound(key);
        if pos < node.num_keys()
            && self.schema.compare(node.key_at(pos), key) == Ordering::Equal
        {
            drop(guard);
            self.unpin(leaf_no, false)?;
            return Ok(false);
        }

        node.insert_pair(pos, key, rid);
        let first_changed = pos == 0;
        let full = node.num_keys() == self.schema.max_keys;
        drop(guard);
        self.unpin(leaf_no, true)?;

        if first_changed {
            self.maintain_parent(leaf_no)?;
        }
        if full {
            self.split(&mut state, leaf_no)?;
        }
        Ok(true)
    }

    /// Split a full node: the upper half moves into a fresh right
    /// sibling, whose first key then rises into the parent.
    fn split(&self, state: &mut TreeState, page_no: PageNo) -> Result<(), BTreeError> {
        let left_page = self.fetch(page_no)?;
        let mut left_guard = left_page.write();
        let mut left = NodeMut::new(&mut left_guard, &self.schema);

        let (new_page, new_page_id) = self.buffer_pool.new_page(self.file_id)?;
        state.num_pages += 1;
        let new_no = new_page_id.page_no;
        let mut new_guard = new_page.write();
        let mut right = NodeMut::new(&mut new_guard, &self.schema);

        let n = left.num_keys();
        let split_pos = n / 2;
        right.init(left.is_leaf(), left.parent());
        for i in split_pos..n {
            right.push_from(&left, i);
        }
        left.set_num_keys(split_pos);

        let is_leaf = left.is_leaf();
        let old_next = left.next_leaf();
        let mut reparent = Vec::new();
        if is_leaf {
            right.set_prev_leaf(page_no);
            right.set_next_leaf(old_next);
            left.set_next_leaf(new_no);
            if old_next == INVALID_PAGE_NO {
                state.last_leaf = new_no;
            }
        } else {
            for i in 0..right.num_keys() {
                reparent.push(right.child_at(i));
            }
        }

        let risen_key = right.key_at(0).to_vec();
        let parent_no = left.parent();
        drop(left_guard);
        drop(new_guard);
        self.unpin(page_no, true)?;
        self.unpin(new_no, true)?;

        if is_leaf && old_next != INVALID_PAGE_NO {
            let next_page = self.fetch(old_next)?;
            let mut next_guard = next_page.write();
            NodeMut::new(&mut next_guard, &self.schema).set_prev_leaf(new_no);
            drop(next_guard);
            self.unpin(old_next, true)?;
        }
        for child in reparent {
            self.set_parent_of(child, new_no)?;
        }

        self.insert_into_parent(state, page_no, parent_no, &risen_key, new_no)
    }

    /// Hook a freshly split-off right sibling into the tree above it,
    /// growing a new root when the split reaches the top.
    fn insert_into_parent(
        &self,
        state: &mut TreeState,
        left_no: PageNo,
        parent_no: PageNo,
        risen_key: &[u8],
        right_no: PageNo,
    ) -> Result<(), BTreeError> {
        if parent_no == INVALID_PAGE_NO {
            let left_key0 = {
                let page = self.fetch(left_no)?;
                let mut guard = page.write();
                let node = NodeMut::new(&mut guard, &self.schema);
                let key = node.key_at(0).to_vec();
                drop(guard);
                self.unpin(left_no, false)?;
                key
            };

            let (root_page, root_page_id) = self.buffer_pool.new_page(self.file_id)?;
            state.num_pages += 1;
            let root_no = root_page_id.page_no;
            {
                let mut guard = root_page.write();
                let mut root = NodeMut::new(&mut guard, &self.schema);
                root.init(false, INVALID_PAGE_NO);
                root.insert_pair(0, &left_key0, Rid::new(left_no, 0));
                root.insert_pair(1, risen_key, Rid::new(right_no, 0));
            }
            self.unpin(root_no, true)?;

            self.set_parent_of(left_no, root_no)?;
            self.set_parent_of(right_no, root_no)?;
            state.root_page_no = root_no;
            return Ok(());
        }

        let page = self.fetch(parent_no)?;
        let mut guard = page.write();
        let mut parent = NodeMut::new(&mut guard, &self.schema);
        let rank = parent.find_child(left_no).ok_or_else(|| {
            BTreeError::Corrupted(format!("page {left_no} missing from parent {parent_no}"))
        })?;
        parent.insert_pair(rank + 1, risen_key, Rid::new(right_no, 0));
        let full = parent.num_keys() == self.schema.max_keys;
        drop(guard);
        self.unpin(parent_no, true)?;

        if full {
            self.split(state, parent_no)?;
        }
        Ok(())
    }
}
