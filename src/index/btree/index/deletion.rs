use std::cmp::Ordering;

use log::debug;

use crate::common::types::{PageId, PageNo, INVALID_PAGE_NO};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::NodeMut;

use super::base::{IxIndexHandle, TreeState};

impl IxIndexHandle {
    /// Remove the entry stored under `key`. Missing keys are an
    /// `EntryNotFound` error.
    pub fn delete_entry(&self, key: &[u8]) -> Result<(), BTreeError> {
        self.check_key(key)?;
        let mut state = self.state.lock();
        let leaf_no = self.find_leaf(&state, key)?;

        let page = self.fetch(leaf_no)?;
        let mut guard = page.write();
        let mut node = NodeMut::new(&mut guard, &self.schema);
        let pos = node.lower_bound(key);
        if pos >= node.num_keys()
            || self.schema.compare(node.key_at(pos), key) != Ordering::Equal
        {
            drop(guard);
            self.unpin(leaf_no, false)?;
            return Err(BTreeError::EntryNotFound);
        }

        node.erase_pair(pos);
        let first_changed = pos == 0 && node.num_keys() > 0;
        drop(guard);
        self.unpin(leaf_no, true)?;

        if first_changed {
            self.maintain_parent(leaf_no)?;
        }
        self.coalesce_or_redistribute(&mut state, leaf_no)
    }

    /// Restore the minimum-occupancy invariant for `page_no` after a
    /// removal, borrowing from or merging with a sibling as needed.
    fn coalesce_or_redistribute(
        &self,
        state: &mut TreeState,
        page_no: PageNo,
    ) -> Result<(), BTreeError> {
        if page_no == state.root_page_no {
            return self.adjust_root(state);
        }

        let (num_keys, parent_no) = {
            let page = self.fetch(page_no)?;
            let mut guard = page.write();
            let node = NodeMut::new(&mut guard, &self.schema);
            let info = (node.num_keys(), node.parent());
            drop(guard);
            self.unpin(page_no, false)?;
            info
        };
        if num_keys >= self.schema.min_keys {
            return Ok(());
        }

        // Prefer the left sibling; the first child has only a right one
        let (index, neighbor_no) = {
            let page = self.fetch(parent_no)?;
            let mut guard = page.write();
            let parent = NodeMut::new(&mut guard, &self.schema);
            let index = parent.find_child(page_no).ok_or_else(|| {
                BTreeError::Corrupted(format!("page {page_no} missing from parent {parent_no}"))
            })?;
            let neighbor_index = if index > 0 { index - 1 } else { 1 };
            let neighbor_no = parent.child_at(neighbor_index);
            drop(guard);
            self.unpin(parent_no, false)?;
            (index, neighbor_no)
        };

        let neighbor_keys = {
            let page = self.fetch(neighbor_no)?;
            let mut guard = page.write();
            let n = NodeMut::new(&mut guard, &self.schema).num_keys();
            drop(guard);
            self.unpin(neighbor_no, false)?;
            n
        };

        if num_keys + neighbor_keys >= 2 * self.schema.min_keys {
            self.redistribute(page_no, neighbor_no, index)
        } else {
            self.coalesce(state, page_no, neighbor_no, parent_no, index)?;
            self.coalesce_or_redistribute(state, parent_no)
        }
    }

    /// Shrink the tree at the top: promote a lone child of an internal
    /// root. An empty leaf root stays; the tree is simply empty.
    fn adjust_root(&self, state: &mut TreeState) -> Result<(), BTreeError> {
        let root_no = state.root_page_no;
        let page = self.fetch(root_no)?;
        let mut guard = page.write();
        let node = NodeMut::new(&mut guard, &self.schema);

        if !node.is_leaf() && node.num_keys() == 1 {
            let child_no = node.child_at(0);
            drop(guard);
            self.unpin(root_no, false)?;

            self.set_parent_of(child_no, INVALID_PAGE_NO)?;
            state.root_page_no = child_no;
            self.buffer_pool
                .delete_page(PageId::new(self.file_id, root_no))?;
            debug!("root {root_no} collapsed into {child_no}");
            return Ok(());
        }

        drop(guard);
        self.unpin(root_no, false)?;
        Ok(())
    }

    /// Move one entry from the fatter sibling into `page_no`
    fn redistribute(
        &self,
        page_no: PageNo,
        neighbor_no: PageNo,
        index: usize,
    ) -> Result<(), BTreeError> {
        let page = self.fetch(page_no)?;
        let neighbor_page = self.fetch(neighbor_no)?;
        let mut guard = page.write();
        let mut neighbor_guard = neighbor_page.write();
        let mut node = NodeMut::new(&mut guard, &self.schema);
        let mut neighbor = NodeMut::new(&mut neighbor_guard, &self.schema);

        let moved_child;
        let first_key_owner;
        if index > 0 {
            // Left neighbor: its last entry becomes our first
            let last = neighbor.num_keys() - 1;
            node.insert_pair(0, neighbor.key_at(last), neighbor.rid_at(last));
            neighbor.erase_pair(last);
            moved_child = (!node.is_leaf()).then(|| node.child_at(0));
            first_key_owner = page_no;
        } else {
            // Right neighbor: its first entry becomes our last
            let n = node.num_keys();
            node.insert_pair(n, neighbor.key_at(0), neighbor.rid_at(0));
            neighbor.erase_pair(0);
            moved_child = (!node.is_leaf()).then(|| node.child_at(n));
            first_key_owner = neighbor_no;
        }

        drop(guard);
        drop(neighbor_guard);
        self.unpin(page_no, true)?;
        self.unpin(neighbor_no, true)?;

        if let Some(child) = moved_child {
            self.set_parent_of(child, page_no)?;
        }
        self.maintain_parent(first_key_owner)
    }

    /// Merge the right node of the pair into the left and drop the
    /// right node's separator from the parent.
    fn coalesce(
        &self,
        state: &mut TreeState,
        page_no: PageNo,
        neighbor_no: PageNo,
        parent_no: PageNo,
        index: usize,
    ) -> Result<(), BTreeError> {
        let (left_no, right_no, right_rank) = if index == 0 {
            (page_no, neighbor_no, 1)
        } else {
            (neighbor_no, page_no, index)
        };

        let left_page = self.fetch(left_no)?;
        let right_page = self.fetch(right_no)?;
        let mut left_guard = left_page.write();
        let mut right_guard = right_page.write();
        let mut left = NodeMut::new(&mut left_guard, &self.schema);
        let right = NodeMut::new(&mut right_guard, &self.schema);

        let mut reparent = Vec::new();
        for i in 0..right.num_keys() {
            left.push_from(&right, i);
            if !right.is_leaf() {
                reparent.push(right.child_at(i));
            }
        }

        let mut relink_next = INVALID_PAGE_NO;
        if right.is_leaf() {
            let next = right.next_leaf();
            left.set_next_leaf(next);
            if next != INVALID_PAGE_NO {
                relink_next = next;
            } else if state.last_leaf == right_no {
                state.last_leaf = left_no;
            }
        }

        drop(left_guard);
        drop(right_guard);
        self.unpin(left_no, true)?;
        self.unpin(right_no, true)?;

        if relink_next != INVALID_PAGE_NO {
            let next_page = self.fetch(relink_next)?;
            let mut next_guard = next_page.write();
            NodeMut::new(&mut next_guard, &self.schema).set_prev_leaf(left_no);
            drop(next_guard);
            self.unpin(relink_next, true)?;
        }
        for child in reparent {
            self.set_parent_of(child, left_no)?;
        }
        self.buffer_pool
            .delete_page(PageId::new(self.file_id, right_no))?;

        let parent_page = self.fetch(parent_no)?;
        let mut parent_guard = parent_page.write();
        let mut parent = NodeMut::new(&mut parent_guard, &self.schema);
        parent.erase_pair(right_rank);
        drop(parent_guard);
        self.unpin(parent_no, true)?;
        Ok(())
    }
}
