use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::types::{FileId, PageId, PageNo, PagePtr, Rid, FILE_HDR_PAGE_NO, INVALID_PAGE_NO};
use crate::index::btree::error::BTreeError;
use crate::index::btree::header::{IxFileHdr, KeySchema};
use crate::index::btree::node::NodeMut;
use crate::storage::buffer::BufferPoolManager;

/// Mutable tree bookkeeping, guarded by the tree-level latch. Taking
/// this lock is what serializes structural operations on the index.
pub(crate) struct TreeState {
    pub root_page_no: PageNo,
    pub first_leaf: PageNo,
    pub last_leaf: PageNo,
    pub num_pages: PageNo,
}

/// Handle to one open B+ tree index file.
///
/// Maps a fixed-width composite key to a `Rid`. Nodes are pages fetched
/// through the buffer pool; leaves form a doubly-linked list in key
/// order for range scans.
pub struct IxIndexHandle {
    pub(crate) buffer_pool: Arc<BufferPoolManager>,
    pub(crate) file_id: FileId,
    pub(crate) schema: KeySchema,
    pub(crate) state: Mutex<TreeState>,
}

impl IxIndexHandle {
    pub fn new(
        buffer_pool: Arc<BufferPoolManager>,
        file_id: FileId,
        hdr: IxFileHdr,
    ) -> Result<Self, BTreeError> {
        let schema = KeySchema::from_hdr(&hdr)?;
        Ok(Self {
            buffer_pool,
            file_id,
            schema,
            state: Mutex::new(TreeState {
                root_page_no: hdr.root_page_no,
                first_leaf: hdr.first_leaf,
                last_leaf: hdr.last_leaf,
                num_pages: hdr.num_pages,
            }),
        })
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// Look up the record id stored under `key`, if any
    pub fn get_value(&self, key: &[u8]) -> Result<Option<Rid>, BTreeError> {
        self.check_key(key)?;
        let state = self.state.lock();
        let leaf_no = self.find_leaf(&state, key)?;

        let page = self.fetch(leaf_no)?;
        let mut guard = page.write();
        let node = NodeMut::new(&mut guard, &self.schema);
        let pos = node.lower_bound(key);
        let found = pos < node.num_keys()
            && self.schema.compare(node.key_at(pos), key) == Ordering::Equal;
        let rid = if found { Some(node.rid_at(pos)) } else { None };
        drop(guard);
        self.unpin(leaf_no, false)?;
        Ok(rid)
    }

    /// Write the current header back to page 0 and flush every resident
    /// page of the index file.
    pub fn flush(&self) -> Result<(), BTreeError> {
        let state = self.state.lock();
        self.write_hdr(&state)?;
        self.buffer_pool.flush_all_pages(self.file_id)?;
        Ok(())
    }

    /// Descend from the root to the leaf that owns `key`. The returned
    /// page is not pinned; callers re-fetch under the held tree latch.
    pub(crate) fn find_leaf(&self, state: &TreeState, key: &[u8]) -> Result<PageNo, BTreeError> {
        let mut page_no = state.root_page_no;
        loop {
            let page = self.fetch(page_no)?;
            let mut guard = page.write();
            let node = NodeMut::new(&mut guard, &self.schema);
            if node.is_leaf() {
                drop(guard);
                self.unpin(page_no, false)?;
                return Ok(page_no);
            }
            let child = node.child_for(key);
            drop(guard);
            self.unpin(page_no, false)?;
            page_no = child;
        }
    }

    /// Propagate a changed first key into parent separator slots, up to
    /// the root or the first slot that already matches.
    pub(crate) fn maintain_parent(&self, page_no: PageNo) -> Result<(), BTreeError> {
        let mut cur = page_no;
        loop {
            let (parent_no, first_key) = {
                let page = self.fetch(cur)?;
                let mut guard = page.write();
                let node = NodeMut::new(&mut guard, &self.schema);
                let info = (node.parent(), node.key_at(0).to_vec());
                drop(guard);
                self.unpin(cur, false)?;
                info
            };
            if parent_no == INVALID_PAGE_NO {
                return Ok(());
            }

            let page = self.fetch(parent_no)?;
            let mut guard = page.write();
            let mut parent = NodeMut::new(&mut guard, &self.schema);
            let rank = parent.find_child(cur).ok_or_else(|| {
                BTreeError::Corrupted(format!("page {cur} missing from parent {parent_no}"))
            })?;
            if self.schema.compare(parent.key_at(rank), &first_key) == Ordering::Equal {
                drop(guard);
                self.unpin(parent_no, false)?;
                return Ok(());
            }
            parent.set_key(rank, &first_key);
            drop(guard);
            self.unpin(parent_no, true)?;
            cur = parent_no;
        }
    }

    /// Rewrite one child's parent pointer
    pub(crate) fn set_parent_of(&self, child: PageNo, parent: PageNo) -> Result<(), BTreeError> {
        let page = self.fetch(child)?;
        let mut guard = page.write();
        let mut node = NodeMut::new(&mut guard, &self.schema);
        node.set_parent(parent);
        drop(guard);
        self.unpin(child, true)
    }

    pub(crate) fn check_key(&self, key: &[u8]) -> Result<(), BTreeError> {
        if key.len() != self.schema.key_len {
            return Err(BTreeError::InvalidKeyLength {
                expected: self.schema.key_len,
                got: key.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn write_hdr(&self, state: &TreeState) -> Result<(), BTreeError> {
        let hdr = IxFileHdr {
            root_page_no: state.root_page_no,
            num_pages: state.num_pages,
            first_leaf: state.first_leaf,
            last_leaf: state.last_leaf,
            col_types: self.schema.col_types.clone(),
            col_lens: self.schema.col_lens.clone(),
            key_len: self.schema.key_len as u16,
            max_keys: self.schema.max_keys as u16,
        };
        let page = self.fetch(FILE_HDR_PAGE_NO)?;
        let result = hdr.write_to(&mut page.write().data);
        self.unpin(FILE_HDR_PAGE_NO, result.is_ok())?;
        result
    }

    pub(crate) fn fetch(&self, page_no: PageNo) -> Result<PagePtr, BTreeError> {
        Ok(self
            .buffer_pool
            .fetch_page(PageId::new(self.file_id, page_no))?)
    }

    pub(crate) fn unpin(&self, page_no: PageNo, dirty: bool) -> Result<(), BTreeError> {
        self.buffer_pool
            .unpin_page(PageId::new(self.file_id, page_no), dirty)?;
        Ok(())
    }
}
