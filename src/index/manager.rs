use std::path::Path;
use std::sync::Arc;

use crate::common::types::{PageId, FILE_HDR_PAGE_NO, INVALID_PAGE_NO};
use crate::index::btree::header::{ColType, IxFileHdr, KeySchema};
use crate::index::btree::node::NodeMut;
use crate::index::btree::{BTreeError, IxIndexHandle};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::disk::{DiskManager, DiskManagerError};

/// IndexManager owns the lifecycle of B+ tree index files: canonical
/// naming, creation, opening, and destruction.
pub struct IndexManager {
    disk_manager: Arc<DiskManager>,
    buffer_pool: Arc<BufferPoolManager>,
}

impl IndexManager {
    pub fn new(disk_manager: Arc<DiskManager>, buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            disk_manager,
            buffer_pool,
        }
    }

    /// Canonical file name of the index over `cols` of `table`
    pub fn index_name(table: &str, cols: &[&str]) -> String {
        let mut name = String::from(table);
        for col in cols {
            name.push('_');
            name.push_str(col);
        }
        name.push_str(".idx");
        name
    }

    /// Create an index file: a header page plus an empty leaf root
    pub fn create_index(
        &self,
        path: impl AsRef<Path>,
        col_types: Vec<ColType>,
        col_lens: Vec<u16>,
    ) -> Result<(), BTreeError> {
        let path = path.as_ref();
        let schema = KeySchema::new(col_types, col_lens)?;

        match self.disk_manager.create_file(path) {
            Err(DiskManagerError::FileExists(p)) => return Err(BTreeError::IndexExists(p)),
            other => other?,
        }
        let file_id = self.disk_manager.open_file(path)?;

        let (hdr_page, hdr_page_id) = self.buffer_pool.new_page(file_id)?;
        debug_assert_eq!(hdr_page_id.page_no, FILE_HDR_PAGE_NO);

        let (root_page, root_page_id) = self.buffer_pool.new_page(file_id)?;
        let root_no = root_page_id.page_no;
        {
            let mut guard = root_page.write();
            NodeMut::new(&mut guard, &schema).init(true, INVALID_PAGE_NO);
        }
        self.buffer_pool.unpin_page(root_page_id, true)?;

        let hdr = IxFileHdr {
            root_page_no: root_no,
            num_pages: 2,
            first_leaf: root_no,
            last_leaf: root_no,
            col_types: schema.col_types.clone(),
            col_lens: schema.col_lens.clone(),
            key_len: schema.key_len as u16,
            max_keys: schema.max_keys as u16,
        };
        let result = hdr.write_to(&mut hdr_page.write().data);
        self.buffer_pool.unpin_page(hdr_page_id, result.is_ok())?;
        result?;

        self.buffer_pool.flush_all_pages(file_id)?;
        self.disk_manager.close_file(file_id)?;
        Ok(())
    }

    /// Open an index file and hand back its tree handle
    pub fn open_index(&self, path: impl AsRef<Path>) -> Result<Arc<IxIndexHandle>, BTreeError> {
        let path = path.as_ref();
        let file_id = match self.disk_manager.open_file(path) {
            Err(DiskManagerError::FileNotFound(p)) => return Err(BTreeError::IndexNotFound(p)),
            other => other?,
        };

        let hdr_page = self
            .buffer_pool
            .fetch_page(PageId::new(file_id, FILE_HDR_PAGE_NO))?;
        let hdr = IxFileHdr::read_from(&hdr_page.read().data);
        self.buffer_pool
            .unpin_page(PageId::new(file_id, FILE_HDR_PAGE_NO), false)?;
        let hdr = hdr?;

        self.disk_manager.set_page_count(file_id, hdr.num_pages)?;
        Ok(Arc::new(IxIndexHandle::new(
            self.buffer_pool.clone(),
            file_id,
            hdr,
        )?))
    }

    /// Flush and close an open index
    pub fn close_index(&self, handle: &IxIndexHandle) -> Result<(), BTreeError> {
        handle.flush()?;
        self.disk_manager.close_file(handle.file_id())?;
        Ok(())
    }

    /// Remove an index file from disk; it must be closed.
    pub fn destroy_index(&self, path: impl AsRef<Path>) -> Result<(), BTreeError> {
        let path = path.as_ref();
        match self.disk_manager.destroy_file(path) {
            Err(DiskManagerError::FileNotFound(p)) => Err(BTreeError::IndexNotFound(p)),
            other => Ok(other?),
        }
    }
}
