use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::{PageId, FILE_HDR_PAGE_NO};
use crate::record::error::RecordError;
use crate::record::file_handle::RmFileHandle;
use crate::record::page::RmFileHdr;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::disk::DiskManager;

/// RecordManager owns the lifecycle of heap files and the registry of
/// open tables (name to handle) that transaction rollback resolves
/// records through.
pub struct RecordManager {
    disk_manager: Arc<DiskManager>,
    buffer_pool: Arc<BufferPoolManager>,
    tables: RwLock<HashMap<String, Arc<RmFileHandle>>>,
}

impl RecordManager {
    pub fn new(disk_manager: Arc<DiskManager>, buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            disk_manager,
            buffer_pool,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Create a heap file for fixed-size records
    pub fn create_file(
        &self,
        path: impl AsRef<Path>,
        record_size: usize,
    ) -> Result<(), RecordError> {
        let path = path.as_ref();
        self.disk_manager.create_file(path)?;
        let file_id = self.disk_manager.open_file(path)?;

        let hdr = RmFileHdr::new(record_size as u32);
        let (page, page_id) = self.buffer_pool.new_page(file_id)?;
        debug_assert_eq!(page_id.page_no, FILE_HDR_PAGE_NO);
        hdr.write_to(&mut page.write().data);
        self.buffer_pool.unpin_page(page_id, true)?;
        self.buffer_pool.flush_page(page_id)?;
        self.disk_manager.close_file(file_id)?;
        Ok(())
    }

    /// Open a heap file and register it under `name`. Reopening a name
    /// returns the existing handle.
    pub fn open_file(
        &self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<Arc<RmFileHandle>, RecordError> {
        if let Some(handle) = self.tables.read().get(name) {
            return Ok(handle.clone());
        }

        let file_id = self.disk_manager.open_file(path)?;
        let hdr_page = self
            .buffer_pool
            .fetch_page(PageId::new(file_id, FILE_HDR_PAGE_NO))?;
        let hdr = RmFileHdr::read_from(&hdr_page.read().data);
        self.buffer_pool
            .unpin_page(PageId::new(file_id, FILE_HDR_PAGE_NO), false)?;

        let handle = Arc::new(RmFileHandle::new(self.buffer_pool.clone(), file_id, hdr));
        self.tables.write().insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    /// Flush and close an open heap file
    pub fn close_file(&self, name: &str) -> Result<(), RecordError> {
        let handle = self
            .tables
            .write()
            .remove(name)
            .ok_or_else(|| RecordError::TableNotOpen(name.to_string()))?;
        handle.flush()?;
        self.disk_manager.close_file(handle.file_id())?;
        Ok(())
    }

    /// Remove a heap file from disk; it must be closed.
    pub fn destroy_file(&self, path: impl AsRef<Path>) -> Result<(), RecordError> {
        self.disk_manager.destroy_file(path)?;
        Ok(())
    }

    /// Handle of an open table, e.g. for rollback
    pub fn handle(&self, name: &str) -> Option<Arc<RmFileHandle>> {
        self.tables.read().get(name).cloned()
    }
}
