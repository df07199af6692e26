use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::{FileId, PageId, PageNo, Rid, FILE_HDR_PAGE_NO, INVALID_PAGE_NO};
use crate::record::error::RecordError;
use crate::record::page::{RmFileHdr, RmPageView};
use crate::storage::buffer::BufferPoolManager;

/// Handle to an open heap file of fixed-size records.
///
/// Records are addressed by `Rid`; pages with free slots are threaded
/// on a singly-linked free list headed in the file header. A page that
/// fills up while it is not at the head stays on the list and is
/// skipped (and unlinked) when the insert path reaches it.
pub struct RmFileHandle {
    buffer_pool: Arc<BufferPoolManager>,
    file_id: FileId,
    hdr: RwLock<RmFileHdr>,
}

impl RmFileHandle {
    pub fn new(buffer_pool: Arc<BufferPoolManager>, file_id: FileId, hdr: RmFileHdr) -> Self {
        Self {
            buffer_pool,
            file_id,
            hdr: RwLock::new(hdr),
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn record_size(&self) -> usize {
        self.hdr.read().record_size as usize
    }

    pub fn records_per_page(&self) -> u32 {
        self.hdr.read().records_per_page
    }

    pub fn num_pages(&self) -> PageNo {
        self.hdr.read().num_pages
    }

    /// Copy of the record at `rid`
    pub fn get_record(&self, rid: Rid) -> Result<Vec<u8>, RecordError> {
        let hdr = self.hdr.read();
        self.check_rid(&hdr, rid)?;

        let page = self.fetch(rid.page_no)?;
        let mut guard = page.write();
        let view = RmPageView::new(&mut guard.data, &hdr);
        if !view.slot_occupied(rid.slot_no) {
            drop(guard);
            self.unpin(rid.page_no, false)?;
            return Err(RecordError::RecordNotFound(rid));
        }
        let record = view.record(rid.slot_no).to_vec();
        drop(guard);
        self.unpin(rid.page_no, false)?;
        Ok(record)
    }

    /// Insert a record into the first free slot, extending the file
    /// with a fresh page when no slot is free.
    pub fn insert_record(&self, buf: &[u8]) -> Result<Rid, RecordError> {
        let mut hdr = self.hdr.write();
        self.check_size(&hdr, buf)?;

        loop {
            let page_no = hdr.first_free_page_no;
            if page_no == INVALID_PAGE_NO {
                self.create_page(&mut hdr)?;
                continue;
            }

            let page = self.fetch(page_no)?;
            let mut guard = page.write();
            let mut view = RmPageView::new(&mut guard.data, &hdr);

            let slot_no = match view.first_free_slot() {
                Some(slot_no) => slot_no,
                None => {
                    // Stale head: filled elsewhere, unlink and move on
                    hdr.first_free_page_no = view.next_free_page_no();
                    view.set_on_free_list(false);
                    drop(guard);
                    self.unpin(page_no, true)?;
                    self.write_hdr(&hdr)?;
                    continue;
                }
            };

            view.set_slot(slot_no, true);
            view.write_record(slot_no, buf);
            view.set_num_records(view.num_records() + 1);

            let became_full = view.is_full();
            if became_full {
                hdr.first_free_page_no = view.next_free_page_no();
                view.set_on_free_list(false);
            }
            drop(guard);
            self.unpin(page_no, true)?;
            if became_full {
                self.write_hdr(&hdr)?;
            }
            return Ok(Rid::new(page_no, slot_no));
        }
    }

    /// Reinstall a record at an exact `Rid`, e.g. when a deletion is
    /// rolled back. The slot must be empty.
    pub fn insert_record_at(&self, rid: Rid, buf: &[u8]) -> Result<(), RecordError> {
        let hdr = self.hdr.read();
        self.check_rid(&hdr, rid)?;
        self.check_size(&hdr, buf)?;

        let page = self.fetch(rid.page_no)?;
        let mut guard = page.write();
        let mut view = RmPageView::new(&mut guard.data, &hdr);
        if view.slot_occupied(rid.slot_no) {
            drop(guard);
            self.unpin(rid.page_no, false)?;
            return Err(RecordError::SlotOccupied(rid));
        }
        view.set_slot(rid.slot_no, true);
        view.write_record(rid.slot_no, buf);
        view.set_num_records(view.num_records() + 1);
        drop(guard);
        self.unpin(rid.page_no, true)?;
        Ok(())
    }

    /// Remove the record at `rid`
    pub fn delete_record(&self, rid: Rid) -> Result<(), RecordError> {
        let mut hdr = self.hdr.write();
        self.check_rid(&hdr, rid)?;

        let page = self.fetch(rid.page_no)?;
        let mut guard = page.write();
        let mut view = RmPageView::new(&mut guard.data, &hdr);
        if !view.slot_occupied(rid.slot_no) {
            drop(guard);
            self.unpin(rid.page_no, false)?;
            return Err(RecordError::RecordNotFound(rid));
        }
        view.set_slot(rid.slot_no, false);
        view.set_num_records(view.num_records() - 1);

        // A page gaining its first free slot rejoins the free list
        let relink = !view.on_free_list();
        if relink {
            view.set_next_free_page_no(hdr.first_free_page_no);
            view.set_on_free_list(true);
            hdr.first_free_page_no = rid.page_no;
        }
        drop(guard);
        self.unpin(rid.page_no, true)?;
        if relink {
            self.write_hdr(&hdr)?;
        }
        Ok(())
    }

    /// Overwrite the record at `rid`
    pub fn update_record(&self, rid: Rid, buf: &[u8]) -> Result<(), RecordError> {
        let hdr = self.hdr.read();
        self.check_rid(&hdr, rid)?;
        self.check_size(&hdr, buf)?;

        let page = self.fetch(rid.page_no)?;
        let mut guard = page.write();
        let mut view = RmPageView::new(&mut guard.data, &hdr);
        if !view.slot_occupied(rid.slot_no) {
            drop(guard);
            self.unpin(rid.page_no, false)?;
            return Err(RecordError::RecordNotFound(rid));
        }
        view.write_record(rid.slot_no, buf);
        drop(guard);
        self.unpin(rid.page_no, true)?;
        Ok(())
    }

    /// Occupied slots at or after `from` on the given page, for scans
    pub(crate) fn next_occupied_on_page(
        &self,
        page_no: PageNo,
        from: u32,
    ) -> Result<Option<u32>, RecordError> {
        let hdr = self.hdr.read();
        let page = self.fetch(page_no)?;
        let mut guard = page.write();
        let view = RmPageView::new(&mut guard.data, &hdr);
        let slot = view.next_occupied_slot(from);
        drop(guard);
        self.unpin(page_no, false)?;
        Ok(slot)
    }

    /// Flush the header and all resident pages of this file
    pub fn flush(&self) -> Result<(), RecordError> {
        let hdr = self.hdr.read();
        self.write_hdr(&hdr)?;
        self.buffer_pool.flush_all_pages(self.file_id)?;
        Ok(())
    }

    fn create_page(&self, hdr: &mut RmFileHdr) -> Result<(), RecordError> {
        let (page, page_id) = self.buffer_pool.new_page(self.file_id)?;
        {
            let mut guard = page.write();
            let mut view = RmPageView::new(&mut guard.data, hdr);
            view.init(hdr.first_free_page_no);
        }
        self.unpin(page_id.page_no, true)?;
        hdr.first_free_page_no = page_id.page_no;
        hdr.num_pages += 1;
        self.write_hdr(hdr)?;
        Ok(())
    }

    fn write_hdr(&self, hdr: &RmFileHdr) -> Result<(), RecordError> {
        let page = self.fetch(FILE_HDR_PAGE_NO)?;
        hdr.write_to(&mut page.write().data);
        self.unpin(FILE_HDR_PAGE_NO, true)?;
        Ok(())
    }

    fn check_rid(&self, hdr: &RmFileHdr, rid: Rid) -> Result<(), RecordError> {
        if rid.page_no == FILE_HDR_PAGE_NO
            || rid.page_no >= hdr.num_pages
            || rid.slot_no >= hdr.records_per_page
        {
            return Err(RecordError::RecordNotFound(rid));
        }
        Ok(())
    }

    fn check_size(&self, hdr: &RmFileHdr, buf: &[u8]) -> Result<(), RecordError> {
        if buf.len() != hdr.record_size as usize {
            return Err(RecordError::RecordSizeMismatch {
                expected: hdr.record_size as usize,
                got: buf.len(),
            });
        }
        Ok(())
    }

    fn fetch(&self, page_no: PageNo) -> Result<crate::common::types::PagePtr, RecordError> {
        Ok(self
            .buffer_pool
            .fetch_page(PageId::new(self.file_id, page_no))?)
    }

    fn unpin(&self, page_no: PageNo, dirty: bool) -> Result<(), RecordError> {
        self.buffer_pool
            .unpin_page(PageId::new(self.file_id, page_no), dirty)?;
        Ok(())
    }
}
