use crate::common::types::{PageNo, Rid};
use crate::record::error::RecordError;
use crate::record::file_handle::RmFileHandle;

/// Scan over every record of a heap file in physical order: page by
/// page, slot by slot.
pub struct RmScan<'a> {
    handle: &'a RmFileHandle,
    page_no: PageNo,
    slot_no: u32,
}

impl<'a> RmScan<'a> {
    pub fn new(handle: &'a RmFileHandle) -> Self {
        Self {
            handle,
            page_no: 1,
            slot_no: 0,
        }
    }
}

impl<'a> Iterator for RmScan<'a> {
    type Item = Result<Rid, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.page_no < self.handle.num_pages() {
            match self.handle.next_occupied_on_page(self.page_no, self.slot_no) {
                Ok(Some(slot_no)) => {
                    let rid = Rid::new(self.page_no, slot_no);
                    self.slot_no = slot_no + 1;
                    return Some(Ok(rid));
                }
                Ok(None) => {
                    self.page_no += 1;
                    self.slot_no = 0;
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
