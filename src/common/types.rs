use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Page number within a single file
pub type PageNo = u32;

/// Identifier for an open file, issued by the disk manager
pub type FileId = u32;

/// Buffer pool frame index
pub type FrameId = usize;

/// Transaction ID type
pub type TxnId = u32;

/// Sentinel for "no page"
pub const INVALID_PAGE_NO: PageNo = u32::MAX;

/// Page number of the per-file header page
pub const FILE_HDR_PAGE_NO: PageNo = 0;

/// Identity of a page across all open files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub file_id: FileId,
    pub page_no: PageNo,
}

impl PageId {
    pub const INVALID: PageId = PageId {
        file_id: u32::MAX,
        page_no: INVALID_PAGE_NO,
    };

    pub fn new(file_id: FileId, page_no: PageNo) -> Self {
        Self { file_id, page_no }
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.file_id, self.page_no)
    }
}

/// Record identifier: the physical address of a tuple inside a heap file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_no: PageNo,
    pub slot_no: u32,
}

impl Rid {
    pub const INVALID: Rid = Rid {
        page_no: INVALID_PAGE_NO,
        slot_no: u32::MAX,
    };

    pub fn new(page_no: PageNo, slot_no: u32) -> Self {
        Self { page_no, slot_no }
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_no, self.slot_no)
    }
}

/// Position inside the B+ tree leaf sequence, used by range scans.
///
/// The end-of-scan sentinel points at the header page with the maximum
/// slot number; iterators compare against `Iid::END` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Iid {
    pub page_no: PageNo,
    pub slot_no: u32,
}

impl Iid {
    pub const END: Iid = Iid {
        page_no: FILE_HDR_PAGE_NO,
        slot_no: u32::MAX,
    };

    pub fn new(page_no: PageNo, slot_no: u32) -> Self {
        Self { page_no, slot_no }
    }
}

/// Page structure: a fixed-size byte buffer plus its identity.
///
/// Content is owned by the buffer pool and reassigned across misses.
#[derive(Clone)]
pub struct Page {
    pub data: [u8; PAGE_SIZE],
    pub id: PageId,
}

impl Page {
    pub fn new(id: PageId) -> Self {
        Self {
            data: [0; PAGE_SIZE],
            id,
        }
    }

    pub fn reset(&mut self, id: PageId) {
        self.data.fill(0);
        self.id = id;
    }
}

/// Smart pointer to a page
pub type PagePtr = Arc<RwLock<Page>>;

/// Buffer pool frame structure
pub struct Frame {
    pub page: PagePtr,
    pub frame_id: FrameId,
    pub is_dirty: bool,
    pub pin_count: u32,
}

impl Frame {
    pub fn new(frame_id: FrameId, page: PagePtr) -> Self {
        Self {
            page,
            frame_id,
            is_dirty: false,
            pin_count: 0,
        }
    }
}

/// Smart pointer to a frame
pub type FramePtr = Arc<RwLock<Frame>>;
