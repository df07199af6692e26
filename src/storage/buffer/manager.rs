use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::common::types::{FileId, Frame, FrameId, FramePtr, Page, PageId, PagePtr};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::ClockReplacer;
use crate::storage::disk::DiskManager;

struct PoolInner {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
}

/// BufferPoolManager caches pages in a fixed number of frames, pinning
/// them on behalf of callers and writing dirty pages back on eviction.
///
/// A single pool-wide mutex serializes the page table and free list for
/// the duration of each public method; page content is reached through
/// the per-page latch once a pin is held.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<FramePtr>,
    inner: Mutex<PoolInner>,
    replacer: ClockReplacer,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for frame_id in 0..pool_size {
            let page = Arc::new(RwLock::new(Page::new(PageId::INVALID)));
            frames.push(Arc::new(RwLock::new(Frame::new(frame_id, page))));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: ClockReplacer::new(pool_size),
            disk_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    /// Fetch a page, reading it from disk on a miss. The returned page
    /// is pinned; every fetch must be paired with an `unpin_page`.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        let mut inner = self.inner.lock();

        // Hit: bump the pin count and shield the frame from eviction
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.frames[frame_id];
            {
                let mut frame_guard = frame.write();
                frame_guard.pin_count += 1;
            }
            self.replacer.pin(frame_id);
            return Ok(frame.read().page.clone());
        }

        // Miss: claim a frame, then fill it from disk
        let frame_id = self.allocate_frame(&mut inner)?;
        let frame = &self.frames[frame_id];
        {
            let mut frame_guard = frame.write();
            let mut page_guard = frame_guard.page.write();
            page_guard.reset(page_id);
            self.disk_manager
                .read_page(page_id.file_id, page_id.page_no, &mut page_guard.data)?;
            drop(page_guard);
            frame_guard.pin_count = 1;
            frame_guard.is_dirty = false;
        }

        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok(frame.read().page.clone())
    }

    /// Allocate a fresh page in the file and pin it in a frame
    pub fn new_page(&self, file_id: FileId) -> Result<(PagePtr, PageId), BufferPoolError> {
        let mut inner = self.inner.lock();

        let page_no = self.disk_manager.allocate_page(file_id)?;
        let page_id = PageId::new(file_id, page_no);

        let frame_id = self.allocate_frame(&mut inner)?;
        let frame = &self.frames[frame_id];
        {
            let mut frame_guard = frame.write();
            frame_guard.page.write().reset(page_id);
            frame_guard.pin_count = 1;
            frame_guard.is_dirty = true;
        }

        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok((frame.read().page.clone(), page_id))
    }

    /// Drop one pin on a page. Returns `Ok(false)` if the page held no
    /// pins. A true `is_dirty` latches the dirty flag on; unpinning
    /// never clears it.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool, BufferPoolError> {
        let inner = self.inner.lock();
        let frame_id = *inner
            .page_table
            .get(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        let frame = &self.frames[frame_id];
        let mut frame_guard = frame.write();
        if frame_guard.pin_count == 0 {
            return Ok(false);
        }
        frame_guard.pin_count -= 1;
        if is_dirty {
            frame_guard.is_dirty = true;
        }
        let now_unpinned = frame_guard.pin_count == 0;
        drop(frame_guard);

        if now_unpinned {
            self.replacer.unpin(frame_id);
        }
        Ok(true)
    }

    /// Write a page back to disk, clearing its dirty flag
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let inner = self.inner.lock();
        let frame_id = *inner
            .page_table
            .get(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;
        self.flush_frame(frame_id)
    }

    /// Write every resident page of a file back to disk
    pub fn flush_all_pages(&self, file_id: FileId) -> Result<(), BufferPoolError> {
        let inner = self.inner.lock();
        let frame_ids: Vec<FrameId> = inner
            .page_table
            .iter()
            .filter(|(page_id, _)| page_id.file_id == file_id)
            .map(|(_, &frame_id)| frame_id)
            .collect();
        for frame_id in frame_ids {
            self.flush_frame(frame_id)?;
        }
        Ok(())
    }

    /// Evict a page from the pool. Fails if the page is pinned; the
    /// frame returns to the free list without touching the disk copy.
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(()),
        };

        let frame = &self.frames[frame_id];
        {
            let mut frame_guard = frame.write();
            if frame_guard.pin_count > 0 {
                return Err(BufferPoolError::PagePinned(page_id));
            }
            frame_guard.page.write().reset(PageId::INVALID);
            frame_guard.is_dirty = false;
        }

        inner.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        inner.free_list.push_back(frame_id);
        Ok(())
    }

    /// Claim a frame for a new occupant: free list first, then a CLOCK
    /// victim. Dirty victims are written back before reuse.
    fn allocate_frame(&self, inner: &mut PoolInner) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(BufferPoolError::BufferPoolFull)?;
        let frame = &self.frames[frame_id];

        let (old_page_id, dirty) = {
            let frame_guard = frame.read();
            let result = (frame_guard.page.read().id, frame_guard.is_dirty);
            result
        };

        if dirty {
            debug!("evicting dirty page {} from frame {}", old_page_id, frame_id);
            let frame_guard = frame.read();
            let page_guard = frame_guard.page.read();
            self.disk_manager
                .write_page(old_page_id.file_id, old_page_id.page_no, &page_guard.data)?;
            drop(page_guard);
            drop(frame_guard);
            frame.write().is_dirty = false;
        }

        if old_page_id.is_valid() {
            inner.page_table.remove(&old_page_id);
        }
        Ok(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId) -> Result<(), BufferPoolError> {
        let frame = &self.frames[frame_id];
        let needs_flush = frame.read().is_dirty;
        if !needs_flush {
            return Ok(());
        }

        {
            let frame_guard = frame.read();
            let page_guard = frame_guard.page.read();
            let page_id = page_guard.id;
            self.disk_manager
                .write_page(page_id.file_id, page_id.page_no, &page_guard.data)?;
        }
        frame.write().is_dirty = false;
        Ok(())
    }
}
