use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::common::types::{FileId, PageNo, PAGE_SIZE};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("file already exists: {0}")]
    FileExists(PathBuf),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("file is open and must be closed first: {0}")]
    FileNotClosed(PathBuf),

    #[error("invalid file id: {0}")]
    InvalidFileId(FileId),
}

struct FileEntry {
    path: PathBuf,
    file: Mutex<File>,
    /// Next page number to hand out for this file; seeded from file length
    /// on open, so allocation stays monotonic across reopens.
    next_page_no: AtomicU32,
}

/// DiskManager is responsible for raw page I/O over a set of open files.
///
/// Every file is a sequence of fixed-size pages beginning with a header
/// page at page number 0; the layers above decide what the header holds.
pub struct DiskManager {
    files: RwLock<HashMap<FileId, Arc<FileEntry>>>,
    open_paths: RwLock<HashMap<PathBuf, FileId>>,
    next_file_id: AtomicU32,
}

impl DiskManager {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            open_paths: RwLock::new(HashMap::new()),
            next_file_id: AtomicU32::new(0),
        }
    }

    /// Create a new, empty database file
    pub fn create_file(&self, path: impl AsRef<Path>) -> Result<(), DiskManagerError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(DiskManagerError::FileExists(path.to_path_buf()));
        }
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(())
    }

    /// Remove a file from disk; the file must not be open.
    pub fn destroy_file(&self, path: impl AsRef<Path>) -> Result<(), DiskManagerError> {
        let path = path.as_ref();
        if self.open_paths.read().contains_key(path) {
            return Err(DiskManagerError::FileNotClosed(path.to_path_buf()));
        }
        if !path.exists() {
            return Err(DiskManagerError::FileNotFound(path.to_path_buf()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Open an existing file and return its id
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<FileId, DiskManagerError> {
        let path = path.as_ref();
        if self.open_paths.read().contains_key(path) {
            return Err(DiskManagerError::FileNotClosed(path.to_path_buf()));
        }
        if !path.exists() {
            return Err(DiskManagerError::FileNotFound(path.to_path_buf()));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let next_page_no = (len / PAGE_SIZE as u64) as PageNo;

        let file_id = self.next_file_id.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(FileEntry {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            next_page_no: AtomicU32::new(next_page_no),
        });

        self.files.write().insert(file_id, entry);
        self.open_paths.write().insert(path.to_path_buf(), file_id);
        Ok(file_id)
    }

    /// Close an open file
    pub fn close_file(&self, file_id: FileId) -> Result<(), DiskManagerError> {
        let entry = self
            .files
            .write()
            .remove(&file_id)
            .ok_or(DiskManagerError::InvalidFileId(file_id))?;
        self.open_paths.write().remove(&entry.path);
        entry.file.lock().flush()?;
        Ok(())
    }

    pub fn is_open(&self, path: impl AsRef<Path>) -> bool {
        self.open_paths.read().contains_key(path.as_ref())
    }

    /// Read a page from disk into `buf`.
    ///
    /// Reading past the end of the file yields a zeroed page, so freshly
    /// allocated pages can be fetched before their first write-back.
    pub fn read_page(
        &self,
        file_id: FileId,
        page_no: PageNo,
        buf: &mut [u8; PAGE_SIZE],
    ) -> Result<(), DiskManagerError> {
        let entry = self.entry(file_id)?;
        let offset = page_no as u64 * PAGE_SIZE as u64;

        let mut file = entry.file.lock();
        let file_size = file.metadata()?.len();
        if offset >= file_size {
            buf.fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Write a page to disk
    pub fn write_page(
        &self,
        file_id: FileId,
        page_no: PageNo,
        buf: &[u8; PAGE_SIZE],
    ) -> Result<(), DiskManagerError> {
        let entry = self.entry(file_id)?;
        let offset = page_no as u64 * PAGE_SIZE as u64;

        let mut file = entry.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        file.flush()?;
        Ok(())
    }

    /// Allocate a new page number for the file and extend it with zeros
    pub fn allocate_page(&self, file_id: FileId) -> Result<PageNo, DiskManagerError> {
        let entry = self.entry(file_id)?;
        let page_no = entry.next_page_no.fetch_add(1, Ordering::SeqCst);

        let mut file = entry.file.lock();
        file.seek(SeekFrom::Start(page_no as u64 * PAGE_SIZE as u64))?;
        file.write_all(&[0u8; PAGE_SIZE])?;
        Ok(page_no)
    }

    /// Number of pages allocated in the file so far
    pub fn page_count(&self, file_id: FileId) -> Result<PageNo, DiskManagerError> {
        Ok(self.entry(file_id)?.next_page_no.load(Ordering::SeqCst))
    }

    /// Override the allocation cursor, e.g. from a file header that
    /// records fewer pages than the physical file holds.
    pub fn set_page_count(&self, file_id: FileId, count: PageNo) -> Result<(), DiskManagerError> {
        self.entry(file_id)?
            .next_page_no
            .store(count, Ordering::SeqCst);
        Ok(())
    }

    fn entry(&self, file_id: FileId) -> Result<Arc<FileEntry>, DiskManagerError> {
        self.files
            .read()
            .get(&file_id)
            .cloned()
            .ok_or(DiskManagerError::InvalidFileId(file_id))
    }
}

impl Default for DiskManager {
    fn default() -> Self {
        Self::new()
    }
}
