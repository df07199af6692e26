use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use larchdb::index::btree::ColType;
use larchdb::index::IndexManager;
use larchdb::{BufferPoolManager, DiskManager, IxIndexHandle};

// Create a disk manager and buffer pool backed by a temporary directory
#[allow(dead_code)]
pub fn create_test_env(pool_size: usize) -> Result<(Arc<DiskManager>, Arc<BufferPoolManager>, TempDir)> {
    let dir = TempDir::new()?;
    let disk_manager = Arc::new(DiskManager::new());
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, disk_manager.clone()));
    Ok((disk_manager, buffer_pool, dir))
}

// Create and open a single-column integer index
#[allow(dead_code)]
pub fn create_int_index(
    disk_manager: &Arc<DiskManager>,
    buffer_pool: &Arc<BufferPoolManager>,
    dir: &TempDir,
) -> Result<(IndexManager, Arc<IxIndexHandle>, PathBuf)> {
    let ix_manager = IndexManager::new(disk_manager.clone(), buffer_pool.clone());
    let path = dir.path().join(IndexManager::index_name("t", &["id"]));
    ix_manager.create_index(&path, vec![ColType::Int], vec![4])?;
    let handle = ix_manager.open_index(&path)?;
    Ok((ix_manager, handle, path))
}

// Create and open an index over one wide string column. The wide key
// keeps node capacity small, so modest workloads exercise splits and
// merges through several tree levels.
#[allow(dead_code)]
pub fn create_chars_index(
    disk_manager: &Arc<DiskManager>,
    buffer_pool: &Arc<BufferPoolManager>,
    dir: &TempDir,
    col_len: u16,
) -> Result<(IndexManager, Arc<IxIndexHandle>, PathBuf)> {
    let ix_manager = IndexManager::new(disk_manager.clone(), buffer_pool.clone());
    let path = dir.path().join(IndexManager::index_name("t", &["name"]));
    ix_manager.create_index(&path, vec![ColType::Chars], vec![col_len])?;
    let handle = ix_manager.open_index(&path)?;
    Ok((ix_manager, handle, path))
}

#[allow(dead_code)]
pub fn int_key(v: i32) -> [u8; 4] {
    v.to_le_bytes()
}

// Zero-padded decimal rendering, so byte order matches numeric order
#[allow(dead_code)]
pub fn chars_key(v: u32, len: usize) -> Vec<u8> {
    let mut key = format!("{v:012}").into_bytes();
    key.resize(len, 0);
    key
}
