use anyhow::Result;
use rand::prelude::*;

use larchdb::index::btree::BTreeError;
use larchdb::index::IndexManager;
use larchdb::{IxScan, Rid};

mod common;
use common::{chars_key, create_chars_index, create_int_index, create_test_env, int_key};

#[test]
fn test_create_and_reopen() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let (ix_manager, handle, path) = create_int_index(&disk_manager, &buffer_pool, &dir)?;

    handle.insert_entry(&int_key(1), Rid::new(1, 0))?;
    ix_manager.close_index(&handle)?;

    let handle = ix_manager.open_index(&path)?;
    assert_eq!(handle.get_value(&int_key(1))?, Some(Rid::new(1, 0)));
    Ok(())
}

#[test]
fn test_create_twice_fails() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let (ix_manager, _handle, path) = create_int_index(&disk_manager, &buffer_pool, &dir)?;
    let result = ix_manager.create_index(
        &path,
        vec![larchdb::index::btree::ColType::Int],
        vec![4],
    );
    assert!(matches!(result, Err(BTreeError::IndexExists(_))));
    Ok(())
}

#[test]
fn test_insert_and_probe() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let (_ix_manager, handle, _path) = create_int_index(&disk_manager, &buffer_pool, &dir)?;

    let pairs = [(5, 1005), (3, 1003), (8, 1008), (2, 1002), (7, 1007)];
    for &(key, slot) in &pairs {
        assert!(handle.insert_entry(&int_key(key), Rid::new(1, slot))?);
    }
    for &(key, slot) in &pairs {
        assert_eq!(handle.get_value(&int_key(key))?, Some(Rid::new(1, slot)));
    }
    assert_eq!(handle.get_value(&int_key(100))?, None);
    Ok(())
}

#[test]
fn test_duplicate_insert_is_refused() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let (_ix_manager, handle, _path) = create_int_index(&disk_manager, &buffer_pool, &dir)?;

    assert!(handle.insert_entry(&int_key(1), Rid::new(1, 10))?);
    assert!(!handle.insert_entry(&int_key(1), Rid::new(9, 99))?);
    // The original mapping is untouched
    assert_eq!(handle.get_value(&int_key(1))?, Some(Rid::new(1, 10)));
    Ok(())
}

#[test]
fn test_delete_and_miss() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let (_ix_manager, handle, _path) = create_int_index(&disk_manager, &buffer_pool, &dir)?;

    for v in 1..=10 {
        handle.insert_entry(&int_key(v), Rid::new(1, v as u32))?;
    }
    handle.delete_entry(&int_key(5))?;
    assert_eq!(handle.get_value(&int_key(5))?, None);
    assert!(matches!(
        handle.delete_entry(&int_key(5)),
        Err(BTreeError::EntryNotFound)
    ));
    assert_eq!(handle.get_value(&int_key(6))?, Some(Rid::new(1, 6)));
    Ok(())
}

#[test]
fn test_invalid_key_length() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let (_ix_manager, handle, _path) = create_int_index(&disk_manager, &buffer_pool, &dir)?;

    let result = handle.insert_entry(b"toolongkey", Rid::new(1, 0));
    assert!(matches!(
        result,
        Err(BTreeError::InvalidKeyLength { expected: 4, .. })
    ));
    Ok(())
}

#[test]
fn test_range_scan_in_key_order() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let (_ix_manager, handle, _path) = create_int_index(&disk_manager, &buffer_pool, &dir)?;

    let mut keys: Vec<i32> = (1..=20).collect();
    keys.shuffle(&mut rand::thread_rng());
    for &v in &keys {
        handle.insert_entry(&int_key(v), Rid::new(1, v as u32))?;
    }

    // [5, 10] inclusive: lower_bound(5) .. upper_bound(10)
    let lower = handle.lower_bound(&int_key(5))?;
    let upper = handle.upper_bound(&int_key(10))?;
    let mut scan = IxScan::new(&handle, lower, upper);
    let mut slots = Vec::new();
    while !scan.is_end() {
        slots.push(scan.rid()?.slot_no);
        scan.next()?;
    }
    assert_eq!(slots, vec![5, 6, 7, 8, 9, 10]);

    // An empty range yields nothing
    let lower = handle.lower_bound(&int_key(100))?;
    let upper = handle.upper_bound(&int_key(200))?;
    let scan = IxScan::new(&handle, lower, upper);
    assert!(scan.is_end());
    Ok(())
}

#[test]
fn test_full_scan_is_sorted_across_splits() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(64)?;
    let (_ix_manager, handle, _path) =
        create_chars_index(&disk_manager, &buffer_pool, &dir, 120)?;

    let mut keys: Vec<u32> = (1..=1000).collect();
    keys.shuffle(&mut rand::thread_rng());
    for &v in &keys {
        assert!(handle.insert_entry(&chars_key(v, 120), Rid::new(1, v))?);
    }

    let mut scan = IxScan::new(&handle, handle.leaf_begin()?, handle.leaf_end());
    let mut seen = Vec::new();
    while !scan.is_end() {
        seen.push(scan.rid()?.slot_no);
        scan.next()?;
    }
    let expected: Vec<u32> = (1..=1000).collect();
    assert_eq!(seen, expected);
    Ok(())
}

#[test]
fn test_split_merge_stress_collapses_to_empty_root() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(64)?;
    let (_ix_manager, handle, _path) =
        create_chars_index(&disk_manager, &buffer_pool, &dir, 120)?;

    let mut rng = rand::thread_rng();
    let mut keys: Vec<u32> = (1..=1000).collect();
    keys.shuffle(&mut rng);
    for &v in &keys {
        handle.insert_entry(&chars_key(v, 120), Rid::new(1, v))?;
    }

    // Delete in reverse of insertion order, spot-checking along the way
    for (i, &v) in keys.iter().rev().enumerate() {
        handle.delete_entry(&chars_key(v, 120))?;
        if i % 200 == 0 {
            assert_eq!(handle.get_value(&chars_key(v, 120))?, None);
        }
    }

    // The tree is a single empty leaf root again
    assert_eq!(handle.leaf_begin()?, handle.leaf_end());
    for v in [1u32, 500, 1000] {
        assert_eq!(handle.get_value(&chars_key(v, 120))?, None);
    }

    // And it still accepts inserts
    assert!(handle.insert_entry(&chars_key(77, 120), Rid::new(1, 77))?);
    assert_eq!(
        handle.get_value(&chars_key(77, 120))?,
        Some(Rid::new(1, 77))
    );
    Ok(())
}

#[test]
fn test_random_round_trip() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(64)?;
    let (_ix_manager, handle, _path) =
        create_chars_index(&disk_manager, &buffer_pool, &dir, 200)?;

    let mut rng = rand::thread_rng();
    let mut keys: Vec<u32> = (0..400).map(|i| i * 3 + 1).collect();
    keys.shuffle(&mut rng);
    for &v in &keys {
        handle.insert_entry(&chars_key(v, 200), Rid::new(2, v))?;
    }

    // Delete in an independent random order
    keys.shuffle(&mut rng);
    for &v in &keys {
        handle.delete_entry(&chars_key(v, 200))?;
    }
    assert_eq!(handle.leaf_begin()?, handle.leaf_end());
    Ok(())
}

#[test]
fn test_destroy_index() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let (ix_manager, handle, path) = create_int_index(&disk_manager, &buffer_pool, &dir)?;

    ix_manager.close_index(&handle)?;
    ix_manager.destroy_index(&path)?;
    assert!(matches!(
        ix_manager.open_index(&path),
        Err(BTreeError::IndexNotFound(_))
    ));
    assert!(matches!(
        ix_manager.destroy_index(dir.path().join(IndexManager::index_name("x", &["y"]))),
        Err(BTreeError::IndexNotFound(_))
    ));
    Ok(())
}
