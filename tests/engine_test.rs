use std::sync::Arc;

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};
use larchdb::transaction::{LockManager, TransactionManager, WriteRecord};
use larchdb::{IxScan, RecordManager, Rid};

mod common;
use common::{create_test_env, int_key};

// Two-column rows (id INT, v INT), eight bytes per record
fn row(id: i32, v: i32) -> [u8; 8] {
    let mut buf = [0u8; 8];
    LittleEndian::write_i32(&mut buf[0..4], id);
    LittleEndian::write_i32(&mut buf[4..8], v);
    buf
}

fn row_value(buf: &[u8]) -> i32 {
    LittleEndian::read_i32(&buf[4..8])
}

#[test]
fn test_point_query_through_index() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let record_manager = Arc::new(RecordManager::new(disk_manager.clone(), buffer_pool.clone()));

    // CREATE TABLE t(id INT, v INT); CREATE INDEX ON t(id)
    let table_path = dir.path().join("t.tab");
    record_manager.create_file(&table_path, 8)?;
    let table = record_manager.open_file("t", &table_path)?;
    let (_ix_manager, index, _path) =
        common::create_int_index(&disk_manager, &buffer_pool, &dir)?;

    // INSERT (1,10),(2,20),(3,30)
    for (id, v) in [(1, 10), (2, 20), (3, 30)] {
        let rid = table.insert_record(&row(id, v))?;
        assert!(index.insert_entry(&int_key(id), rid)?);
    }

    // SELECT v WHERE id = 2
    let rid = index.get_value(&int_key(2))?.expect("id 2 is indexed");
    let record = table.get_record(rid)?;
    assert_eq!(row_value(&record), 20);
    Ok(())
}

#[test]
fn test_range_query_through_index() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let record_manager = Arc::new(RecordManager::new(disk_manager.clone(), buffer_pool.clone()));

    let table_path = dir.path().join("t.tab");
    record_manager.create_file(&table_path, 8)?;
    let table = record_manager.open_file("t", &table_path)?;
    let (_ix_manager, index, _path) =
        common::create_int_index(&disk_manager, &buffer_pool, &dir)?;

    for (id, v) in [(3, 30), (1, 10), (2, 20)] {
        let rid = table.insert_record(&row(id, v))?;
        index.insert_entry(&int_key(id), rid)?;
    }

    // SELECT v WHERE id >= 2 AND id <= 3, in key order
    let lower = index.lower_bound(&int_key(2))?;
    let upper = index.upper_bound(&int_key(3))?;
    let mut scan = IxScan::new(&index, lower, upper);
    let mut values = Vec::new();
    while !scan.is_end() {
        let record = table.get_record(scan.rid()?)?;
        values.push(row_value(&record));
        scan.next()?;
    }
    assert_eq!(values, vec![20, 30]);
    Ok(())
}

#[test]
fn test_transactional_insert_visible_after_commit() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let record_manager = Arc::new(RecordManager::new(disk_manager, buffer_pool));
    let table_path = dir.path().join("t.tab");
    record_manager.create_file(&table_path, 8)?;
    let table = record_manager.open_file("t", &table_path)?;
    let txn_manager =
        TransactionManager::new(Arc::new(LockManager::new()), record_manager.clone());

    // T1 inserts under IX + X and commits
    let t1 = txn_manager.begin(None);
    let lock_manager = txn_manager.lock_manager().clone();
    lock_manager.lock_ix_on_table(&t1, "t")?;
    let rid = table.insert_record(&row(1, 10))?;
    lock_manager.lock_exclusive_on_record(&t1, "t", rid)?;
    t1.append_write_record(WriteRecord::Insert {
        table: "t".into(),
        rid,
    });
    txn_manager.commit(&t1)?;

    // T2 reads it under IS + S
    let t2 = txn_manager.begin(None);
    lock_manager.lock_is_on_table(&t2, "t")?;
    lock_manager.lock_shared_on_record(&t2, "t", rid)?;
    assert_eq!(row_value(&table.get_record(rid)?), 10);
    txn_manager.commit(&t2)?;
    Ok(())
}

#[test]
fn test_aborted_insert_leaves_no_trace() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let record_manager = Arc::new(RecordManager::new(disk_manager, buffer_pool));
    let table_path = dir.path().join("t.tab");
    record_manager.create_file(&table_path, 8)?;
    let table = record_manager.open_file("t", &table_path)?;
    let txn_manager =
        TransactionManager::new(Arc::new(LockManager::new()), record_manager.clone());

    let t1 = txn_manager.begin(None);
    let rid = table.insert_record(&row(9, 90))?;
    t1.append_write_record(WriteRecord::Insert {
        table: "t".into(),
        rid,
    });
    txn_manager.abort(&t1)?;

    assert!(table.get_record(rid).is_err());
    // The freed slot is handed out again
    let rid2 = table.insert_record(&row(1, 10))?;
    assert_eq!(rid2, rid);
    Ok(())
}

#[test]
fn test_rid_round_trips_through_index() -> Result<()> {
    let (disk_manager, buffer_pool, dir) = create_test_env(32)?;
    let (_ix_manager, index, _path) =
        common::create_int_index(&disk_manager, &buffer_pool, &dir)?;

    let rid = Rid::new(42, 17);
    index.insert_entry(&int_key(7), rid)?;
    assert_eq!(index.get_value(&int_key(7))?, Some(rid));

    let iid = index.lower_bound(&int_key(7))?;
    assert_eq!(index.get_rid(iid)?, rid);
    Ok(())
}
