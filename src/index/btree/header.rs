use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::common::types::{PageNo, PAGE_SIZE};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{NODE_HDR_SIZE, RID_SIZE};

/// Column types an index key can be composed of. `Int` and `Float`
/// columns have fixed widths; `Chars` columns carry their width in the
/// header's length list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColType {
    Int,
    Float,
    Chars,
}

/// Index file header, serialized into page 0 of the index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IxFileHdr {
    pub root_page_no: PageNo,
    pub num_pages: PageNo,
    pub first_leaf: PageNo,
    pub last_leaf: PageNo,
    pub col_types: Vec<ColType>,
    pub col_lens: Vec<u16>,
    pub key_len: u16,
    pub max_keys: u16,
}

impl IxFileHdr {
    pub fn write_to(&self, data: &mut [u8; PAGE_SIZE]) -> Result<(), BTreeError> {
        let bytes = bincode::serialize(self).map_err(|e| BTreeError::Header(e.to_string()))?;
        if bytes.len() > PAGE_SIZE {
            return Err(BTreeError::Header(format!(
                "header is {} bytes, page is {}",
                bytes.len(),
                PAGE_SIZE
            )));
        }
        data[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    pub fn read_from(data: &[u8; PAGE_SIZE]) -> Result<Self, BTreeError> {
        bincode::deserialize(&data[..]).map_err(|e| BTreeError::Header(e.to_string()))
    }
}

/// Key schema shared by every node of one index: column layout plus the
/// node capacity derived from it. Fixed at index creation.
#[derive(Debug, Clone)]
pub struct KeySchema {
    pub col_types: Vec<ColType>,
    pub col_lens: Vec<u16>,
    pub key_len: usize,
    pub max_keys: usize,
    pub min_keys: usize,
}

impl KeySchema {
    /// Validate a column list and derive key width and node capacity.
    pub fn new(col_types: Vec<ColType>, col_lens: Vec<u16>) -> Result<Self, BTreeError> {
        if col_types.is_empty() || col_types.len() != col_lens.len() {
            return Err(BTreeError::InvalidSchema(
                "type and length lists must be non-empty and equal-sized".into(),
            ));
        }
        for (ty, &len) in col_types.iter().zip(&col_lens) {
            let ok = match ty {
                ColType::Int => len == 4,
                ColType::Float => len == 8,
                ColType::Chars => len > 0,
            };
            if !ok {
                return Err(BTreeError::InvalidSchema(format!(
                    "column {ty:?} cannot have length {len}"
                )));
            }
        }

        let key_len: usize = col_lens.iter().map(|&l| l as usize).sum();
        let max_keys = (PAGE_SIZE - NODE_HDR_SIZE) / (key_len + RID_SIZE);
        if max_keys < 4 {
            return Err(BTreeError::InvalidSchema(format!(
                "key of {key_len} bytes leaves room for only {max_keys} entries per node"
            )));
        }

        Ok(Self {
            col_types,
            col_lens,
            key_len,
            max_keys,
            min_keys: max_keys / 2,
        })
    }

    pub fn from_hdr(hdr: &IxFileHdr) -> Result<Self, BTreeError> {
        let schema = Self::new(hdr.col_types.clone(), hdr.col_lens.clone())?;
        if schema.key_len != hdr.key_len as usize || schema.max_keys != hdr.max_keys as usize {
            return Err(BTreeError::InvalidSchema(
                "header key length or node capacity disagrees with the column lists".into(),
            ));
        }
        Ok(schema)
    }

    /// Column-wise, type-aware lexicographic comparison of two keys.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let mut offset = 0;
        for (ty, &len) in self.col_types.iter().zip(&self.col_lens) {
            let len = len as usize;
            let av = &a[offset..offset + len];
            let bv = &b[offset..offset + len];
            let ord = match ty {
                ColType::Int => LittleEndian::read_i32(av).cmp(&LittleEndian::read_i32(bv)),
                ColType::Float => LittleEndian::read_f64(av).total_cmp(&LittleEndian::read_f64(bv)),
                ColType::Chars => av.cmp(bv),
            };
            if ord != Ordering::Equal {
                return ord;
            }
            offset += len;
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_key(v: i32) -> [u8; 4] {
        v.to_le_bytes()
    }

    #[test]
    fn test_schema_validation() {
        assert!(KeySchema::new(vec![ColType::Int], vec![4]).is_ok());
        assert!(KeySchema::new(vec![ColType::Int], vec![8]).is_err());
        assert!(KeySchema::new(vec![ColType::Float], vec![4]).is_err());
        assert!(KeySchema::new(vec![], vec![]).is_err());
        assert!(KeySchema::new(vec![ColType::Chars], vec![0]).is_err());
        // A key wider than a page cannot form a node
        assert!(KeySchema::new(vec![ColType::Chars], vec![2048]).is_err());
    }

    #[test]
    fn test_int_compare() {
        let schema = KeySchema::new(vec![ColType::Int], vec![4]).unwrap();
        assert_eq!(schema.compare(&int_key(1), &int_key(2)), Ordering::Less);
        assert_eq!(schema.compare(&int_key(-5), &int_key(3)), Ordering::Less);
        assert_eq!(schema.compare(&int_key(7), &int_key(7)), Ordering::Equal);
        assert_eq!(schema.compare(&int_key(10), &int_key(-10)), Ordering::Greater);
    }

    #[test]
    fn test_composite_compare() {
        let schema =
            KeySchema::new(vec![ColType::Int, ColType::Chars], vec![4, 3]).unwrap();
        let mut a = Vec::new();
        a.extend_from_slice(&int_key(1));
        a.extend_from_slice(b"abc");
        let mut b = Vec::new();
        b.extend_from_slice(&int_key(1));
        b.extend_from_slice(b"abd");
        assert_eq!(schema.compare(&a, &b), Ordering::Less);
        // First column dominates
        let mut c = Vec::new();
        c.extend_from_slice(&int_key(2));
        c.extend_from_slice(b"aaa");
        assert_eq!(schema.compare(&c, &b), Ordering::Greater);
    }

    #[test]
    fn test_float_compare_is_total() {
        let schema = KeySchema::new(vec![ColType::Float], vec![8]).unwrap();
        let k = |v: f64| v.to_le_bytes();
        assert_eq!(schema.compare(&k(-1.5), &k(2.0)), Ordering::Less);
        assert_eq!(schema.compare(&k(2.0), &k(2.0)), Ordering::Equal);
        assert_eq!(schema.compare(&k(f64::NAN), &k(f64::NAN)), Ordering::Equal);
    }

    #[test]
    fn test_hdr_round_trip() {
        let schema = KeySchema::new(vec![ColType::Int, ColType::Int], vec![4, 4]).unwrap();
        let hdr = IxFileHdr {
            root_page_no: 1,
            num_pages: 2,
            first_leaf: 1,
            last_leaf: 1,
            col_types: schema.col_types.clone(),
            col_lens: schema.col_lens.clone(),
            key_len: schema.key_len as u16,
            max_keys: schema.max_keys as u16,
        };
        let mut data = [0u8; PAGE_SIZE];
        hdr.write_to(&mut data).unwrap();
        let back = IxFileHdr::read_from(&data).unwrap();
        assert_eq!(back.root_page_no, 1);
        assert_eq!(back.col_types, hdr.col_types);
        assert_eq!(back.max_keys, hdr.max_keys);
        assert!(KeySchema::from_hdr(&back).is_ok());
    }
}
