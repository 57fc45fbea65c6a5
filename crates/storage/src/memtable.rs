//! In-memory replica table.
//!
//! Holds the physical rows of one replica ordered by
//! `(partition_key, row_key)`, the order every scan returns them in. Each
//! write stamps a fresh storage-native ETag, the way a real table service
//! does, so callers can tell physical rewrites apart.

use crate::cursor::VecCursor;
use crate::record::{PropertyValue, RawRow};
use rtable_common::names_equal;
use std::collections::BTreeMap;

type RowId = (String, String);

/// In-memory ordered row store for one replica.
#[derive(Debug)]
pub struct Memtable {
    rows: BTreeMap<RowId, RawRow>,
    /// Sequence number used to mint native ETags.
    next_etag: u64,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_etag: 1,
        }
    }

    /// Get a row by identity.
    pub fn get(&self, partition_key: &str, row_key: &str) -> Option<&RawRow> {
        self.rows
            .get(&(partition_key.to_string(), row_key.to_string()))
    }

    /// Insert or replace a row. Returns the native ETag assigned to it.
    pub fn put(&mut self, mut row: RawRow) -> String {
        let etag = format!("W/\"{}\"", self.next_etag);
        self.next_etag += 1;

        row.etag = etag.clone();
        row.timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        self.rows
            .insert((row.partition_key.clone(), row.row_key.clone()), row);
        etag
    }

    /// Load a row as-is, keeping its ETag and timestamp (used when importing
    /// a dump of an existing replica).
    pub fn load(&mut self, row: RawRow) {
        self.rows
            .insert((row.partition_key.clone(), row.row_key.clone()), row);
    }

    /// Physically remove a row. Replicated deletes set a tombstone instead;
    /// this is for purging rows once no reader can need them.
    pub fn remove(&mut self, partition_key: &str, row_key: &str) -> Option<RawRow> {
        self.rows
            .remove(&(partition_key.to_string(), row_key.to_string()))
    }

    /// Number of physical rows, tombstones included.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Snapshot cursor over every row.
    pub fn scan(&self) -> VecCursor {
        VecCursor::new(self.rows.values().cloned().collect())
    }

    /// Snapshot cursor over one partition.
    pub fn scan_partition(&self, partition_key: &str) -> VecCursor {
        let start = (partition_key.to_string(), String::new());
        let rows = self
            .rows
            .range(start..)
            .take_while(|((pk, _), _)| pk == partition_key)
            .map(|(_, row)| row.clone())
            .collect();
        VecCursor::new(rows)
    }

    /// Snapshot cursor over the rows whose string property `name` equals
    /// `value` (case-insensitive), in key order. This is how rows are picked
    /// for a partition override routed on a row property, which need not
    /// match the physical partition key.
    pub fn scan_by_property(&self, name: &str, value: &str) -> VecCursor {
        let rows = self
            .rows
            .values()
            .filter(|row| {
                row.property(name)
                    .and_then(PropertyValue::as_str)
                    .is_some_and(|v| names_equal(v, value))
            })
            .cloned()
            .collect();
        VecCursor::new(rows)
    }

    /// Distinct partition keys, in order.
    pub fn partitions(&self) -> Vec<String> {
        let mut partitions: Vec<String> = Vec::new();
        for (pk, _) in self.rows.keys() {
            if partitions.last() != Some(pk) {
                partitions.push(pk.clone());
            }
        }
        partitions
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::RowCursor;

    fn keys(mut cursor: VecCursor) -> Vec<String> {
        let mut out = Vec::new();
        while cursor.advance().unwrap() {
            let row = cursor.current().unwrap();
            out.push(format!("{}/{}", row.partition_key, row.row_key));
        }
        out
    }

    #[test]
    fn test_put_get() {
        let mut table = Memtable::new();
        let etag = table.put(RawRow::new("US", "1").with_property("Name", "a"));
        let row = table.get("US", "1").unwrap();
        assert_eq!(row.etag, etag);
        assert!(row.timestamp_ms > 0);
        assert!(table.get("US", "2").is_none());
    }

    #[test]
    fn test_put_assigns_fresh_etag() {
        let mut table = Memtable::new();
        let first = table.put(RawRow::new("US", "1"));
        let second = table.put(RawRow::new("US", "1"));
        assert_ne!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("US", "1").unwrap().etag, second);
    }

    #[test]
    fn test_load_keeps_etag() {
        let mut table = Memtable::new();
        table.load(RawRow::new("US", "1").with_etag("native-9"));
        assert_eq!(table.get("US", "1").unwrap().etag, "native-9");
    }

    #[test]
    fn test_scan_is_ordered() {
        let mut table = Memtable::new();
        table.put(RawRow::new("US", "2"));
        table.put(RawRow::new("EU", "1"));
        table.put(RawRow::new("US", "1"));
        assert_eq!(keys(table.scan()), vec!["EU/1", "US/1", "US/2"]);
        assert_eq!(table.partitions(), vec!["EU", "US"]);
    }

    #[test]
    fn test_scan_partition() {
        let mut table = Memtable::new();
        table.put(RawRow::new("US", "2"));
        table.put(RawRow::new("USA", "1"));
        table.put(RawRow::new("EU", "1"));
        table.put(RawRow::new("US", "1"));
        assert_eq!(keys(table.scan_partition("US")), vec!["US/1", "US/2"]);
        assert!(keys(table.scan_partition("AP")).is_empty());
    }

    #[test]
    fn test_scan_by_property_ignores_partition_key() {
        let mut table = Memtable::new();
        table.put(RawRow::new("P1", "1").with_property("Region", "EU"));
        table.put(RawRow::new("EU", "2").with_property("Region", "US"));
        table.put(RawRow::new("P2", "3").with_property("Region", "eu"));
        table.put(RawRow::new("P2", "4").with_property("Region", 7i64));
        table.put(RawRow::new("P3", "5"));
        assert_eq!(keys(table.scan_by_property("Region", "EU")), vec!["P1/1", "P2/3"]);
        assert!(keys(table.scan_by_property("Region", "AP")).is_empty());
    }

    #[test]
    fn test_scan_is_a_snapshot() {
        let mut table = Memtable::new();
        table.put(RawRow::new("US", "1"));
        let cursor = table.scan();
        table.put(RawRow::new("US", "2"));
        assert_eq!(keys(cursor), vec!["US/1"]);
    }

    #[test]
    fn test_remove() {
        let mut table = Memtable::new();
        table.put(RawRow::new("US", "1"));
        table.put(RawRow::new("US", "2"));
        assert!(table.remove("US", "1").is_some());
        assert!(table.remove("US", "1").is_none());
        assert_eq!(table.len(), 1);
    }
}
