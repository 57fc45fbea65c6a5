//! Physical row model and storage boundary for rtable.
//!
//! Rows are `{partition_key, row_key, etag, replication, properties}`.
//! Scans hand rows out through a [`RowCursor`]; the in-memory
//! [`Memtable`] stands in for one replica of a physical table.

pub mod cursor;
pub mod dump;
pub mod memtable;
pub mod record;

pub use cursor::{CursorError, IterCursor, RowCursor, VecCursor};
pub use memtable::Memtable;
pub use record::{LogicalRow, PropertyValue, RawRow, ReplicationColumns, RowShape};
