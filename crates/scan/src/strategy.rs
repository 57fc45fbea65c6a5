//! Row metadata strategies.
//!
//! Where a row keeps its replication metadata depends on its shape and on
//! whether its table is mid-conversion. Each case has one
//! [`RowMetadataStrategy`]: three plain functions that read the tombstone,
//! read the stamped view, and rewrite the ETag. A scan picks its strategy
//! once, in [`select_strategy`], and calls the functions for every row.
//!
//! | strategy | tombstone / view | virtual ETag |
//! |----------|------------------|--------------|
//! | `Native` | typed columns | `version` |
//! | `Dynamic` | `_rtable_` properties | `_rtable_Version`, `0` if unstamped |
//! | `DynamicConversion` | `_rtable_` properties | `_rtable_Version`, native ETag if unstamped |
//! | `Migration` | `_rtable_` properties | native ETag |

use crate::error::ScanError;
use rtable_common::{ViewId, PROP_TOMBSTONE, PROP_VERSION, PROP_VIEW_ID};
use rtable_storage::{RawRow, RowShape};

/// The closed set of metadata strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Init-dynamic rows while a table is being converted.
    Migration,
    /// Natively replicated rows.
    Native,
    /// Property-bag rows while their table is being converted.
    DynamicConversion,
    /// Property-bag rows of a fully replicated table.
    Dynamic,
}

impl StrategyKind {
    /// The strategy record for this case.
    pub fn strategy(self) -> &'static RowMetadataStrategy {
        match self {
            Self::Migration => &MIGRATION,
            Self::Native => &NATIVE,
            Self::DynamicConversion => &DYNAMIC_CONVERSION,
            Self::Dynamic => &DYNAMIC,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Migration => "migration",
            Self::Native => "native",
            Self::DynamicConversion => "dynamic_conversion",
            Self::Dynamic => "dynamic",
        }
    }
}

/// How to read replication metadata off one shape of row.
#[derive(Debug, Clone, Copy)]
pub struct RowMetadataStrategy {
    pub kind: StrategyKind,
    /// Whether the row is soft-deleted.
    pub has_tombstone: fn(&RawRow) -> bool,
    /// View the row was last written under.
    pub row_view_id: fn(&RawRow) -> ViewId,
    /// Replace the native ETag with the virtual one. Depends only on fields
    /// other than the ETag itself (or leaves it untouched), so applying it
    /// twice changes nothing.
    pub virtualize_etag: fn(&mut RawRow),
}

/// Pick the strategy for rows of `shape`.
///
/// First match wins:
///
/// 1. conversion + init-dynamic → `Migration`
/// 2. conversion + replicated → `Native`
/// 3. conversion + dynamic → `DynamicConversion`
/// 4. replicated → `Native`
/// 5. dynamic → `Dynamic`
///
/// Any other shape is refused.
pub fn select_strategy(
    shape: RowShape,
    conversion_mode: bool,
) -> Result<&'static RowMetadataStrategy, ScanError> {
    let kind = if conversion_mode {
        match shape {
            RowShape::InitDynamic => Some(StrategyKind::Migration),
            s if s.derives_from_replicated() => Some(StrategyKind::Native),
            s if s.derives_from_dynamic() => Some(StrategyKind::DynamicConversion),
            _ => None,
        }
    } else if shape.derives_from_replicated() {
        Some(StrategyKind::Native)
    } else if shape.derives_from_dynamic() {
        Some(StrategyKind::Dynamic)
    } else {
        None
    };

    match kind {
        Some(kind) => Ok(kind.strategy()),
        None => Err(ScanError::UnsupportedRowShape {
            type_name: shape.type_name(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Strategy records
// ---------------------------------------------------------------------------

static NATIVE: RowMetadataStrategy = RowMetadataStrategy {
    kind: StrategyKind::Native,
    has_tombstone: native_has_tombstone,
    row_view_id: native_row_view_id,
    virtualize_etag: native_virtualize_etag,
};

static DYNAMIC: RowMetadataStrategy = RowMetadataStrategy {
    kind: StrategyKind::Dynamic,
    has_tombstone: property_has_tombstone,
    row_view_id: property_row_view_id,
    virtualize_etag: dynamic_virtualize_etag,
};

static DYNAMIC_CONVERSION: RowMetadataStrategy = RowMetadataStrategy {
    kind: StrategyKind::DynamicConversion,
    has_tombstone: property_has_tombstone,
    row_view_id: property_row_view_id,
    virtualize_etag: conversion_virtualize_etag,
};

static MIGRATION: RowMetadataStrategy = RowMetadataStrategy {
    kind: StrategyKind::Migration,
    has_tombstone: property_has_tombstone,
    row_view_id: property_row_view_id,
    virtualize_etag: migration_virtualize_etag,
};

// Native rows: typed columns.

fn native_has_tombstone(row: &RawRow) -> bool {
    row.replication.tombstone
}

fn native_row_view_id(row: &RawRow) -> ViewId {
    row.replication.view_id
}

fn native_virtualize_etag(row: &mut RawRow) {
    row.etag = row.replication.version.to_string();
}

// Property-bag rows. A row that was never stamped is live and belongs to no
// view yet.

// A tombstone marker of the wrong type counts as set: a row whose deletion
// cannot be ruled out is never handed to a caller.
fn property_has_tombstone(row: &RawRow) -> bool {
    match row.property(PROP_TOMBSTONE) {
        None => false,
        Some(value) => value.as_bool().unwrap_or_else(|| {
            tracing::warn!(
                "row {}/{} has a malformed {} ({:?}); hiding it",
                row.partition_key,
                row.row_key,
                PROP_TOMBSTONE,
                value
            );
            true
        }),
    }
}

fn property_row_view_id(row: &RawRow) -> ViewId {
    row.int64_property(PROP_VIEW_ID)
        .map(ViewId::new)
        .unwrap_or(ViewId::UNSTAMPED)
}

fn dynamic_virtualize_etag(row: &mut RawRow) {
    row.etag = row.int64_property(PROP_VERSION).unwrap_or(0).to_string();
}

fn conversion_virtualize_etag(row: &mut RawRow) {
    // Legacy rows keep the token the plain table gave them until converted.
    if let Some(version) = row.int64_property(PROP_VERSION) {
        row.etag = version.to_string();
    }
}

fn migration_virtualize_etag(_row: &mut RawRow) {
    // The converter rewrites rows conditionally on their physical ETag.
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtable_storage::ReplicationColumns;

    const SHAPES: [RowShape; 4] = [
        RowShape::Replicated,
        RowShape::Dynamic,
        RowShape::InitDynamic,
        RowShape::Unknown("Invoice"),
    ];

    fn kind(shape: RowShape, conversion: bool) -> Option<StrategyKind> {
        select_strategy(shape, conversion).ok().map(|s| s.kind)
    }

    fn stamped(view: i64, version: i64, tombstone: bool) -> ReplicationColumns {
        ReplicationColumns {
            view_id: ViewId::new(view),
            version,
            tombstone,
            ..ReplicationColumns::default()
        }
    }

    #[test]
    fn test_selection_in_conversion_mode() {
        assert_eq!(kind(RowShape::InitDynamic, true), Some(StrategyKind::Migration));
        assert_eq!(kind(RowShape::Replicated, true), Some(StrategyKind::Native));
        assert_eq!(kind(RowShape::Dynamic, true), Some(StrategyKind::DynamicConversion));
    }

    #[test]
    fn test_selection_in_steady_state() {
        assert_eq!(kind(RowShape::Replicated, false), Some(StrategyKind::Native));
        assert_eq!(kind(RowShape::Dynamic, false), Some(StrategyKind::Dynamic));
        // Init-dynamic rows are property-bag rows once conversion is over.
        assert_eq!(kind(RowShape::InitDynamic, false), Some(StrategyKind::Dynamic));
    }

    #[test]
    fn test_selection_rejects_unknown_shape() {
        for conversion in [true, false] {
            match select_strategy(RowShape::Unknown("Invoice"), conversion) {
                Err(ScanError::UnsupportedRowShape { type_name }) => assert_eq!(type_name, "Invoice"),
                other => panic!("expected UnsupportedRowShape, got {:?}", other.map(|s| s.kind)),
            }
        }
    }

    #[test]
    fn test_selection_is_deterministic() {
        for shape in SHAPES {
            for conversion in [true, false] {
                assert_eq!(kind(shape, conversion), kind(shape, conversion));
            }
        }
    }

    #[test]
    fn test_strategy_record_matches_kind() {
        for kind in [
            StrategyKind::Migration,
            StrategyKind::Native,
            StrategyKind::DynamicConversion,
            StrategyKind::Dynamic,
        ] {
            assert_eq!(kind.strategy().kind, kind);
        }
    }

    #[test]
    fn test_native_reads_typed_columns() {
        let s = StrategyKind::Native.strategy();
        let mut row = RawRow::new("p", "r")
            .with_etag("W/\"42\"")
            .with_replication(stamped(3, 8, true));
        assert!((s.has_tombstone)(&row));
        assert_eq!((s.row_view_id)(&row), ViewId::new(3));
        (s.virtualize_etag)(&mut row);
        assert_eq!(row.etag, "8");
    }

    #[test]
    fn test_native_ignores_properties() {
        let s = StrategyKind::Native.strategy();
        let row = RawRow::new("p", "r").with_replication_properties(&stamped(9, 1, true));
        assert!(!(s.has_tombstone)(&row));
        assert_eq!((s.row_view_id)(&row), ViewId::UNSTAMPED);
    }

    #[test]
    fn test_dynamic_reads_properties() {
        let s = StrategyKind::Dynamic.strategy();
        let mut row = RawRow::new("p", "r")
            .with_etag("native")
            .with_replication_properties(&stamped(4, 12, false));
        assert!(!(s.has_tombstone)(&row));
        assert_eq!((s.row_view_id)(&row), ViewId::new(4));
        (s.virtualize_etag)(&mut row);
        assert_eq!(row.etag, "12");
    }

    #[test]
    fn test_dynamic_unstamped_row() {
        let s = StrategyKind::Dynamic.strategy();
        let mut row = RawRow::new("p", "r").with_etag("native");
        assert!(!(s.has_tombstone)(&row));
        assert_eq!((s.row_view_id)(&row), ViewId::UNSTAMPED);
        (s.virtualize_etag)(&mut row);
        assert_eq!(row.etag, "0");
    }

    #[test]
    fn test_conversion_keeps_native_etag_of_legacy_rows() {
        let s = StrategyKind::DynamicConversion.strategy();
        let mut legacy = RawRow::new("p", "r").with_etag("native");
        (s.virtualize_etag)(&mut legacy);
        assert_eq!(legacy.etag, "native");

        let mut converted = RawRow::new("p", "r")
            .with_etag("native")
            .with_replication_properties(&stamped(2, 5, false));
        (s.virtualize_etag)(&mut converted);
        assert_eq!(converted.etag, "5");
    }

    #[test]
    fn test_migration_keeps_native_etag() {
        let s = StrategyKind::Migration.strategy();
        let mut row = RawRow::new("p", "r")
            .with_etag("native")
            .with_replication_properties(&stamped(2, 5, true));
        assert!((s.has_tombstone)(&row));
        assert_eq!((s.row_view_id)(&row), ViewId::new(2));
        (s.virtualize_etag)(&mut row);
        assert_eq!(row.etag, "native");
    }

    #[test]
    fn test_virtualize_is_idempotent() {
        for kind in [
            StrategyKind::Migration,
            StrategyKind::Native,
            StrategyKind::DynamicConversion,
            StrategyKind::Dynamic,
        ] {
            let s = kind.strategy();
            let raw = RawRow::new("p", "r")
                .with_etag("native")
                .with_replication(stamped(1, 7, false))
                .with_replication_properties(&stamped(1, 9, false));

            let mut once = raw.clone();
            (s.virtualize_etag)(&mut once);
            let mut twice = once.clone();
            (s.virtualize_etag)(&mut twice);
            assert_eq!(once.etag, twice.etag, "{:?} is not idempotent", kind);

            let mut again = raw.clone();
            (s.virtualize_etag)(&mut again);
            assert_eq!(once.etag, again.etag, "{:?} is not deterministic", kind);
        }
    }

    #[test]
    fn test_malformed_tombstone_property_hides_row() {
        for kind in [
            StrategyKind::Dynamic,
            StrategyKind::DynamicConversion,
            StrategyKind::Migration,
        ] {
            let s = kind.strategy();
            let as_string = RawRow::new("p", "r").with_property(PROP_TOMBSTONE, "true");
            let as_int = RawRow::new("p", "r").with_property(PROP_TOMBSTONE, 1i64);
            assert!((s.has_tombstone)(&as_string), "{:?}", kind);
            assert!((s.has_tombstone)(&as_int), "{:?}", kind);
        }
    }

    #[test]
    fn test_missing_tombstone_property_is_live() {
        let s = StrategyKind::Dynamic.strategy();
        assert!(!(s.has_tombstone)(&RawRow::new("p", "r")));
    }
}
