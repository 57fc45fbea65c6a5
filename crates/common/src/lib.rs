//! rtable-common: shared types for the rtable workspace.
//!
//! Provides the `ViewId` type that orders replication configurations,
//! and the reserved property names under which property-bag rows carry
//! their replication metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ViewId
// ---------------------------------------------------------------------------

/// Monotonic version of a view (a replica-set configuration).
///
/// Larger is newer. A row stamped with a view id greater than the one a
/// reader is bound to was written under a reconfiguration the reader has
/// not adopted yet.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(i64);

impl ViewId {
    /// View id of rows that were never stamped by the replication layer.
    pub const UNSTAMPED: Self = Self(0);

    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns `true` if `self` was issued after `other`.
    pub fn is_newer_than(self, other: Self) -> bool {
        self.0 > other.0
    }
}

impl From<i64> for ViewId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Debug for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewId({})", self.0)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Reserved property names
// ---------------------------------------------------------------------------

/// Prefix shared by every replication-owned property.
pub const RTABLE_PROPERTY_PREFIX: &str = "_rtable_";

pub const PROP_VIEW_ID: &str = "_rtable_ViewId";
pub const PROP_VERSION: &str = "_rtable_Version";
pub const PROP_TOMBSTONE: &str = "_rtable_Tombstone";
pub const PROP_ROW_LOCK: &str = "_rtable_RowLock";
pub const PROP_LOCK_ACQUISITION: &str = "_rtable_LockAcquisition";

/// Returns `true` if `name` belongs to the replication layer and must never
/// reach a caller.
pub fn is_replication_property(name: &str) -> bool {
    name.starts_with(RTABLE_PROPERTY_PREFIX)
}

// ---------------------------------------------------------------------------
// Name comparison
// ---------------------------------------------------------------------------

/// Case-insensitive name equality used for table, view and partition names.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || (!a.is_ascii() && a.to_lowercase() == b.to_lowercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
