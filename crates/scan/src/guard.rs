//! Stale-view guard.
//!
//! A caller bound to view `T` must not observe a row written under a view
//! newer than `T`: that write belongs to a reconfiguration the caller has
//! not adopted. Checking costs a comparison per row, so it is opt-in.

use crate::error::ScanError;
use rtable_common::ViewId;

/// Fail if `row_view_id` is newer than `txn_view_id`.
pub fn ensure_view_consistent(txn_view_id: ViewId, row_view_id: ViewId) -> Result<(), ScanError> {
    if row_view_id.is_newer_than(txn_view_id) {
        return Err(ScanError::StaleView {
            txn_view_id,
            row_view_id,
        });
    }
    Ok(())
}

/// Whether a scan checks each returned row against the caller's view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StaleViewCheck {
    /// Rows are returned whatever view they were written under.
    #[default]
    Disabled,
    /// Rows written under a newer view fail with [`ScanError::StaleView`].
    Strict,
}

impl StaleViewCheck {
    pub fn from_flag(enforce: bool) -> Self {
        if enforce {
            Self::Strict
        } else {
            Self::Disabled
        }
    }

    #[inline]
    pub fn check(self, txn_view_id: ViewId, row_view_id: ViewId) -> Result<(), ScanError> {
        match self {
            Self::Disabled => Ok(()),
            Self::Strict => ensure_view_consistent(txn_view_id, row_view_id),
        }
    }
}
