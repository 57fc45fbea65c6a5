//! Scan errors.

use crate::enumerator::ScanState;
use rtable_common::ViewId;
use rtable_storage::CursorError;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// No strategy reads rows of this shape. Fatal for the scan.
    #[error("row type ({type_name}) is not supported")]
    UnsupportedRowShape { type_name: &'static str },

    /// The row was written under a view newer than the caller's. The caller
    /// should refresh its view and retry the scan.
    #[error("stale view: transaction view {txn_view_id} is behind row view {row_view_id}")]
    StaleView {
        txn_view_id: ViewId,
        row_view_id: ViewId,
    },

    #[error("operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    #[error("no current row (scan is {0:?})")]
    NotPositioned(ScanState),

    #[error("scan already disposed")]
    Disposed,

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

impl ScanError {
    /// Returns `true` if retrying after refreshing the caller's view may
    /// succeed.
    pub fn is_stale_view(&self) -> bool {
        matches!(self, Self::StaleView { .. })
    }
}
