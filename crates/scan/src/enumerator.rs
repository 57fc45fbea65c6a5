//! Consistency-checking scan over a raw row cursor.
//!
//! [`ConsistentScan`] pulls physical rows from a [`RowCursor`], hides
//! tombstones, and turns each remaining row into a [`LogicalRow`] with a
//! virtual ETag. With [`StaleViewCheck::Strict`] a row written under a view
//! newer than the caller's fails the read instead of being returned.
//!
//! Only rows the caller actually reads are checked: rows past the point
//! where a caller stops iterating are never examined.

use crate::error::ScanError;
use crate::guard::StaleViewCheck;
use crate::strategy::{select_strategy, RowMetadataStrategy, StrategyKind};
use rtable_common::ViewId;
use rtable_config::{ConfiguredTable, ViewConfig};
use rtable_storage::{CursorError, LogicalRow, RowCursor, RowShape};

/// Lifecycle of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Opened, not yet advanced.
    Unstarted,
    /// On a live row.
    Positioned,
    /// The last advance failed in the cursor. No row is current; a further
    /// `advance` retries the cursor.
    Faulted,
    /// The cursor ran out of rows.
    Exhausted,
    /// The cursor has been released.
    Disposed,
}

/// Per-scan settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Whether the table is being converted into the replicated scheme.
    pub conversion_mode: bool,
    /// View the caller's transaction is bound to.
    pub txn_view_id: ViewId,
    pub stale_view_check: StaleViewCheck,
}

impl ScanOptions {
    pub fn new(txn_view_id: ViewId) -> Self {
        Self {
            txn_view_id,
            ..Self::default()
        }
    }

    /// Options for reading `table` through `view`.
    pub fn for_table(table: &ConfiguredTable, view: &ViewConfig) -> Self {
        Self {
            conversion_mode: table.convert_to_rtable,
            txn_view_id: view.view_id,
            stale_view_check: StaleViewCheck::Disabled,
        }
    }

    pub fn with_conversion_mode(mut self, conversion_mode: bool) -> Self {
        self.conversion_mode = conversion_mode;
        self
    }

    pub fn with_stale_view_check(mut self, check: StaleViewCheck) -> Self {
        self.stale_view_check = check;
        self
    }
}

/// Counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Physical rows pulled from the cursor.
    pub rows_pulled: u64,
    pub tombstones_skipped: u64,
    /// Logical rows handed to the caller.
    pub rows_returned: u64,
    pub stale_rejections: u64,
}

/// A scan yielding the logical rows of a replicated table.
///
/// Drive it either with [`advance`](Self::advance) /
/// [`current`](Self::current) or as an `Iterator`. The cursor is released
/// exactly once: on [`dispose`](Self::dispose) or on drop, whichever comes
/// first.
pub struct ConsistentScan<C: RowCursor> {
    cursor: C,
    strategy: &'static RowMetadataStrategy,
    options: ScanOptions,
    state: ScanState,
    stats: ScanStats,
    timer: Option<prometheus::HistogramTimer>,
}

impl<C: RowCursor> std::fmt::Debug for ConsistentScan<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsistentScan")
            .field("strategy", &self.strategy.kind)
            .field("options", &self.options)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<C: RowCursor> ConsistentScan<C> {
    /// Open a scan over `cursor`, whose rows have the declared `shape`.
    ///
    /// Fails with [`ScanError::UnsupportedRowShape`] if no strategy reads
    /// that shape; the cursor is released before returning.
    pub fn open(mut cursor: C, shape: RowShape, options: ScanOptions) -> Result<Self, ScanError> {
        let strategy = match select_strategy(shape, options.conversion_mode) {
            Ok(strategy) => strategy,
            Err(e) => {
                cursor.release();
                rtable_metrics::metrics().unsupported_row_shapes.inc();
                tracing::warn!("refusing scan over {} rows: {}", shape, e);
                return Err(e);
            }
        };

        tracing::debug!(
            "scan opened: shape={} strategy={:?} txn_view={} check={:?}",
            shape,
            strategy.kind,
            options.txn_view_id,
            options.stale_view_check
        );

        Ok(Self {
            cursor,
            strategy,
            options,
            state: ScanState::Unstarted,
            stats: ScanStats::default(),
            timer: Some(rtable_metrics::start_scan_timer(strategy.kind.as_str())),
        })
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Move to the next live row, skipping tombstones. Returns `Ok(false)`
    /// once the cursor is exhausted.
    ///
    /// Cursor errors are returned as-is and leave the scan `Faulted`, so the
    /// row under the scan before the failure is not served again. The cursor
    /// is still released when the scan is disposed.
    pub fn advance(&mut self) -> Result<bool, ScanError> {
        match self.state {
            ScanState::Disposed => return Err(ScanError::Disposed),
            ScanState::Exhausted => return Ok(false),
            ScanState::Unstarted | ScanState::Positioned | ScanState::Faulted => {}
        }

        loop {
            let more = match self.cursor.advance() {
                Ok(more) => more,
                Err(e) => {
                    self.state = ScanState::Faulted;
                    return Err(e.into());
                }
            };
            if !more {
                self.state = ScanState::Exhausted;
                return Ok(false);
            }
            self.stats.rows_pulled += 1;

            match self.cursor.current() {
                Some(row) if (self.strategy.has_tombstone)(row) => {
                    self.stats.tombstones_skipped += 1;
                }
                _ => {
                    self.state = ScanState::Positioned;
                    return Ok(true);
                }
            }
        }
    }

    /// The logical row under the scan.
    ///
    /// With a strict stale-view check, fails with [`ScanError::StaleView`]
    /// if the row was written under a view newer than the caller's. The
    /// scan stays positioned; the next `advance` moves past the row.
    pub fn current(&mut self) -> Result<LogicalRow, ScanError> {
        if self.state != ScanState::Positioned {
            return Err(ScanError::NotPositioned(self.state));
        }
        let raw = self
            .cursor
            .current()
            .ok_or(ScanError::NotPositioned(self.state))?;

        let row_view_id = (self.strategy.row_view_id)(raw);
        if let Err(e) = self
            .options
            .stale_view_check
            .check(self.options.txn_view_id, row_view_id)
        {
            self.stats.stale_rejections += 1;
            rtable_metrics::metrics().stale_view_rejections.inc();
            tracing::warn!(
                "row {}/{} rejected: {}",
                raw.partition_key,
                raw.row_key,
                e
            );
            return Err(e);
        }

        let mut row = raw.clone();
        (self.strategy.virtualize_etag)(&mut row);
        self.stats.rows_returned += 1;
        Ok(row.into_logical())
    }

    /// Rewind to before the first row, if the cursor can restart.
    pub fn reset(&mut self) -> Result<(), ScanError> {
        if self.state == ScanState::Disposed {
            return Err(ScanError::Disposed);
        }
        match self.cursor.reset() {
            Ok(()) => {
                self.state = ScanState::Unstarted;
                Ok(())
            }
            Err(CursorError::ResetUnsupported) => Err(ScanError::UnsupportedOperation("reset")),
            Err(e) => Err(e.into()),
        }
    }

    /// Release the cursor. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.state == ScanState::Disposed {
            return;
        }
        self.cursor.release();
        self.state = ScanState::Disposed;

        let m = rtable_metrics::metrics();
        m.rows_returned.inc_by(self.stats.rows_returned);
        m.tombstones_skipped.inc_by(self.stats.tombstones_skipped);
        if let Some(timer) = self.timer.take() {
            timer.observe_duration();
        }

        tracing::debug!(
            "scan disposed: pulled={} skipped={} returned={} stale={}",
            self.stats.rows_pulled,
            self.stats.tombstones_skipped,
            self.stats.rows_returned,
            self.stats.stale_rejections
        );
    }
}

impl<C: RowCursor> Iterator for ConsistentScan<C> {
    type Item = Result<LogicalRow, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ScanState::Disposed {
            return None;
        }
        match self.advance() {
            Ok(true) => Some(self.current()),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<C: RowCursor> Drop for ConsistentScan<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}
