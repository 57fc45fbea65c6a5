//! Read path of a replicated table.
//!
//! Wraps a raw cursor over one replica's physical rows and yields the
//! logical rows callers see: tombstones hidden, version tokens virtualized,
//! and (optionally) rows written under a newer view than the caller's
//! rejected.

pub mod enumerator;
pub mod error;
pub mod guard;
pub mod strategy;

pub use enumerator::{ConsistentScan, ScanOptions, ScanState, ScanStats};
pub use error::ScanError;
pub use guard::{ensure_view_consistent, StaleViewCheck};
pub use strategy::{select_strategy, RowMetadataStrategy, StrategyKind};
