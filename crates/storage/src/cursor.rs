//! Raw row cursors.
//!
//! A [`RowCursor`] is the forward-only view a replica gives of an ordered
//! scan. Implementations may do I/O inside [`RowCursor::advance`]; the
//! caller owns timeouts and retries.

use crate::record::RawRow;

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("cursor I/O failed: {0}")]
    Io(String),
    #[error("cursor cannot restart")]
    ResetUnsupported,
    #[error("cursor already released")]
    Released,
}

/// Forward-only cursor over the physical rows of one replica.
pub trait RowCursor {
    /// Move to the next row. Returns `Ok(false)` once exhausted.
    fn advance(&mut self) -> Result<bool, CursorError>;

    /// The row under the cursor, `None` before the first `advance` and after
    /// exhaustion.
    fn current(&self) -> Option<&RawRow>;

    /// Rewind to before the first row.
    fn reset(&mut self) -> Result<(), CursorError> {
        Err(CursorError::ResetUnsupported)
    }

    /// Release any resources held by the cursor.
    fn release(&mut self);
}

impl<C: RowCursor + ?Sized> RowCursor for Box<C> {
    fn advance(&mut self) -> Result<bool, CursorError> {
        (**self).advance()
    }

    fn current(&self) -> Option<&RawRow> {
        (**self).current()
    }

    fn reset(&mut self) -> Result<(), CursorError> {
        (**self).reset()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

// ---------------------------------------------------------------------------
// VecCursor
// ---------------------------------------------------------------------------

/// Restartable cursor over a materialized snapshot of rows.
#[derive(Debug, Default)]
pub struct VecCursor {
    rows: Vec<RawRow>,
    /// Index of the current row; `None` before the first advance.
    pos: Option<usize>,
    released: bool,
}

impl VecCursor {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            pos: None,
            released: false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl RowCursor for VecCursor {
    fn advance(&mut self) -> Result<bool, CursorError> {
        if self.released {
            return Err(CursorError::Released);
        }
        let next = self.pos.map_or(0, |p| p + 1).min(self.rows.len());
        self.pos = Some(next);
        Ok(next < self.rows.len())
    }

    fn current(&self) -> Option<&RawRow> {
        self.pos.and_then(|p| self.rows.get(p))
    }

    fn reset(&mut self) -> Result<(), CursorError> {
        if self.released {
            return Err(CursorError::Released);
        }
        self.pos = None;
        Ok(())
    }

    fn release(&mut self) {
        self.rows = Vec::new();
        self.pos = None;
        self.released = true;
    }
}

// ---------------------------------------------------------------------------
// IterCursor
// ---------------------------------------------------------------------------

/// Forward-only cursor over a fallible row stream. Cannot restart.
pub struct IterCursor<I> {
    rows: Option<I>,
    current: Option<RawRow>,
}

impl<I> IterCursor<I>
where
    I: Iterator<Item = Result<RawRow, CursorError>>,
{
    pub fn new(rows: I) -> Self {
        Self {
            rows: Some(rows),
            current: None,
        }
    }
}

impl<I> std::fmt::Debug for IterCursor<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterCursor")
            .field("released", &self.rows.is_none())
            .field("current", &self.current)
            .finish()
    }
}

impl<I> RowCursor for IterCursor<I>
where
    I: Iterator<Item = Result<RawRow, CursorError>>,
{
    fn advance(&mut self) -> Result<bool, CursorError> {
        let rows = self.rows.as_mut().ok_or(CursorError::Released)?;
        // A failed pull leaves no row current.
        self.current = None;
        self.current = rows.next().transpose()?;
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<&RawRow> {
        self.current.as_ref()
    }

    fn release(&mut self) {
        self.rows = None;
        self.current = None;
    }
}
