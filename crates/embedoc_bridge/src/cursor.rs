//! Query cursors.

use crate::error::{BridgeError, BridgeResult};
use crate::registry::{ExternalHandle, HandleWrapper};
use crate::value::Value;
use embedoc_engine::{cursor_state, ResourceKind};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Position of a cursor in its result set.
///
/// States only move forward: `Initial -> HasRow* -> Exhausted | Errored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    /// Not stepped yet.
    Initial,
    /// Positioned on a row.
    HasRow,
    /// Past the last row.
    Exhausted,
    /// A step failed.
    Errored,
}

impl CursorState {
    /// Maps an engine state code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            cursor_state::INITIAL => Some(CursorState::Initial),
            cursor_state::HAS_ROW => Some(CursorState::HasRow),
            cursor_state::EXHAUSTED => Some(CursorState::Exhausted),
            cursor_state::ERRORED => Some(CursorState::Errored),
            _ => None,
        }
    }

    /// Returns true for `Exhausted` and `Errored`.
    pub fn is_terminal(self) -> bool {
        matches!(self, CursorState::Exhausted | CursorState::Errored)
    }
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CursorState::Initial => "Initial",
            CursorState::HasRow => "HasRow",
            CursorState::Exhausted => "Exhausted",
            CursorState::Errored => "Errored",
        };
        f.write_str(name)
    }
}

/// A lazy, single-pass cursor over query results.
///
/// The state is tracked on the host side. Once the cursor is terminal,
/// [`step`](Self::step) returns immediately without calling the engine.
/// Clones share both the engine cursor and its state.
#[derive(Debug, Clone)]
pub struct Cursor {
    handle: ExternalHandle,
    state: Rc<Cell<CursorState>>,
}

impl HandleWrapper for Cursor {
    const KIND: ResourceKind = ResourceKind::Cursor;

    fn wrap_unchecked(handle: ExternalHandle) -> Self {
        Self {
            handle,
            state: Rc::new(Cell::new(CursorState::Initial)),
        }
    }

    fn handle(&self) -> &ExternalHandle {
        &self.handle
    }
}

impl Cursor {
    /// Current state.
    pub fn state(&self) -> CursorState {
        self.state.get()
    }

    /// Advances one row and returns the new state.
    ///
    /// An engine failure moves the cursor to `Errored` and is returned.
    pub fn step(&self) -> BridgeResult<CursorState> {
        let current = self.state.get();
        if current.is_terminal() {
            return Ok(current);
        }
        let raw = self.raw()?;
        let registry = self.handle.registry();
        let engine = registry.engine();
        if let Err(err) = registry.check(engine.cursor_step(raw)) {
            self.state.set(CursorState::Errored);
            return Err(err);
        }
        let next = match CursorState::from_code(engine.cursor_state(raw)) {
            Some(next @ (CursorState::HasRow | CursorState::Exhausted)) => next,
            Some(CursorState::Errored) => {
                self.state.set(CursorState::Errored);
                return Err(registry.last_error("cursor errored"));
            }
            Some(CursorState::Initial) | None => {
                self.state.set(CursorState::Errored);
                return Err(BridgeError::engine("cursor reported an invalid state after step"));
            }
        };
        self.state.set(next);
        Ok(next)
    }

    /// Returns a copy of the current row, or `None` unless positioned on one.
    pub fn get(&self) -> BridgeResult<Option<Value>> {
        if self.state.get() != CursorState::HasRow {
            return Ok(None);
        }
        let registry = self.handle.registry();
        registry
            .adopt(registry.engine().cursor_current(self.raw()?), ResourceKind::Value)
            .map(|handle| Some(Value::wrap_unchecked(handle)))
    }

    /// Engine-rendered description, for diagnostics.
    pub fn to_display_string(&self) -> BridgeResult<String> {
        let registry = self.handle.registry();
        let mut out = String::new();
        registry.check(registry.engine().cursor_to_string(self.raw()?, &mut out))?;
        Ok(out)
    }

    /// Iterates over the remaining rows.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            cursor: self,
            failed: false,
        }
    }
}

/// Iterator returned by [`Cursor::rows`].
#[derive(Debug)]
pub struct Rows<'a> {
    cursor: &'a Cursor,
    failed: bool,
}

impl Iterator for Rows<'_> {
    type Item = BridgeResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let row = match self.cursor.step() {
            Ok(CursorState::HasRow) => self.cursor.get().transpose(),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        };
        if matches!(row, Some(Err(_))) {
            self.failed = true;
        }
        row
    }
}

impl std::iter::FusedIterator for Rows<'_> {}
