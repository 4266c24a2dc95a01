//! # Cursor Navigation
//!
//! The cursor walks the document's rows block by block and, with ruby mode
//! on, through the ruby segments of each block.
//!
//! ## State
//! `(row, col, ruby_index)` plus the ruby-mode flag. `row` indexes the block
//! lines only (see [`Document::rows`]). `ruby_index` is kept at 0 unless ruby
//! mode is on and the block under the cursor has ruby segments.
//!
//! ## Movement
//! - `right`: next ruby segment, else next block, else first block of the
//!   next row.
//! - `left`: previous ruby segment, else previous block (entering its ruby
//!   from the last segment), else last block of the previous row.
//! - `up` / `down`: same column clamped to the target row, ruby index 0.
//!
//! Every move returns `false` and leaves the state alone at a boundary.
//! Successful moves fire [`Cursor::on_did_change`] listeners; switching ruby
//! mode fires [`Cursor::on_did_change_ruby_mode`] listeners.
//!
//! The cursor does not hold the document. Operations take it by reference,
//! which keeps recording timestamps (a `&mut Document` operation) free of
//! aliasing.
//!
//! ## Example
//! ```rust
//! use kara::{parse, Cursor};
//!
//! let doc = parse("[00:01.00]Hello [00:02.50]World");
//! let mut cursor = Cursor::new(false);
//! assert!(cursor.right(&doc));
//! assert_eq!((cursor.row(), cursor.col(), cursor.ruby_index()), (0, 1, 0));
//! ```

use crate::ast::{Block, Document, RubySegment};
use crate::emitter::{Emitter, SubscriptionId};
use serde::Serialize;
use tracing::trace;

/// Payload of position-change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPosition {
    pub row: usize,
    pub col: usize,
    pub ruby_index: usize,
}

impl CursorPosition {
    pub fn new(row: usize, col: usize, ruby_index: usize) -> Self {
        Self { row, col, ruby_index }
    }
}

/// What the cursor currently points at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'a> {
    /// A block, when ruby mode is off or the block has no ruby.
    Block(&'a Block),
    /// A ruby segment of `block`.
    Ruby {
        block: &'a Block,
        segment: &'a RubySegment,
        index: usize,
    },
}

impl<'a> Selection<'a> {
    pub fn block(&self) -> &'a Block {
        match *self {
            Selection::Block(block) => block,
            Selection::Ruby { block, .. } => block,
        }
    }

    pub fn ruby(&self) -> Option<&'a RubySegment> {
        match *self {
            Selection::Block(_) => None,
            Selection::Ruby { segment, .. } => Some(segment),
        }
    }

    /// Time of the selected item: the segment's if a segment is selected,
    /// else the block's.
    pub fn time(&self) -> Option<f64> {
        match *self {
            Selection::Block(block) => block.time,
            Selection::Ruby { segment, .. } => segment.time,
        }
    }
}

/// Navigation state over a document's rows.
#[derive(Debug, Default)]
pub struct Cursor {
    row: usize,
    col: usize,
    ruby_index: usize,
    enable_ruby: bool,
    on_did_change: Emitter<CursorPosition>,
    on_did_change_ruby_mode: Emitter<bool>,
}

impl Cursor {
    pub fn new(enable_ruby: bool) -> Self {
        Self {
            enable_ruby,
            ..Default::default()
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn ruby_index(&self) -> usize {
        self.ruby_index
    }

    pub fn enable_ruby(&self) -> bool {
        self.enable_ruby
    }

    pub fn position(&self) -> CursorPosition {
        CursorPosition::new(self.row, self.col, self.ruby_index)
    }

    /// Listen for position changes.
    pub fn on_did_change<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&CursorPosition) + 'static,
    {
        self.on_did_change.subscribe(listener)
    }

    /// Listen for ruby-mode changes.
    pub fn on_did_change_ruby_mode<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&bool) + 'static,
    {
        self.on_did_change_ruby_mode.subscribe(listener)
    }

    pub fn off_did_change(&mut self, id: SubscriptionId) -> bool {
        self.on_did_change.unsubscribe(id)
    }

    pub fn off_did_change_ruby_mode(&mut self, id: SubscriptionId) -> bool {
        self.on_did_change_ruby_mode.unsubscribe(id)
    }

    /// Ruby segments of `block` when ruby mode applies to it.
    fn ruby_scope<'d>(&self, block: &'d Block) -> Option<&'d [RubySegment]> {
        if self.enable_ruby {
            block.ruby_segments()
        } else {
            None
        }
    }

    fn current_block<'d>(&self, doc: &'d Document) -> Option<&'d Block> {
        doc.block(self.row, self.col)
    }

    fn changed(&mut self) {
        let position = self.position();
        trace!(row = position.row, col = position.col, ruby_index = position.ruby_index, "Cursor moved");
        self.on_did_change.fire(&position);
    }

    fn move_to(&mut self, row: usize, col: usize, ruby_index: usize) -> bool {
        if (self.row, self.col, self.ruby_index) == (row, col, ruby_index) {
            return false;
        }
        self.row = row;
        self.col = col;
        self.ruby_index = ruby_index;
        self.changed();
        true
    }

    pub fn up(&mut self, doc: &Document) -> bool {
        if self.row == 0 {
            return false;
        }
        let Some(target) = doc.row(self.row - 1) else {
            return false;
        };
        let col = self.col.min(target.len().saturating_sub(1));
        self.move_to(self.row - 1, col, 0)
    }

    pub fn down(&mut self, doc: &Document) -> bool {
        let Some(target) = doc.row(self.row + 1) else {
            return false;
        };
        let col = self.col.min(target.len().saturating_sub(1));
        self.move_to(self.row + 1, col, 0)
    }

    pub fn right(&mut self, doc: &Document) -> bool {
        let Some(row) = doc.row(self.row) else {
            return false;
        };

        if let Some(segments) = row.get(self.col).and_then(|block| self.ruby_scope(block)) {
            if self.ruby_index + 1 < segments.len() {
                return self.move_to(self.row, self.col, self.ruby_index + 1);
            }
        }

        if self.col + 1 < row.len() {
            self.move_to(self.row, self.col + 1, 0)
        } else if doc.row(self.row + 1).is_some() {
            self.move_to(self.row + 1, 0, 0)
        } else {
            false
        }
    }

    pub fn left(&mut self, doc: &Document) -> bool {
        let Some(row) = doc.row(self.row) else {
            return false;
        };

        let in_ruby = row
            .get(self.col)
            .and_then(|block| self.ruby_scope(block))
            .is_some();
        if in_ruby && self.ruby_index > 0 {
            return self.move_to(self.row, self.col, self.ruby_index - 1);
        }

        if self.col > 0 {
            let col = self.col - 1;
            let ruby_index = row
                .get(col)
                .and_then(|block| self.ruby_scope(block))
                .map_or(0, |segments| segments.len() - 1);
            self.move_to(self.row, col, ruby_index)
        } else if self.row > 0 {
            let Some(previous) = doc.row(self.row - 1) else {
                return false;
            };
            self.move_to(self.row - 1, previous.len().saturating_sub(1), 0)
        } else {
            false
        }
    }

    /// Absolute repositioning, e.g. from a click. Coordinates are clamped
    /// into the document; listeners fire only if something changed.
    pub fn set(&mut self, doc: &Document, row: usize, col: usize, ruby_index: usize) -> bool {
        let rows = doc.row_count();
        if rows == 0 {
            return self.move_to(0, 0, 0);
        }
        let row = row.min(rows - 1);
        let blocks = doc.row(row).unwrap_or(&[]);
        let col = col.min(blocks.len().saturating_sub(1));
        let ruby_index = blocks
            .get(col)
            .and_then(|block| self.ruby_scope(block))
            .map_or(0, |segments| ruby_index.min(segments.len() - 1));
        self.move_to(row, col, ruby_index)
    }

    /// Back to `(0, 0, 0)`.
    pub fn reset(&mut self) -> bool {
        self.move_to(0, 0, 0)
    }

    /// Switch ruby mode. Turning it off moves the cursor out of any ruby
    /// segment, firing a position change as well when that moves it.
    pub fn set_enable_ruby(&mut self, value: bool) -> bool {
        if self.enable_ruby == value {
            return false;
        }
        self.enable_ruby = value;
        trace!(enable_ruby = value, "Ruby mode changed");
        self.on_did_change_ruby_mode.fire(&value);
        if !value && self.ruby_index != 0 {
            self.ruby_index = 0;
            self.changed();
        }
        true
    }

    pub fn toggle_ruby(&mut self) -> bool {
        self.set_enable_ruby(!self.enable_ruby)
    }

    /// The block under the cursor, and the ruby segment when ruby mode
    /// applies. `None` for an empty document.
    pub fn selection<'d>(&self, doc: &'d Document) -> Option<Selection<'d>> {
        let block = self.current_block(doc)?;
        match self.ruby_scope(block) {
            Some(segments) => {
                let index = self.ruby_index.min(segments.len() - 1);
                Some(Selection::Ruby {
                    block,
                    segment: &segments[index],
                    index,
                })
            }
            None => Some(Selection::Block(block)),
        }
    }
}
