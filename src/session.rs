//! # Editing Session
//!
//! A [`Session`] owns everything one editor window works on: the loaded
//! [`Document`], the [`Cursor`] over it and the [`BlinkScheduler`] that keeps
//! the active position blinking. All mutation goes through the session on a
//! single thread, one discrete user action at a time.
//!
//! ## Lifecycle
//! Loading a document cancels any pending blink tick before the old document
//! is dropped, resets the cursor to `(0, 0, 0)`, restarts blinking and fires
//! the document-changed notification. Dropping the session cancels the
//! pending tick.
//!
//! ## Commands
//! Navigation and timestamp recording are available as methods and as
//! [`Command`] values. Commands parse from a one-line script syntax:
//!
//! | Script               | Command |
//! |----------------------|---------|
//! | `left` `right` `up` `down` | move the cursor |
//! | `select R C [I]`     | jump to row `R`, column `C`, ruby index `I` |
//! | `record T`           | record `T` (seconds or `mm:ss.cc`) at the cursor |
//! | `toggle-ruby`        | flip ruby mode |
//! | `ruby on` / `ruby off` | set ruby mode |
//!
//! ## Example
//! ```rust
//! use kara::{EditorConfig, ManualTimerHost, Session};
//!
//! let mut session = Session::new(EditorConfig::default(), ManualTimerHost::new());
//! session.load_text("Hello World");
//! session.record_timestamp(1.0).unwrap();
//! session.record_timestamp(2.5).unwrap();
//! let text = session.export_text().unwrap();
//! assert_eq!(text, "[00:01.00]Hello [00:02.50]World");
//! ```

use crate::ast::Document;
use crate::config::EditorConfig;
use crate::cursor::{Cursor, CursorPosition, Selection};
use crate::emitter::{Emitter, SubscriptionId};
use crate::encoding;
use crate::error::KaraError;
use crate::parser::parse;
use crate::scheduler::{BlinkFrame, BlinkScheduler, ManualTimerHost, TimerHost, TimerId};
use crate::serializer::serialize;
use crate::time::parse_time;
use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Longest `wait` a script may ask for: one day.
const MAX_WAIT_SECS: f64 = 86_400.0;

/// A keyboard-level editing command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Select {
        row: usize,
        col: usize,
        ruby_index: usize,
    },
    /// Record a timestamp in seconds at the cursor.
    Record(f64),
    ToggleRuby,
    SetRuby(bool),
}

impl FromStr for Command {
    type Err = KaraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| KaraError::Command {
            input: s.trim().to_string(),
            message: message.to_string(),
        };
        let mut words = s.split_whitespace();
        let name = words.next().ok_or_else(|| invalid("Empty command"))?;
        let args: Vec<&str> = words.collect();

        let command = match (name, args.as_slice()) {
            ("left", []) => Command::MoveLeft,
            ("right", []) => Command::MoveRight,
            ("up", []) => Command::MoveUp,
            ("down", []) => Command::MoveDown,
            ("toggle-ruby", []) => Command::ToggleRuby,
            ("ruby", ["on"]) => Command::SetRuby(true),
            ("ruby", ["off"]) => Command::SetRuby(false),
            ("ruby", _) => return Err(invalid("Expected 'ruby on' or 'ruby off'")),
            ("select", [row, col]) | ("select", [row, col, _]) => {
                let index = |value: &str| {
                    value
                        .parse::<usize>()
                        .map_err(|_| invalid("Positions must be non-negative integers"))
                };
                Command::Select {
                    row: index(*row)?,
                    col: index(*col)?,
                    ruby_index: match args.get(2) {
                        Some(ruby) => index(*ruby)?,
                        None => 0,
                    },
                }
            }
            ("select", _) => return Err(invalid("Usage: select ROW COL [RUBY]")),
            ("record", [value]) => {
                Command::Record(parse_seconds(value).ok_or_else(|| invalid("Expected seconds or mm:ss.cc"))?)
            }
            ("record", _) => return Err(invalid("Usage: record SECONDS")),
            ("left" | "right" | "up" | "down" | "toggle-ruby", _) => {
                return Err(invalid("Command takes no arguments"));
            }
            _ => return Err(invalid("Unknown command")),
        };
        Ok(command)
    }
}

/// Seconds as a plain number or `mm:ss.cc`.
fn parse_seconds(value: &str) -> Option<f64> {
    let seconds = if value.contains(':') {
        parse_time(value)?
    } else {
        value.parse::<f64>().ok()?
    };
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

/// Where a recorded timestamp went.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordedTarget {
    Block { row: usize, col: usize },
    Ruby { row: usize, col: usize, ruby_index: usize },
}

/// Result of [`Session::execute`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandOutcome {
    /// A navigation command; `false` when the cursor did not move.
    Moved(bool),
    /// `None` when the document has no blocks to time.
    Recorded(Option<RecordedTarget>),
    RubyMode(bool),
}

pub struct Session<H: TimerHost + 'static> {
    config: EditorConfig,
    encoding: String,
    document: Option<Document>,
    cursor: Cursor,
    blink: Rc<RefCell<BlinkScheduler<H>>>,
    on_did_change_document: Emitter<()>,
}

impl<H: TimerHost + 'static> Session<H> {
    pub fn new(config: EditorConfig, host: H) -> Self {
        let blink = Rc::new(RefCell::new(BlinkScheduler::new(host, config.blink_interval())));
        let mut cursor = Cursor::new(config.enable_ruby);

        let observer = Rc::clone(&blink);
        cursor.on_did_change(move |position| observer.borrow_mut().restart(*position));
        let observer = Rc::clone(&blink);
        cursor.on_did_change_ruby_mode(move |_| {
            let mut blink = observer.borrow_mut();
            if let Some(target) = blink.target() {
                blink.restart(target);
            }
        });

        Self {
            encoding: config.encoding.clone(),
            config,
            document: None,
            cursor,
            blink,
            on_did_change_document: Emitter::new(),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The declared encoding used by [`Session::export_document`].
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn set_encoding(&mut self, label: &str) -> Result<(), KaraError> {
        encoding::lookup(label)?;
        self.encoding = label.to_string();
        Ok(())
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn position(&self) -> CursorPosition {
        self.cursor.position()
    }

    pub fn ruby_mode(&self) -> bool {
        self.cursor.enable_ruby()
    }

    pub fn on_did_change<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&CursorPosition) + 'static,
    {
        self.cursor.on_did_change(listener)
    }

    pub fn on_did_change_ruby_mode<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&bool) + 'static,
    {
        self.cursor.on_did_change_ruby_mode(listener)
    }

    pub fn on_did_change_document<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&()) + 'static,
    {
        self.on_did_change_document.subscribe(listener)
    }

    pub fn off_did_change(&mut self, id: SubscriptionId) -> bool {
        self.cursor.off_did_change(id)
    }

    pub fn off_did_change_ruby_mode(&mut self, id: SubscriptionId) -> bool {
        self.cursor.off_did_change_ruby_mode(id)
    }

    pub fn off_did_change_document(&mut self, id: SubscriptionId) -> bool {
        self.on_did_change_document.unsubscribe(id)
    }

    pub fn off_render(&mut self, id: SubscriptionId) -> bool {
        self.blink.borrow_mut().unsubscribe(id)
    }

    /// Blink frames for the active position.
    pub fn on_render<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&BlinkFrame) + 'static,
    {
        self.blink.borrow_mut().on_render(listener)
    }

    /// Deliver a timer tick from the host.
    pub fn fire_timer(&mut self, id: TimerId) -> bool {
        self.blink.borrow_mut().fire(id)
    }

    pub fn is_blinking(&self) -> bool {
        self.blink.borrow().is_pending()
    }

    /// Decode and load a document, replacing the current one. `label` becomes
    /// the session's declared encoding.
    pub fn load_document(&mut self, bytes: &[u8], label: &str) -> Result<(), KaraError> {
        let text = encoding::decode(bytes, label)?;
        self.encoding = label.to_string();
        self.load_text(&text);
        Ok(())
    }

    pub fn load_text(&mut self, text: &str) {
        self.blink.borrow_mut().cancel();
        let document = parse(text);
        info!(rows = document.row_count(), "Loaded document");
        self.document = Some(document);

        if !self.cursor.reset() {
            let position = self.cursor.position();
            self.blink.borrow_mut().restart(position);
        }
        self.on_did_change_document.fire(&());
    }

    /// Serialize the current document with freshly computed ruby
    /// definitions.
    pub fn export_text(&mut self) -> Result<String, KaraError> {
        let document = self.document.as_mut().ok_or(KaraError::NoDocument)?;
        document.refresh_ruby_definitions();
        Ok(serialize(document))
    }

    /// [`Session::export_text`], encoded with the declared encoding.
    pub fn export_document(&mut self) -> Result<Vec<u8>, KaraError> {
        let text = self.export_text()?;
        encoding::encode(&text, &self.encoding)
    }

    fn loaded(&self) -> Result<&Document, KaraError> {
        self.document.as_ref().ok_or(KaraError::NoDocument)
    }

    pub fn move_left(&mut self) -> Result<bool, KaraError> {
        let document = self.document.as_ref().ok_or(KaraError::NoDocument)?;
        Ok(self.cursor.left(document))
    }

    pub fn move_right(&mut self) -> Result<bool, KaraError> {
        let document = self.document.as_ref().ok_or(KaraError::NoDocument)?;
        Ok(self.cursor.right(document))
    }

    pub fn move_up(&mut self) -> Result<bool, KaraError> {
        let document = self.document.as_ref().ok_or(KaraError::NoDocument)?;
        Ok(self.cursor.up(document))
    }

    pub fn move_down(&mut self) -> Result<bool, KaraError> {
        let document = self.document.as_ref().ok_or(KaraError::NoDocument)?;
        Ok(self.cursor.down(document))
    }

    pub fn select(&mut self, row: usize, col: usize, ruby_index: usize) -> Result<bool, KaraError> {
        let document = self.document.as_ref().ok_or(KaraError::NoDocument)?;
        Ok(self.cursor.set(document, row, col, ruby_index))
    }

    pub fn set_ruby_mode(&mut self, enable: bool) -> bool {
        self.cursor.set_enable_ruby(enable)
    }

    /// Returns the new mode.
    pub fn toggle_ruby_mode(&mut self) -> bool {
        self.cursor.toggle_ruby();
        self.cursor.enable_ruby()
    }

    pub fn current_selection(&self) -> Result<Option<Selection<'_>>, KaraError> {
        let document = self.loaded()?;
        Ok(self.cursor.selection(document))
    }

    /// Record `seconds` at the cursor.
    ///
    /// Outside ruby mode, or on a block without ruby, the block's time is
    /// set. In ruby mode the selected segment is timed relative to its
    /// block's start; recording on the first segment also sets the block's
    /// time. The cursor then moves right if `advance-on-record` is set.
    pub fn record_timestamp(&mut self, seconds: f64) -> Result<Option<RecordedTarget>, KaraError> {
        let CursorPosition { row, col, ruby_index } = self.cursor.position();
        let enable_ruby = self.cursor.enable_ruby();
        let document = self.document.as_mut().ok_or(KaraError::NoDocument)?;
        let Some(block) = document.block_mut(row, col) else {
            return Ok(None);
        };

        let target = if enable_ruby && block.ruby_segments().is_some() {
            if ruby_index == 0 {
                block.time = Some(seconds);
            }
            let relative = match block.time {
                Some(start) => seconds - start,
                None => seconds,
            };
            if let Some(segment) = block.ruby.as_mut().and_then(|ruby| ruby.get_mut(ruby_index)) {
                segment.time = Some(relative);
            }
            RecordedTarget::Ruby { row, col, ruby_index }
        } else {
            block.time = Some(seconds);
            RecordedTarget::Block { row, col }
        };
        debug!(row, col, ruby_index, seconds, "Recorded timestamp");

        if self.config.advance_on_record {
            self.move_right()?;
        }
        Ok(Some(target))
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandOutcome, KaraError> {
        let outcome = match command {
            Command::MoveLeft => CommandOutcome::Moved(self.move_left()?),
            Command::MoveRight => CommandOutcome::Moved(self.move_right()?),
            Command::MoveUp => CommandOutcome::Moved(self.move_up()?),
            Command::MoveDown => CommandOutcome::Moved(self.move_down()?),
            Command::Select { row, col, ruby_index } => {
                CommandOutcome::Moved(self.select(row, col, ruby_index)?)
            }
            Command::Record(seconds) => CommandOutcome::Recorded(self.record_timestamp(seconds)?),
            Command::ToggleRuby => CommandOutcome::RubyMode(self.toggle_ruby_mode()),
            Command::SetRuby(enable) => {
                self.set_ruby_mode(enable);
                CommandOutcome::RubyMode(enable)
            }
        };
        Ok(outcome)
    }
}

impl Session<ManualTimerHost> {
    /// Advance the virtual blink clock. Returns the number of ticks
    /// delivered.
    pub fn advance_clock(&mut self, by: Duration) -> usize {
        self.blink.borrow_mut().advance(by)
    }

    /// Run a command script: one command per line, blank lines and `#`
    /// comments ignored, `wait SECONDS` advances the blink clock. Returns
    /// the number of commands executed.
    pub fn run_script(&mut self, script: &str) -> Result<usize, KaraError> {
        let mut executed = 0;
        for line in script.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            if let Some(value) = line.strip_prefix("wait ") {
                let wait = parse_seconds(value.trim())
                    .filter(|&seconds| seconds <= MAX_WAIT_SECS)
                    .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
                    .ok_or_else(|| KaraError::Command {
                        input: line.to_string(),
                        message: format!("Expected seconds to wait, at most {}", MAX_WAIT_SECS),
                    })?;
                self.advance_clock(wait);
                continue;
            }
            self.execute(line.parse()?)?;
            executed += 1;
        }
        Ok(executed)
    }
}

impl<H: TimerHost + 'static> Drop for Session<H> {
    fn drop(&mut self) {
        if let Ok(mut blink) = self.blink.try_borrow_mut() {
            blink.cancel();
        }
    }
}
