//! # Parser Module
//!
//! Turns timed-lyrics text into a [`Document`].
//!
//! ## Two-Pass Parsing
//!
//! ### First Pass: Lines
//! Input is split on `\n` (a preceding `\r` is dropped). Each line is one of:
//! - a directive, starting with `@`: `@Key=value`. Known keys fill
//!   [`Metadata`]; `@RubyN` lines fill ruby definition `N-1`. The line text
//!   is always kept verbatim; the parsed fields are never written back.
//! - anything else, handed to the [`lexer`](crate::lexer). A line the lexer
//!   rejects (bad time tag) is kept verbatim as text.
//!
//! ### Second Pass: Ruby
//! Every block whose word matches a ruby definition target gets its own
//! copy of the definition's segments.
//!
//! Parsing never fails. Everything unexpected is logged and kept as text.
//!
//! ## Example
//! ```rust
//! use kara::parse;
//!
//! let source = "@Title=Song\r\n@Ruby1=愛,[00:01.00]あ[00:01.50]い\r\n[00:01.00]愛[00:02.00]の";
//! let doc = parse(source);
//! assert_eq!(doc.metadata.title.as_deref(), Some("Song"));
//! assert_eq!(doc.row_count(), 1);
//! let ruby = doc.block(0, 0).unwrap().ruby.as_ref().unwrap();
//! assert_eq!(ruby[1].word, "い");
//! assert_eq!(ruby[1].time, Some(1.5));
//! ```

use crate::ast::*;
use crate::lexer::{tokenize, TextLine};
use crate::time::parse_time;
use tracing::{debug, warn};

/// Parse a whole document.
pub fn parse(source: &str) -> Document {
    let mut doc = Document::default();

    for (index, raw) in source.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let parsed = parse_line(&mut doc, line, index + 1);
        doc.lines.push(parsed);
    }

    doc.propagate_ruby();

    debug!(
        lines = doc.lines.len(),
        rows = doc.row_count(),
        ruby_definitions = doc.ruby.iter().flatten().count(),
        "Parsed document"
    );
    doc
}

fn parse_line(doc: &mut Document, line: &str, line_number: usize) -> Line {
    if line.starts_with('@') {
        return parse_directive(doc, line, line_number);
    }

    match tokenize(line, line_number, true) {
        Ok(TextLine::Blank(text)) => Line::Text(text),
        Ok(TextLine::Blocks(blocks)) => Line::Blocks(blocks),
        Ok(TextLine::Fragment(block)) => Line::Blocks(vec![block]),
        Err(e) => {
            warn!("{}; keeping the line as text", e);
            Line::Text(line.to_string())
        }
    }
}

/// Split `@Key = value` into the tag name and the value. The value keeps
/// everything after the first `=`.
fn split_directive(line: &str) -> (&str, Option<&str>) {
    let body = &line[1..];
    match body.split_once('=') {
        Some((key, value)) => (key.trim_end(), Some(value.trim_start())),
        None => (body.trim_end(), None),
    }
}

fn parse_directive(doc: &mut Document, line: &str, line_number: usize) -> Line {
    let (tag, value) = split_directive(line);
    let meta = &mut doc.metadata;

    match tag {
        "Title" => meta.title = value.map(str::to_string),
        "Artist" => meta.artist = value.map(str::to_string),
        "Album" => meta.album = value.map(str::to_string),
        "Bgfile" => meta.bgfile = value.map(str::to_string),
        "Bgfolder" => meta.bgfolder = value.map(str::to_string),
        "TimeRatio" => meta.time_ratio = parse_number(tag, value, line_number),
        "Offset" => meta.offset = parse_number(tag, value, line_number),
        "SilencemSec" => meta.silence_msec = parse_number(tag, value, line_number),
        "TaggingBy" => meta.tagging_by = value.map(str::to_string),
        "EditedBy" => meta.edited_by = value.map(str::to_string),
        "Silence" => meta.silence = parse_number(tag, value, line_number),
        "Flames" => meta.flames = parse_number(tag, value, line_number),
        "TotalSec" => meta.total_sec = parse_number(tag, value, line_number),
        "TimeType" => meta.time_type = value.map(str::to_string),
        _ => {
            if let Some(index) = ruby_index(tag) {
                return parse_ruby_directive(doc, index, value, line, line_number);
            }
            warn!(line = line_number, "Unknown tag: {}", tag);
        }
    }

    Line::Text(line.to_string())
}

fn parse_number<T: std::str::FromStr>(tag: &str, value: Option<&str>, line_number: usize) -> Option<T> {
    let value = value?.trim();
    match value.parse() {
        Ok(number) => Some(number),
        Err(_) => {
            warn!(line = line_number, "Non-numeric value '{}' for @{}", value, tag);
            None
        }
    }
}

/// `Ruby12` -> `Some(12)`; `Ruby`, `Ruby0`, `Rubyx` -> `None`.
fn ruby_index(tag: &str) -> Option<usize> {
    let digits = tag.strip_prefix("Ruby")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|&n| n >= 1)
}

fn parse_ruby_directive(
    doc: &mut Document,
    index: usize,
    value: Option<&str>,
    line: &str,
    line_number: usize,
) -> Line {
    let Some(value) = value else {
        warn!(line = line_number, "@Ruby{} has no value", index);
        return Line::Text(line.to_string());
    };

    let mut fields = value.split(',');
    let target = fields.next().unwrap_or("").to_string();
    let ruby_text = fields.next().unwrap_or("");
    let start = fields.next().unwrap_or("");
    let end = fields.next().unwrap_or("");

    let definition = RubyDefinition {
        target,
        ruby: parse_ruby_text(ruby_text, line_number),
        start: parse_time_field(start, line_number),
        end: parse_time_field(end, line_number),
    };

    if doc.ruby.len() < index {
        doc.ruby.resize(index, None);
    }
    doc.ruby[index - 1] = Some(definition);

    Line::RubyDefinition(line.to_string())
}

fn parse_ruby_text(text: &str, line_number: usize) -> Option<Vec<RubySegment>> {
    if text.is_empty() {
        return None;
    }

    let segments = match tokenize(text, line_number, false) {
        Ok(TextLine::Blocks(blocks)) => blocks.into_iter().map(RubySegment::from).collect(),
        Ok(TextLine::Fragment(block)) => vec![RubySegment::from(block)],
        Ok(TextLine::Blank(text)) => vec![RubySegment::new(text, None)],
        Err(e) => {
            warn!("{}; keeping the ruby text untimed", e);
            vec![RubySegment::new(text, None)]
        }
    };
    Some(segments)
}

/// A start/end field: `[mm:ss.cc]`, or the bare `mm:ss.cc` form.
fn parse_time_field(field: &str, line_number: usize) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }

    let time = if field.starts_with('[') {
        match tokenize(field, line_number, false) {
            Ok(TextLine::Fragment(block)) => block.time,
            _ => None,
        }
    } else {
        parse_time(field)
    };

    if time.is_none() {
        warn!(line = line_number, "Ignoring unreadable ruby time '{}'", field);
    }
    time
}
