//! # Serializer
//!
//! Writes a [`Document`] back to the timed-lyrics text format.
//!
//! Block lines are rebuilt from their blocks (`[mm:ss.cc]word` or `word`).
//! Text lines are written verbatim. Ruby definitions are not taken from the
//! document's stored list: they are recomputed from the segments currently
//! attached to blocks (see [`collect_ruby_definitions`]) and written into the
//! slots the parsed `@RubyN` lines occupied, in order. Extra definitions go
//! after the last line; unused slots are left empty so line positions
//! do not shift. Lines are joined with CRLF.

use crate::ast::*;
use crate::time::format_time_tag;
use std::collections::HashMap;
use tracing::warn;

/// Serialize a document to text.
///
/// # Example
/// ```rust
/// use kara::{parse, serialize};
///
/// let doc = parse("@Title=Song\n[00:01.00]Hello [00:02.50]World");
/// assert_eq!(serialize(&doc), "@Title=Song\r\n[00:01.00]Hello [00:02.50]World");
/// ```
pub fn serialize(doc: &Document) -> String {
    let mut out: Vec<String> = Vec::with_capacity(doc.lines.len());
    let mut ruby_slots: Vec<usize> = Vec::new();

    for line in &doc.lines {
        match line {
            Line::Blocks(blocks) => out.push(render_blocks(blocks)),
            Line::Text(text) => out.push(text.clone()),
            Line::RubyDefinition(_) => {
                ruby_slots.push(out.len());
                out.push(String::new());
            }
        }
    }

    let mut slots = ruby_slots.iter();
    let mut extra = Vec::new();
    for (n, def) in collect_ruby_definitions(doc).iter().enumerate() {
        let rendered = render_ruby_definition(n + 1, def);
        match slots.next() {
            Some(&slot) => out[slot] = rendered,
            None => extra.push(rendered),
        }
    }

    // unused slots stay as empty lines
    out.extend(extra);
    out.join("\r\n")
}

fn render_timed(word: &str, time: Option<f64>, out: &mut String) {
    if let Some(time) = time {
        out.push_str(&format_time_tag(time));
    }
    out.push_str(word);
}

/// Render blocks as `[mm:ss.cc]word` runs.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        render_timed(&block.word, block.time, &mut out);
    }
    out
}

/// Render ruby segments the same way as blocks.
pub fn render_segments(segments: &[RubySegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        render_timed(&segment.word, segment.time, &mut out);
    }
    out
}

/// Render `@RubyN=target,ruby,start,end`, dropping unset trailing fields.
pub fn render_ruby_definition(n: usize, def: &RubyDefinition) -> String {
    let mut fields = vec![
        Some(def.target.clone()),
        def.ruby.as_deref().map(render_segments),
        def.start.map(format_time_tag),
        def.end.map(format_time_tag),
    ];
    while matches!(fields.last(), Some(None)) {
        fields.pop();
    }
    let value: Vec<String> = fields.into_iter().map(Option::unwrap_or_default).collect();
    format!("@Ruby{}={}", n, value.join(","))
}

/// Recompute ruby definitions from the blocks.
///
/// Words are taken in order of first appearance. Each word's first definition
/// is unbounded and carries the ruby of its untimed blocks, or of its first
/// block when every block is timed. Timed blocks are then sorted by time and
/// split into runs of identical segments. A run whose segments differ from
/// the word's first definition gets its own definition, windowed to the
/// `[start, end]` of its block times. Runs are contiguous in time, so no
/// window covers a block of another run, and [`Document::find_ruby`] takes
/// the tightest covering window.
pub fn collect_ruby_definitions(doc: &Document) -> Vec<RubyDefinition> {
    // word -> annotated blocks in document order
    let mut words: Vec<(&str, Vec<&Block>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for block in doc.rows().flatten() {
        if block.ruby.is_none() {
            continue;
        }
        let slot = *index.entry(block.word.as_str()).or_insert_with(|| {
            words.push((block.word.as_str(), Vec::new()));
            words.len() - 1
        });
        words[slot].1.push(block);
    }

    let mut defs = Vec::new();
    for (word, blocks) in words {
        let mut untimed = blocks.iter().filter(|b| b.time.is_none());
        let Some(base) = untimed.next().or_else(|| blocks.first()) else {
            continue;
        };
        if untimed.any(|b| b.ruby != base.ruby) {
            warn!(word, "Untimed blocks carry different ruby; keeping the first");
        }
        defs.push(RubyDefinition {
            target: word.to_string(),
            ruby: base.ruby.clone(),
            start: None,
            end: None,
        });

        let mut timed: Vec<(f64, &Vec<RubySegment>)> = blocks
            .iter()
            .filter_map(|b| Some((b.time?, b.ruby.as_ref()?)))
            .collect();
        timed.sort_by(|a, b| a.0.total_cmp(&b.0));

        // (start, end, segments)
        let mut runs: Vec<(f64, f64, &Vec<RubySegment>)> = Vec::new();
        for (time, ruby) in timed {
            match runs.last_mut() {
                Some(run) if run.2 == ruby => run.1 = time,
                _ => runs.push((time, time, ruby)),
            }
        }

        for (start, end, ruby) in runs {
            if base.ruby.as_ref() == Some(ruby) {
                continue;
            }
            defs.push(RubyDefinition {
                target: word.to_string(),
                ruby: Some(ruby.clone()),
                start: Some(start),
                end: Some(end),
            });
        }
    }

    defs
}
