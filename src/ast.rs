//! # Document Model
//!
//! This module defines the in-memory form of a timed-lyrics document.
//!
//! ## Type Hierarchy
//! ```text
//! Document
//!   ├── Metadata (title, artist, album, offsets, ... all optional)
//!   ├── Vec<RubyDefinition?> (index N-1 holds @RubyN; gaps allowed)
//!   └── Vec<Line>
//!         ├── Text(String)            blank / unparseable / metadata lines, kept verbatim
//!         ├── RubyDefinition(String)  raw @RubyN source, regenerated on save
//!         └── Blocks(Vec<Block>)
//!               ├── word: String
//!               ├── time: Option<f64>
//!               └── ruby: Option<Vec<RubySegment>>
//!                     ├── word: String
//!                     └── time: Option<f64>
//! ```
//!
//! ## Key Concepts
//!
//! ### Rows
//! Only `Line::Blocks` lines take part in navigation. They are the
//! document's *rows*: row `i` is the `i`-th block line, skipping text lines.
//!
//! ### Ruby
//! A ruby definition names a target word. At parse time its segments are
//! copied onto every block whose word equals the target, so each block owns
//! its own segments and can be timed independently.
//!
//! ### Times
//! Seconds as `f64`, non-negative, with centisecond resolution in the text
//! form. `None` means "not tagged yet".

use serde::Serialize;

/// A sub-syllable phonetic annotation attached to a block.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RubySegment {
    pub word: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

impl RubySegment {
    pub fn new(word: impl Into<String>, time: Option<f64>) -> Self {
        Self {
            word: word.into(),
            time,
        }
    }
}

/// One timeable word unit within a lyric line.
///
/// The word may be empty: full lyric lines end with an empty block that
/// marks the stopping point after the last word.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Block {
    pub word: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ruby: Option<Vec<RubySegment>>,
}

impl Block {
    pub fn new(word: impl Into<String>, time: Option<f64>) -> Self {
        Self {
            word: word.into(),
            time,
            ruby: None,
        }
    }

    /// The block's ruby segments, if it has at least one.
    pub fn ruby_segments(&self) -> Option<&[RubySegment]> {
        self.ruby.as_deref().filter(|segments| !segments.is_empty())
    }

    pub fn is_sentinel(&self) -> bool {
        self.word.is_empty()
    }
}

impl From<Block> for RubySegment {
    fn from(block: Block) -> Self {
        Self {
            word: block.word,
            time: block.time,
        }
    }
}

/// A `@RubyN=target,ruby,start,end` definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RubyDefinition {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ruby: Option<Vec<RubySegment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
}

impl RubyDefinition {
    /// Whether `time` falls inside `[start, end]`; missing bounds are open.
    pub fn covers(&self, time: f64) -> bool {
        self.start.map_or(true, |start| time >= start) && self.end.map_or(true, |end| time <= end)
    }

    /// Length of the window; infinite when either bound is missing.
    pub fn width(&self) -> f64 {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end - start,
            _ => f64::INFINITY,
        }
    }
}

/// One source line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Line {
    /// Kept verbatim: blank lines, directives, lines that failed to tokenize.
    Text(String),
    /// Source text of a `@RubyN` directive. Its slot is reused when the
    /// ruby definitions are regenerated.
    RubyDefinition(String),
    /// A lyric line split into blocks.
    Blocks(Vec<Block>),
}

impl Line {
    pub fn blocks(&self) -> Option<&[Block]> {
        match self {
            Line::Blocks(blocks) => Some(blocks),
            _ => None,
        }
    }

    pub fn blocks_mut(&mut self) -> Option<&mut Vec<Block>> {
        match self {
            Line::Blocks(blocks) => Some(blocks),
            _ => None,
        }
    }
}

/// Scalar `@Key=value` metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgfile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgfolder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ratio: Option<f64>,
    /// Offset in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Silence duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_msec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagging_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flames: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_sec: Option<i64>,
    /// `WinAmp` or `Normal` in files seen in the wild.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_type: Option<String>,
}

/// A parsed lyrics document.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Document {
    pub metadata: Metadata,
    pub lines: Vec<Line>,
    /// Ruby definitions; index `N-1` holds `@RubyN`.
    pub ruby: Vec<Option<RubyDefinition>>,
}

impl Document {
    /// The block lines, in order. Text lines are skipped.
    pub fn rows(&self) -> impl Iterator<Item = &[Block]> + '_ {
        self.lines.iter().filter_map(Line::blocks)
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Vec<Block>> + '_ {
        self.lines.iter_mut().filter_map(Line::blocks_mut)
    }

    /// Collected rows, the navigable part of the document.
    pub fn data(&self) -> Vec<&[Block]> {
        self.rows().collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows().count()
    }

    pub fn row(&self, row: usize) -> Option<&[Block]> {
        self.rows().nth(row)
    }

    pub fn block(&self, row: usize, col: usize) -> Option<&Block> {
        self.row(row).and_then(|blocks| blocks.get(col))
    }

    pub fn block_mut(&mut self, row: usize, col: usize) -> Option<&mut Block> {
        self.rows_mut().nth(row).and_then(|blocks| blocks.get_mut(col))
    }

    /// Find the ruby definition for a word.
    ///
    /// Among the definitions for `word` whose `[start, end]` window covers
    /// `time`, the narrowest wins, earlier definitions breaking ties.
    /// Untimed blocks, or times no window covers, take the first definition
    /// for the word.
    pub fn find_ruby(&self, word: &str, time: Option<f64>) -> Option<&RubyDefinition> {
        let candidates = || self.ruby.iter().flatten().filter(move |def| def.target == word);
        time.and_then(|t| {
            candidates()
                .filter(|def| def.covers(t))
                .min_by(|a, b| a.width().total_cmp(&b.width()))
        })
        .or_else(|| candidates().next())
    }

    /// Copy each matching definition's segments onto its blocks.
    pub(crate) fn propagate_ruby(&mut self) {
        let resolved: Vec<Vec<Option<Vec<RubySegment>>>> = self
            .rows()
            .map(|blocks| {
                blocks
                    .iter()
                    .map(|block| {
                        self.find_ruby(&block.word, block.time)
                            .and_then(|def| def.ruby.clone())
                    })
                    .collect()
            })
            .collect();

        for (blocks, ruby_row) in self.rows_mut().zip(resolved) {
            for (block, ruby) in blocks.iter_mut().zip(ruby_row) {
                if ruby.is_some() {
                    block.ruby = ruby;
                }
            }
        }
    }

    /// Replace the stored ruby definitions with ones recomputed from the
    /// current block state.
    pub fn refresh_ruby_definitions(&mut self) {
        self.ruby = crate::serializer::collect_ruby_definitions(self)
            .into_iter()
            .map(Some)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document {
            metadata: Metadata::default(),
            lines: vec![
                Line::Text("@Title=x".to_string()),
                Line::Blocks(vec![Block::new("a", Some(1.0)), Block::new("", None)]),
                Line::Text(String::new()),
                Line::Blocks(vec![Block::new("b", None)]),
            ],
            ruby: Vec::new(),
        }
    }

    #[test]
    fn test_rows_skip_text_lines() {
        let doc = sample();
        assert_eq!(doc.row_count(), 2);
        assert_eq!(doc.data()[1][0].word, "b");
        assert_eq!(doc.block(0, 0).map(|b| b.time), Some(Some(1.0)));
        assert!(doc.block(2, 0).is_none());
    }

    #[test]
    fn test_block_mut_reaches_row() {
        let mut doc = sample();
        doc.block_mut(1, 0).unwrap().time = Some(4.0);
        assert_eq!(doc.block(1, 0).unwrap().time, Some(4.0));
    }

    #[test]
    fn test_find_ruby_first_match() {
        let mut doc = sample();
        doc.ruby = vec![
            None,
            Some(RubyDefinition {
                target: "a".to_string(),
                ruby: Some(vec![RubySegment::new("x", None)]),
                ..Default::default()
            }),
            Some(RubyDefinition {
                target: "a".to_string(),
                ruby: Some(vec![RubySegment::new("y", None)]),
                ..Default::default()
            }),
        ];
        let def = doc.find_ruby("a", None).unwrap();
        assert_eq!(def.ruby.as_ref().unwrap()[0].word, "x");
        assert!(doc.find_ruby("zzz", None).is_none());
    }

    #[test]
    fn test_find_ruby_uses_time_window() {
        let mut doc = sample();
        doc.ruby = vec![
            Some(RubyDefinition {
                target: "a".to_string(),
                ruby: Some(vec![RubySegment::new("x", None)]),
                start: None,
                end: Some(5.0),
            }),
            Some(RubyDefinition {
                target: "a".to_string(),
                ruby: Some(vec![RubySegment::new("y", None)]),
                start: Some(10.0),
                end: None,
            }),
        ];
        let word_at = |t: Option<f64>| doc.find_ruby("a", t).unwrap().ruby.as_ref().unwrap()[0].word.clone();
        assert_eq!(word_at(Some(2.0)), "x");
        assert_eq!(word_at(Some(12.0)), "y");
        assert_eq!(word_at(Some(7.0)), "x");
        assert_eq!(word_at(None), "x");
    }

    #[test]
    fn test_find_ruby_prefers_narrowest_window() {
        let def = |ruby: &str, start: Option<f64>, end: Option<f64>| {
            Some(RubyDefinition {
                target: "a".to_string(),
                ruby: Some(vec![RubySegment::new(ruby, None)]),
                start,
                end,
            })
        };
        let mut doc = sample();
        doc.ruby = vec![
            def("x", None, None),
            def("y", Some(1.0), Some(9.0)),
            def("z", Some(4.0), Some(4.0)),
            def("w", Some(4.0), Some(4.0)),
        ];
        let word_at = |t: Option<f64>| doc.find_ruby("a", t).unwrap().ruby.as_ref().unwrap()[0].word.clone();
        assert_eq!(word_at(Some(4.0)), "z");
        assert_eq!(word_at(Some(2.0)), "y");
        assert_eq!(word_at(Some(12.0)), "x");
        assert_eq!(word_at(None), "x");
    }

    #[test]
    fn test_ruby_segments_ignores_empty() {
        let mut block = Block::new("a", None);
        assert!(block.ruby_segments().is_none());
        block.ruby = Some(Vec::new());
        assert!(block.ruby_segments().is_none());
        block.ruby = Some(vec![RubySegment::new("x", None)]);
        assert_eq!(block.ruby_segments().map(|s| s.len()), Some(1));
    }
}
