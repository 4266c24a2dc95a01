//! # Lexer
//!
//! Splits one lyric line (or a fragment of a directive value) into timed
//! blocks in a single left-to-right pass.
//!
//! ## Rules
//! - `[` opens a time tag that runs to `]`. Only digits, `:` and `.` may
//!   appear inside and there must be a `:`. Anything else is an error for
//!   the whole line. A completed tag becomes the pending time of the next
//!   block. Opening a tag also ends the word being built, so a tag always
//!   starts a new block.
//! - A space is appended to the word being built. Trailing spaces stay
//!   with their word (`"Hello "`); a leading run of spaces becomes a block
//!   of its own.
//! - A printable ASCII character ends a word that already ends in a space,
//!   then starts or extends the current word.
//! - Any other character (non-ASCII, control) ends the current word and is
//!   emitted as a single-character block. Ideographs and kana are timed one
//!   character at a time.
//! - At the end, a word that is not whitespace-only is emitted. Full lyric
//!   lines then get an empty end-of-line block carrying any leftover
//!   pending time.
//! - If nothing was emitted the input collapses to a single fragment block
//!   holding the whitespace (or nothing) and the pending time; this is how
//!   `[00:12.00]` on its own reads as a bare time.
//!
//! ## Example
//! ```rust
//! use kara::lexer::{tokenize, TextLine};
//!
//! let TextLine::Blocks(blocks) = tokenize("[00:01.00]Hello [00:02.50]World", 1, true).unwrap() else {
//!     panic!("expected blocks");
//! };
//! assert_eq!(blocks.len(), 3);
//! assert_eq!(blocks[0].word, "Hello ");
//! assert_eq!(blocks[1].time, Some(2.5));
//! assert!(blocks[2].word.is_empty());
//! ```

use crate::ast::Block;
use crate::error::KaraError;
use crate::time::parse_time;

/// Result of tokenizing one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub enum TextLine {
    /// Empty or whitespace-only input, kept as is.
    Blank(String),
    /// One or more blocks.
    Blocks(Vec<Block>),
    /// No block was produced: the leftover whitespace and pending time.
    Fragment(Block),
}

/// Lexer for one line of lyric text
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::str::Chars<'a>,
    line: usize,
    column: usize,
    word: String,
    pending_time: Option<f64>,
    blocks: Vec<Block>,
}

impl<'a> Lexer<'a> {
    /// `line` is only used for error positions.
    pub fn new(input: &'a str, line: usize) -> Self {
        Self {
            input,
            chars: input.chars(),
            line,
            column: 0,
            word: String::new(),
            pending_time: None,
            blocks: Vec::new(),
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.column += 1;
        Some(c)
    }

    fn flush(&mut self) {
        let word = std::mem::take(&mut self.word);
        self.blocks.push(Block::new(word, self.pending_time.take()));
    }

    fn error(&self, column: usize, message: String) -> KaraError {
        KaraError::TimeTag {
            line: self.line,
            column,
            message,
        }
    }

    fn read_time_tag(&mut self) -> Result<(), KaraError> {
        let start_column = self.column;
        let mut tag = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(self.error(start_column, "Unterminated time tag".to_string()));
                }
                Some(']') => break,
                Some(c) if c.is_ascii_digit() || c == ':' || c == '.' => tag.push(c),
                Some(c) => {
                    return Err(self.error(
                        self.column,
                        format!("Invalid character '{}' in time tag", c),
                    ));
                }
            }
        }

        if !tag.contains(':') {
            return Err(self.error(start_column, format!("Time tag '[{}]' has no ':'", tag)));
        }

        let time = parse_time(&tag)
            .ok_or_else(|| self.error(start_column, format!("Unreadable time tag '[{}]'", tag)))?;
        self.pending_time = Some(time);
        Ok(())
    }

    /// Tokenize the input. `end_of_line_marker` appends the empty closing
    /// block used by full lyric lines.
    pub fn tokenize(mut self, end_of_line_marker: bool) -> Result<TextLine, KaraError> {
        if self.input.trim().is_empty() {
            return Ok(TextLine::Blank(self.input.to_string()));
        }

        while let Some(c) = self.advance() {
            match c {
                '[' => {
                    if !self.word.is_empty() {
                        self.flush();
                    }
                    self.read_time_tag()?;
                }
                ' ' => self.word.push(' '),
                '\u{21}'..='\u{7e}' => {
                    if self.word.ends_with(' ') {
                        self.flush();
                    }
                    self.word.push(c);
                }
                _ => {
                    if !self.word.is_empty() {
                        self.flush();
                    }
                    self.word.push(c);
                    self.flush();
                }
            }
        }

        if !self.word.trim().is_empty() {
            self.flush();
        }

        if self.blocks.is_empty() {
            return Ok(TextLine::Fragment(Block::new(self.word, self.pending_time)));
        }

        if end_of_line_marker {
            self.blocks.push(Block::new("", self.pending_time.take()));
        }
        Ok(TextLine::Blocks(self.blocks))
    }
}

/// Tokenize `input` found at `line` (1-based, for diagnostics).
pub fn tokenize(input: &str, line: usize, end_of_line_marker: bool) -> Result<TextLine, KaraError> {
    Lexer::new(input, line).tokenize(end_of_line_marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(input: &str) -> Vec<Block> {
        match tokenize(input, 1, true).unwrap() {
            TextLine::Blocks(blocks) => blocks,
            other => panic!("Expected blocks, got {:?}", other),
        }
    }

    fn words(input: &str) -> Vec<String> {
        blocks(input).into_iter().map(|b| b.word).collect()
    }

    #[test]
    fn test_timed_words() {
        let blocks = blocks("[00:01.00]Hello [00:02.50]World");
        assert_eq!(
            blocks,
            vec![
                Block::new("Hello ", Some(1.0)),
                Block::new("World", Some(2.5)),
                Block::new("", None),
            ]
        );
    }

    #[test]
    fn test_untimed_words_keep_trailing_spaces() {
        assert_eq!(words("one two  three"), vec!["one ", "two  ", "three", ""]);
    }

    #[test]
    fn test_space_stays_with_preceding_word() {
        // Not "one", " two": the space closes the word before it.
        assert_eq!(words("one two"), vec!["one ", "two", ""]);
        assert_eq!(words("[00:01.00]one [00:02.00]two"), vec!["one ", "two", ""]);
    }

    #[test]
    fn test_leading_spaces_are_their_own_block() {
        assert_eq!(words("  hi"), vec!["  ", "hi", ""]);
    }

    #[test]
    fn test_non_ascii_is_split_per_character() {
        assert_eq!(words("愛して"), vec!["愛", "し", "て", ""]);
        assert_eq!(words("I愛you"), vec!["I", "愛", "you", ""]);
    }

    #[test]
    fn test_control_characters_are_blocks() {
        assert_eq!(words("a\tb"), vec!["a", "\t", "b", ""]);
    }

    #[test]
    fn test_space_after_non_ascii() {
        assert_eq!(words("愛 you"), vec!["愛", " ", "you", ""]);
    }

    #[test]
    fn test_time_tag_starts_new_block() {
        let blocks = blocks("ab[00:01.00]cd");
        assert_eq!(blocks[0], Block::new("ab", None));
        assert_eq!(blocks[1], Block::new("cd", Some(1.0)));
    }

    #[test]
    fn test_trailing_time_goes_to_marker() {
        let blocks = blocks("[00:01.00]la [00:03.25]");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], Block::new("", Some(3.25)));
    }

    #[test]
    fn test_later_tag_replaces_unused_time() {
        let blocks = blocks("[00:01.00][00:02.00]x");
        assert_eq!(blocks[0], Block::new("x", Some(2.0)));
    }

    #[test]
    fn test_concatenated_words_equal_input() {
        let input = "  So many  words, here! ";
        let joined: String = words(input).concat();
        assert_eq!(joined, input);
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(tokenize("", 1, true).unwrap(), TextLine::Blank(String::new()));
        assert_eq!(tokenize("   ", 1, true).unwrap(), TextLine::Blank("   ".to_string()));
    }

    #[test]
    fn test_bare_time_is_fragment() {
        assert_eq!(
            tokenize("[00:12.00]", 1, true).unwrap(),
            TextLine::Fragment(Block::new("", Some(12.0)))
        );
        assert_eq!(
            tokenize("[00:12.00]  ", 1, true).unwrap(),
            TextLine::Fragment(Block::new("  ", Some(12.0)))
        );
    }

    #[test]
    fn test_fragment_has_no_marker() {
        let result = tokenize("[00:01.00]あ[00:01.50]い", 1, false).unwrap();
        assert_eq!(
            result,
            TextLine::Blocks(vec![Block::new("あ", Some(1.0)), Block::new("い", Some(1.5))])
        );
    }

    #[test]
    fn test_invalid_character_in_tag() {
        let err = tokenize("[00:0x.00]la", 4, true).unwrap_err();
        match err {
            KaraError::TimeTag { line, column, message } => {
                assert_eq!(line, 4);
                assert_eq!(column, 6);
                assert!(message.contains("Invalid character 'x'"));
            }
            _ => panic!("Expected TimeTag error"),
        }
    }

    #[test]
    fn test_tag_without_colon() {
        let err = tokenize("[0100]la", 1, true).unwrap_err();
        assert!(err.to_string().contains("has no ':'"));
    }

    #[test]
    fn test_unterminated_tag() {
        let err = tokenize("la [00:01", 1, true).unwrap_err();
        assert!(err.to_string().contains("Unterminated"));
    }
}
