//! # Error Types
//!
//! This module defines all error types for the kara lyric editor.
//!
//! Most input problems in a lyrics file are not errors at all: the parser
//! keeps a malformed line verbatim and logs a diagnostic. The variants here
//! cover what is left: the lexer's time-tag failures (recovered by the
//! parser), configuration and encoding problems, and session misuse.
//!
//! ## Usage
//! ```rust
//! use kara::{EditorConfig, KaraError};
//!
//! match EditorConfig::from_yaml("blink-interval-ms: fast") {
//!     Ok(config) => println!("blink every {}ms", config.blink_interval_ms),
//!     Err(KaraError::Config(message)) => eprintln!("bad config: {}", message),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KaraError {
    /// Malformed `[mm:ss.cc]` time tag.
    ///
    /// Raised by the lexer when a tag is unterminated, contains a character
    /// other than digits, `:` and `.`, or has no `:`. The parser catches it
    /// and keeps the whole line as opaque text.
    ///
    /// # Example
    /// ```
    /// # use kara::KaraError;
    /// let err = KaraError::TimeTag {
    ///     line: 3,
    ///     column: 5,
    ///     message: "Invalid character 'x' in time tag".to_string(),
    /// };
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Invalid time tag at line 3, column 5: Invalid character 'x' in time tag"
    /// );
    /// ```
    #[error("Invalid time tag at line {line}, column {column}: {message}")]
    TimeTag {
        line: usize,
        column: usize,
        message: String,
    },

    /// The declared text encoding label is not known.
    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),

    /// Invalid editor configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A script command could not be understood.
    #[error("Invalid command '{input}': {message}")]
    Command { input: String, message: String },

    /// A session command was issued before any document was loaded.
    #[error("No document loaded")]
    NoDocument,

    /// Rendering an output representation failed.
    #[error("Output error: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
