pub mod ast;
pub mod config;
pub mod cursor;
pub mod emitter;
pub mod encoding;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scheduler;
pub mod serializer;
pub mod session;
pub mod time;

pub use ast::*;
pub use config::EditorConfig;
pub use cursor::{Cursor, CursorPosition, Selection};
pub use emitter::{Emitter, SubscriptionId};
pub use error::*;
pub use parser::parse;
pub use scheduler::{BlinkFrame, BlinkScheduler, ManualTimerHost, TimerHost, TimerId};
pub use serializer::serialize;
pub use session::{Command, CommandOutcome, RecordedTarget, Session};

/// Parse lyrics text and write it back out.
/// Ruby definitions are recomputed from the blocks and lines end in CRLF.
pub fn reformat(source: &str) -> String {
    let mut doc = parse(source);
    doc.refresh_ruby_definitions();
    serialize(&doc)
}

/// Decode `bytes` declared as `label`, then [`reformat`].
pub fn reformat_bytes(bytes: &[u8], label: &str) -> Result<String, KaraError> {
    let source = encoding::decode(bytes, label)?;
    Ok(reformat(&source))
}
