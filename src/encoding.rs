//! Byte/text conversion for loading and exporting lyric files.
//!
//! Labels follow the WHATWG encoding label table (`shift_jis`, `sjis`,
//! `utf-8`, `windows-1252`, ...). Decoding honours a leading BOM. Problems
//! with the data itself never fail the conversion: malformed bytes become
//! U+FFFD and characters the target encoding cannot represent become
//! numeric character references, each with a warning.

use crate::error::KaraError;
use encoding_rs::Encoding;
use tracing::warn;

/// Resolve an encoding label.
pub fn lookup(label: &str) -> Result<&'static Encoding, KaraError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| KaraError::UnknownEncoding(label.to_string()))
}

/// Decode `bytes` declared as `label`.
///
/// # Example
/// ```rust
/// let text = kara::encoding::decode(&[0x88, 0xa4], "shift_jis").unwrap();
/// assert_eq!(text, "愛");
/// ```
pub fn decode(bytes: &[u8], label: &str) -> Result<String, KaraError> {
    let declared = lookup(label)?;
    let (text, actual, had_errors) = declared.decode(bytes);
    if actual != declared {
        warn!(declared = declared.name(), actual = actual.name(), "Byte order mark overrides declared encoding");
    }
    if had_errors {
        warn!(encoding = actual.name(), "Malformed byte sequences replaced while decoding");
    }
    Ok(text.into_owned())
}

/// Encode `text` for writing as `label`.
pub fn encode(text: &str, label: &str) -> Result<Vec<u8>, KaraError> {
    let encoding = lookup(label)?;
    let (bytes, actual, had_unmappable) = encoding.encode(text);
    if actual != encoding {
        warn!(requested = encoding.name(), actual = actual.name(), "Encoding cannot be used for output; wrote a fallback");
    }
    if had_unmappable {
        warn!(encoding = actual.name(), "Unmappable characters written as numeric character references");
    }
    Ok(bytes.into_owned())
}
