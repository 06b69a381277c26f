//! Text encodings applied at the handle boundary.
//!
//! Storage only ever holds bytes; these codecs translate at the text
//! wrapper and nowhere else.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Supported text encodings.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8", alias = "UTF-8")]
    #[strum(to_string = "utf-8", serialize = "utf8")]
    Utf8,
    #[serde(rename = "ascii", alias = "us-ascii", alias = "ASCII")]
    #[strum(to_string = "ascii", serialize = "us-ascii")]
    Ascii,
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    #[strum(to_string = "latin-1", serialize = "latin1", serialize = "iso-8859-1")]
    Latin1,
}

/// Failure translating between text and bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{encoding} codec can't {direction} at position {position}: {reason}")]
pub struct EncodingError {
    pub encoding: Encoding,
    pub direction: Direction,
    /// Byte offset (decode) or character index (encode) of the failure.
    pub position: usize,
    pub reason: String,
}

/// Which way a codec was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Direction {
    #[strum(to_string = "encode")]
    Encode,
    #[strum(to_string = "decode")]
    Decode,
}

impl Encoding {
    /// Encode text to bytes.
    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, EncodingError> {
        match self {
            Encoding::Utf8 => Ok(Cow::Borrowed(text.as_bytes())),
            Encoding::Ascii => match text.chars().position(|c| !c.is_ascii()) {
                None => Ok(Cow::Borrowed(text.as_bytes())),
                Some(position) => Err(self.encode_error(position, "character not in range(128)")),
            },
            Encoding::Latin1 => text
                .chars()
                .enumerate()
                .map(|(i, c)| {
                    u8::try_from(u32::from(c))
                        .map_err(|_| self.encode_error(i, "character not in range(256)"))
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Cow::Owned),
        }
    }

    /// Decode bytes to text; invalid sequences fail rather than being replaced.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, EncodingError> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes).map(Cow::Borrowed).map_err(|e| {
                let reason = match e.error_len() {
                    Some(_) => "invalid byte sequence",
                    None => "unexpected end of data",
                };
                self.decode_error(e.valid_up_to(), reason)
            }),
            Encoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                // ASCII is a subset of UTF-8, so no copy is needed.
                None => Ok(Cow::Borrowed(std::str::from_utf8(bytes).unwrap_or_default())),
                Some(position) => Err(self.decode_error(position, "byte not in range(128)")),
            },
            Encoding::Latin1 => Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())),
        }
    }

    /// Length of the prefix of `bytes` holding at most `max_chars` characters.
    ///
    /// Returns `(byte_len, char_count)`. For UTF-8 the scan trusts leading
    /// bytes only; [`Encoding::decode`] still validates the slice. A
    /// character that would run past the end of `bytes` is not counted.
    pub fn char_prefix(&self, bytes: &[u8], max_chars: usize) -> (usize, usize) {
        match self {
            Encoding::Ascii | Encoding::Latin1 => {
                let n = bytes.len().min(max_chars);
                (n, n)
            }
            Encoding::Utf8 => {
                let mut offset = 0;
                let mut chars = 0;
                while chars < max_chars && offset < bytes.len() {
                    let width = utf8_width(bytes[offset]);
                    if offset + width > bytes.len() {
                        break;
                    }
                    offset += width;
                    chars += 1;
                }
                (offset, chars)
            }
        }
    }

    fn encode_error(&self, position: usize, reason: &str) -> EncodingError {
        EncodingError {
            encoding: *self,
            direction: Direction::Encode,
            position,
            reason: reason.to_string(),
        }
    }

    fn decode_error(&self, position: usize, reason: &str) -> EncodingError {
        EncodingError {
            encoding: *self,
            direction: Direction::Decode,
            position,
            reason: reason.to_string(),
        }
    }
}

/// Sequence width implied by a UTF-8 leading byte. Stray continuation and
/// invalid bytes count as one so decode can report them.
fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}
