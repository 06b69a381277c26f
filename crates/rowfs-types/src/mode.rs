//! Open modes.
//!
//! Mode strings use the familiar `fopen` vocabulary (`r`, `w`, `a`, with an
//! optional `+` and `b`/`t`). They are parsed once into [`OpenMode`], a tagged
//! access kind plus explicit capability flags, so nothing downstream ever
//! inspects the raw string again.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Primary access kind selected by the leading mode character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// `r`: existing file, read from the start.
    Read,
    /// `w`: create or replace, content starts empty.
    WriteTruncate,
    /// `a`: create if missing, every write lands at the end.
    Append,
    /// `r+`: existing file, read and overwrite in place.
    ReadWrite,
}

/// Error parsing a mode string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    /// Character outside the mode vocabulary.
    #[error("unknown mode character {flag:?} in {mode:?}")]
    UnknownFlag { mode: String, flag: char },

    /// More than one of `r`, `w`, `a`, or `+`/`b`/`t` repeated.
    #[error("conflicting or repeated mode characters in {0:?}")]
    Conflicting(String),

    /// None of `r`, `w`, `a` present.
    #[error("mode {0:?} must contain exactly one of 'r', 'w', 'a'")]
    MissingAccess(String),

    /// Text wrapper requested on a binary mode.
    #[error("binary mode {0:?} does not take an encoding")]
    BinaryText(String),
}

/// Parsed open mode.
///
/// Flags are derived from `access` and the `+` modifier by the constructors;
/// build values through [`OpenMode::new`] or `str::parse` rather than by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenMode {
    /// Primary access kind.
    pub access: Access,
    /// Reads are permitted.
    pub readable: bool,
    /// Writes and truncation are permitted.
    pub writable: bool,
    /// Existing content is discarded (in memory) at open.
    pub truncate: bool,
    /// Writes always go to the end of the buffer.
    pub append: bool,
    /// A missing file is created on first commit instead of failing open.
    pub create: bool,
    /// Caller asked for raw bytes (`b`).
    pub binary: bool,
}

impl OpenMode {
    /// Build a mode from its access kind and the `+` (update) modifier.
    pub fn new(access: Access, update: bool) -> Self {
        let (readable, writable) = match access {
            Access::Read => (true, update),
            Access::ReadWrite => (true, true),
            Access::WriteTruncate | Access::Append => (update, true),
        };
        // `r+` is spelled as Read + update; normalise to the tagged form.
        let access = match (access, update) {
            (Access::Read, true) => Access::ReadWrite,
            (other, _) => other,
        };
        Self {
            access,
            readable,
            writable,
            truncate: access == Access::WriteTruncate,
            append: access == Access::Append,
            create: matches!(access, Access::WriteTruncate | Access::Append),
            binary: false,
        }
    }

    /// `r`
    pub fn read() -> Self {
        Self::new(Access::Read, false)
    }

    /// `w`
    pub fn write() -> Self {
        Self::new(Access::WriteTruncate, false)
    }

    /// `a`
    pub fn append() -> Self {
        Self::new(Access::Append, false)
    }

    /// `r+`
    pub fn read_write() -> Self {
        Self::new(Access::ReadWrite, true)
    }

    /// Mark the mode as binary.
    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    /// Whether open must fail when no record exists.
    pub fn must_exist(&self) -> bool {
        !self.create
    }

    /// True when the `+` modifier was present.
    pub fn is_update(&self) -> bool {
        match self.access {
            Access::Read => false,
            Access::ReadWrite => true,
            Access::WriteTruncate | Access::Append => self.readable,
        }
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        Self::read()
    }
}

impl FromStr for OpenMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut access = None;
        let mut update = false;
        let mut binary = None;

        for flag in s.chars() {
            match flag {
                'r' | 'w' | 'a' => {
                    if access.is_some() {
                        return Err(ModeError::Conflicting(s.to_string()));
                    }
                    access = Some(match flag {
                        'r' => Access::Read,
                        'w' => Access::WriteTruncate,
                        _ => Access::Append,
                    });
                }
                '+' => {
                    if update {
                        return Err(ModeError::Conflicting(s.to_string()));
                    }
                    update = true;
                }
                'b' | 't' => {
                    if binary.is_some() {
                        return Err(ModeError::Conflicting(s.to_string()));
                    }
                    binary = Some(flag == 'b');
                }
                other => {
                    return Err(ModeError::UnknownFlag {
                        mode: s.to_string(),
                        flag: other,
                    });
                }
            }
        }

        let access = access.ok_or_else(|| ModeError::MissingAccess(s.to_string()))?;
        let mut mode = Self::new(access, update);
        mode.binary = binary.unwrap_or(false);
        Ok(mode)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lead = match self.access {
            Access::Read | Access::ReadWrite => 'r',
            Access::WriteTruncate => 'w',
            Access::Append => 'a',
        };
        write!(f, "{lead}")?;
        if self.is_update() {
            write!(f, "+")?;
        }
        if self.binary {
            write!(f, "b")?;
        }
        Ok(())
    }
}
