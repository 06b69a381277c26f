//! Path resolution.
//!
//! Every path a caller hands us is reduced to a [`CanonicalKey`]: the
//! `/`-separated list of normal components relative to the resolver's root.
//! Resolution is purely lexical (no filesystem access), so the same input
//! always produces the same key and two spellings of one file agree.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Malformed or out-of-scope path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Empty input.
    #[error("path is empty")]
    Empty,

    /// Embedded NUL byte.
    #[error("path contains a NUL byte: {0:?}")]
    NulByte(String),

    /// Not valid Unicode, so it cannot become a key.
    #[error("path is not valid unicode: {0}")]
    NotUnicode(String),

    /// Resolves outside the root.
    #[error("path escapes root: {0}")]
    EscapesRoot(String),

    /// Resolves to the root itself, which is not a file.
    #[error("path names a directory, not a file: {0:?}")]
    NotAFile(String),

    /// Resolver constructed with a relative root.
    #[error("resolver root must be absolute: {0}")]
    RelativeRoot(String),
}

/// Normalized key addressing one file record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Borrow the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the key text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Rebuild a key from text previously produced by a resolver.
    ///
    /// Used when reading keys back out of storage.
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolves raw paths to canonical keys relative to a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: PathBuf,
    /// Normalized components of `root`, compared against absolute inputs.
    root_components: Vec<String>,
}

impl PathResolver {
    /// Create a resolver rooted at an absolute directory.
    ///
    /// The root is taken as given; callers that want symlinks resolved should
    /// canonicalize it first.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PathError> {
        let root = root.into();
        let text = root
            .to_str()
            .ok_or_else(|| PathError::NotUnicode(root.display().to_string()))?;
        if !is_absolute(text) {
            return Err(PathError::RelativeRoot(text.to_string()));
        }
        let root_components =
            normalize(text).ok_or_else(|| PathError::RelativeRoot(text.to_string()))?;
        Ok(Self {
            root,
            root_components,
        })
    }

    /// The root directory keys are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a raw path to its canonical key.
    ///
    /// Relative inputs are taken relative to the root. Absolute inputs must
    /// lie under the root. Both `/` and `\` separate components, `.` is
    /// dropped, and `..` removes the previous component.
    pub fn resolve(&self, raw: impl AsRef<Path>) -> Result<CanonicalKey, PathError> {
        let raw = raw.as_ref();
        let text = raw
            .to_str()
            .ok_or_else(|| PathError::NotUnicode(raw.display().to_string()))?;
        if text.is_empty() {
            return Err(PathError::Empty);
        }
        if text.contains('\0') {
            return Err(PathError::NulByte(text.to_string()));
        }

        let components = if is_absolute(text) {
            let full = normalize(text).ok_or_else(|| PathError::EscapesRoot(text.to_string()))?;
            if !full.starts_with(&self.root_components) {
                return Err(PathError::EscapesRoot(text.to_string()));
            }
            full[self.root_components.len()..].to_vec()
        } else {
            normalize(text).ok_or_else(|| PathError::EscapesRoot(text.to_string()))?
        };

        if components.is_empty() {
            return Err(PathError::NotAFile(text.to_string()));
        }
        Ok(CanonicalKey(components.join("/")))
    }
}

fn is_absolute(text: &str) -> bool {
    text.starts_with('/') || text.starts_with('\\') || Path::new(text).is_absolute()
}

/// Lexically normalize `text` into components. `None` if `..` pops past the start.
fn normalize(text: &str) -> Option<Vec<String>> {
    let mut stack = Vec::new();
    for part in text.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            name => stack.push(name.to_string()),
        }
    }
    Some(stack)
}
