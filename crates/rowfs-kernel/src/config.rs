//! Store configuration.
//!
//! Parsed from TOML; every field has a default so an empty document is a
//! valid configuration:
//!
//! ```toml
//! database = "rowfs.db"      # or ":memory:"
//! root = "/srv/app"          # defaults to the process working directory
//! encoding = "utf-8"
//! busy_timeout_ms = 5000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use rowfs_types::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

/// In-memory database name understood by SQLite.
pub const IN_MEMORY: &str = ":memory:";

/// Configuration for a [`RowFs`](crate::RowFs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowFsConfig {
    /// SQLite database file.
    pub database: PathBuf,

    /// Directory whose subtree is stored in the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Default encoding for text handles.
    pub encoding: Encoding,

    /// How long the engine waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for RowFsConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("rowfs.db"),
            root: None,
            encoding: Encoding::Utf8,
            busy_timeout_ms: 5000,
        }
    }
}

impl RowFsConfig {
    /// Configuration for an in-memory store.
    pub fn in_memory() -> Self {
        Self {
            database: PathBuf::from(IN_MEMORY),
            ..Default::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> FsResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> FsResult<Self> {
        let text = std::fs::read_to_string(path).map_err(FsError::Io)?;
        Self::from_toml_str(&text)
    }

    /// Set the database file.
    pub fn with_database(mut self, database: impl Into<PathBuf>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the redirected root directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Set the default text encoding.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Absolute root directory, symlinks resolved when it exists.
    pub fn resolved_root(&self) -> FsResult<PathBuf> {
        let cwd = || std::env::current_dir().map_err(FsError::Io);
        let root = match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => cwd()?.join(root),
            None => cwd()?,
        };
        Ok(dunce::canonicalize(&root).unwrap_or(root))
    }
}
