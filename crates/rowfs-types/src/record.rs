//! The persisted row type.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::path::CanonicalKey;

/// One logical file as stored in the `files` table.
///
/// `size` is derived from `content` at construction and has no setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    path: CanonicalKey,
    content: Vec<u8>,
    size: u64,
    modified_at: i64,
}

impl FileRecord {
    /// Build a record; `modified_at` is Unix milliseconds.
    pub fn new(path: CanonicalKey, content: Vec<u8>, modified_at: i64) -> Self {
        let size = content.len() as u64;
        Self {
            path,
            content,
            size,
            modified_at,
        }
    }

    pub fn path(&self) -> &CanonicalKey {
        &self.path
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    /// Byte length of the content.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last commit time in Unix milliseconds.
    pub fn modified_at(&self) -> i64 {
        self.modified_at
    }

    /// Last commit time as a `SystemTime`.
    pub fn modified_time(&self) -> SystemTime {
        let millis = u64::try_from(self.modified_at).unwrap_or(0);
        UNIX_EPOCH + Duration::from_millis(millis)
    }
}
