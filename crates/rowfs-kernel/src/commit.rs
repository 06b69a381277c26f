//! Transaction coordinator.
//!
//! Maps every flush or close onto exactly one atomic store call. There is no
//! locking here: concurrent commits to one key are ordered by the store, and
//! the last one wins.

use std::sync::Arc;

use rowfs_types::{CanonicalKey, FileRecord, OpenMode};
use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::handle::FileHandle;
use crate::store::{now_millis, ContentStore};

/// Commits handle buffers to a [`ContentStore`].
#[derive(Debug, Clone)]
pub struct Coordinator {
    store: Arc<ContentStore>,
}

impl Coordinator {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    /// Commit `buffer` as the new content of `key`.
    pub fn commit(&self, key: &CanonicalKey, buffer: &[u8], mode: OpenMode) -> FsResult<FileRecord> {
        let record = self.store.upsert(key, buffer, now_millis())?;
        debug!(
            path = %key,
            mode = %mode,
            size = record.size(),
            modified_at = record.modified_at(),
            "committed file"
        );
        Ok(record)
    }

    /// Delete the record for `key`. Returns whether it existed.
    pub fn remove(&self, key: &CanonicalKey) -> FsResult<bool> {
        let removed = self.store.delete(key)?;
        debug!(path = %key, removed, "removed file");
        Ok(removed)
    }

    /// Commit every dirty handle in one store transaction.
    ///
    /// Either all dirty handles are committed and marked clean, or the store
    /// is untouched and every handle keeps its dirty state. Clean handles are
    /// skipped. Returns the number of handles committed.
    pub fn commit_all(&self, handles: &mut [&mut FileHandle]) -> FsResult<usize> {
        for handle in handles.iter() {
            if !Arc::ptr_eq(handle.coordinator().store(), &self.store) {
                return Err(FsError::ForeignHandle(handle.path().to_string()));
            }
            if handle.is_closed() {
                return Err(FsError::closed(handle.path()));
            }
        }

        let timestamp = now_millis();
        let committed = self.store.atomically(|tx| {
            let mut committed = Vec::new();
            for (index, handle) in handles.iter().enumerate() {
                if let Some(buffer) = handle.pending() {
                    tx.upsert(handle.path(), buffer, timestamp)?;
                    committed.push(index);
                }
            }
            Ok(committed)
        })?;

        for &index in &committed {
            handles[index].mark_committed();
        }
        debug!(files = committed.len(), "committed batch");
        Ok(committed.len())
    }
}
