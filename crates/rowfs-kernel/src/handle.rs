//! File handles.
//!
//! A [`FileHandle`] is a private snapshot of one record: it loads the
//! content at open, applies reads, writes, seeks and truncation to an
//! in-memory buffer, and only touches the store when it commits on
//! `flush` or `close`. Other handles and inspection queries keep seeing the
//! last committed row until then.
//!
//! ```text
//! open ──► Open { cursor, buffer, dirty } ──close──► Closed
//!              ▲          │
//!              └─ flush ──┘   (commit if dirty, stay open)
//! ```

use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};

use rowfs_types::{CanonicalKey, OpenMode};
use tracing::{debug, trace, warn};

use crate::commit::Coordinator;
use crate::error::{FsError, FsResult};

/// Per-handle state while open.
#[derive(Debug)]
struct OpenState {
    /// Byte offset; may sit past the end of `buffer` after a seek.
    cursor: u64,
    buffer: Vec<u8>,
    /// Buffer differs from the last committed row.
    dirty: bool,
    /// The most recent commit attempt failed.
    commit_failed: bool,
}

#[derive(Debug)]
enum HandleState {
    Open(OpenState),
    Closed,
}

/// Stateful handle returned by open.
#[derive(Debug)]
pub struct FileHandle {
    key: CanonicalKey,
    mode: OpenMode,
    coordinator: Coordinator,
    state: HandleState,
}

impl FileHandle {
    /// Open `key` in `mode`, loading its committed content.
    ///
    /// Nothing is written here. A truncating mode, or a creating mode on an
    /// absent record, starts dirty so that closing materialises the file.
    pub(crate) fn open(coordinator: Coordinator, key: CanonicalKey, mode: OpenMode) -> FsResult<Self> {
        let (buffer, dirty) = if mode.truncate {
            (Vec::new(), true)
        } else {
            match coordinator.store().read(&key) {
                Ok(content) => (content, false),
                Err(FsError::NotFound(_)) if mode.create => (Vec::new(), true),
                Err(e) => return Err(e),
            }
        };
        let cursor = if mode.append { buffer.len() as u64 } else { 0 };
        debug!(path = %key, mode = %mode, size = buffer.len(), "opened file");

        Ok(Self {
            key,
            mode,
            coordinator,
            state: HandleState::Open(OpenState {
                cursor,
                buffer,
                dirty,
                commit_failed: false,
            }),
        })
    }

    /// Canonical key this handle targets.
    pub fn path(&self) -> &CanonicalKey {
        &self.key
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, HandleState::Closed)
    }

    /// Whether there are uncommitted changes. Always false once closed.
    pub fn is_dirty(&self) -> bool {
        matches!(&self.state, HandleState::Open(open) if open.dirty)
    }

    /// Current cursor offset.
    pub fn tell(&self) -> FsResult<u64> {
        Ok(self.open_ref()?.cursor)
    }

    /// Current buffer length.
    pub fn len(&self) -> FsResult<u64> {
        Ok(self.open_ref()?.buffer.len() as u64)
    }

    pub fn is_empty(&self) -> FsResult<bool> {
        Ok(self.len()? == 0)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Read up to `n` bytes from the cursor.
    ///
    /// Returns fewer bytes (possibly none) at end of buffer; never fails for
    /// reading past the end.
    pub fn read(&mut self, n: usize) -> FsResult<Vec<u8>> {
        let open = self.readable_state()?;
        let available = open.remaining();
        let data = available[..available.len().min(n)].to_vec();
        open.cursor += data.len() as u64;
        let cursor = open.cursor;
        trace!(path = %self.key, read = data.len(), cursor, "read");
        Ok(data)
    }

    /// Read everything from the cursor to the end.
    pub fn read_to_end(&mut self) -> FsResult<Vec<u8>> {
        let open = self.readable_state()?;
        let data = open.remaining().to_vec();
        open.cursor += data.len() as u64;
        Ok(data)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let open = self.readable_state()?;
        let available = open.remaining();
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        open.cursor += n as u64;
        Ok(n)
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` at the cursor (or at the end in append mode).
    ///
    /// Overwrites existing bytes, extends the buffer as needed, and zero
    /// fills any gap between the old end and the cursor. Returns `data.len()`.
    pub fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        let append = self.mode.append;
        let open = self.writable_state()?;
        if data.is_empty() {
            return Ok(0);
        }
        if append {
            open.cursor = open.buffer.len() as u64;
        }
        let end = grow_to(&mut open.buffer, open.cursor.saturating_add(data.len() as u64))?;
        let start = end - data.len();
        open.buffer[start..end].copy_from_slice(data);
        open.cursor = end as u64;
        open.dirty = true;
        trace!(path = %self.key, wrote = data.len(), cursor = end, "write");
        Ok(data.len())
    }

    /// Set the buffer length, dropping trailing bytes or zero padding.
    ///
    /// The cursor is left where it was.
    pub fn truncate(&mut self, length: u64) -> FsResult<()> {
        let open = self.writable_state()?;
        let length = grow_to(&mut open.buffer, length)?;
        open.buffer.truncate(length);
        open.dirty = true;
        Ok(())
    }

    // ========================================================================
    // Positioning
    // ========================================================================

    /// Move the cursor. Fails `InvalidSeek` if the result would be negative.
    ///
    /// Seeking past the end is allowed; a later write zero fills the gap.
    pub fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        let open = self.open_mut()?;
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(open.cursor) + i128::from(delta),
            SeekFrom::End(delta) => open.buffer.len() as i128 + i128::from(delta),
        };
        let cursor = u64::try_from(target).map_err(|_| FsError::InvalidSeek { offset: target })?;
        open.cursor = cursor;
        Ok(cursor)
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Commit the buffer if dirty, keeping the handle open.
    ///
    /// On failure the handle stays open and dirty so the call can be retried.
    pub fn flush(&mut self) -> FsResult<()> {
        let Self {
            key,
            mode,
            coordinator,
            state,
        } = self;
        let HandleState::Open(open) = state else {
            return Err(FsError::closed(key));
        };
        if !open.dirty {
            return Ok(());
        }
        match coordinator.commit(key, &open.buffer, *mode) {
            Ok(_) => {
                open.dirty = false;
                open.commit_failed = false;
                Ok(())
            }
            Err(e) => {
                open.commit_failed = true;
                Err(e)
            }
        }
    }

    /// Flush, then close. A failed flush leaves the handle open.
    pub fn close(&mut self) -> FsResult<()> {
        self.flush()?;
        self.state = HandleState::Closed;
        debug!(path = %self.key, "closed file");
        Ok(())
    }

    /// Close without committing; uncommitted changes are discarded.
    pub fn abandon(mut self) {
        if self.is_dirty() {
            debug!(path = %self.key, "abandoned uncommitted changes");
        }
        self.state = HandleState::Closed;
    }

    // ========================================================================
    // Batch commit support
    // ========================================================================

    pub(crate) fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Buffer awaiting commit, if dirty.
    pub(crate) fn pending(&self) -> Option<&[u8]> {
        match &self.state {
            HandleState::Open(open) if open.dirty => Some(open.buffer.as_slice()),
            _ => None,
        }
    }

    pub(crate) fn mark_committed(&mut self) {
        if let HandleState::Open(open) = &mut self.state {
            open.dirty = false;
            open.commit_failed = false;
        }
    }

    // ========================================================================
    // State access
    // ========================================================================

    fn open_ref(&self) -> FsResult<&OpenState> {
        match &self.state {
            HandleState::Open(open) => Ok(open),
            HandleState::Closed => Err(FsError::closed(&self.key)),
        }
    }

    fn open_mut(&mut self) -> FsResult<&mut OpenState> {
        match &mut self.state {
            HandleState::Open(open) => Ok(open),
            HandleState::Closed => Err(FsError::closed(&self.key)),
        }
    }

    fn readable_state(&mut self) -> FsResult<&mut OpenState> {
        if !self.is_closed() && !self.mode.readable {
            return Err(FsError::not_readable(&self.key));
        }
        self.open_mut()
    }

    fn writable_state(&mut self) -> FsResult<&mut OpenState> {
        if !self.is_closed() && !self.mode.writable {
            return Err(FsError::not_writable(&self.key));
        }
        self.open_mut()
    }
}

impl OpenState {
    /// Bytes from the cursor to the end; empty when the cursor is past it.
    fn remaining(&self) -> &[u8] {
        let start = usize::try_from(self.cursor)
            .unwrap_or(usize::MAX)
            .min(self.buffer.len());
        &self.buffer[start..]
    }
}

/// Zero pad `buffer` to at least `len` bytes. Fails `TooLarge` instead of
/// aborting when the allocation cannot be made.
fn grow_to(buffer: &mut Vec<u8>, len: u64) -> FsResult<usize> {
    let too_large = || FsError::TooLarge { requested: len };
    let target = usize::try_from(len).map_err(|_| too_large())?;
    if let Some(extra) = target.checked_sub(buffer.len()).filter(|&n| n > 0) {
        buffer.try_reserve_exact(extra).map_err(|_| too_large())?;
        buffer.resize(target, 0);
    }
    Ok(target)
}

/// A dropped handle commits once, like a buffered writer. Handles whose last
/// commit failed are not retried.
impl Drop for FileHandle {
    fn drop(&mut self) {
        let retry = matches!(&self.state, HandleState::Open(open) if open.dirty && !open.commit_failed);
        if retry {
            if let Err(e) = self.close() {
                warn!(path = %self.key, error = %e, "dropped file handle failed to commit");
            }
        }
    }
}

// ============================================================================
// std::io integration
// ============================================================================

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl BufRead for FileHandle {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.readable_state()?.remaining())
    }

    fn consume(&mut self, amt: usize) {
        if let HandleState::Open(open) = &mut self.state {
            let amt = amt.min(open.remaining().len());
            open.cursor += amt as u64;
        }
    }
}

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(FileHandle::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(FileHandle::flush(self)?)
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(FileHandle::seek(self, pos)?)
    }
}
