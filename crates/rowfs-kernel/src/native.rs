//! Native filesystem fallback.
//!
//! Paths outside the redirected root (or any path while the redirect is not
//! installed) open real files. [`NativeFile`] gives them the same surface as
//! a [`FileHandle`](crate::FileHandle): buffered reads, writes, seeks, and a
//! close that refuses further use.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rowfs_types::OpenMode;
use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::text::FileStream;

/// Translate a parsed mode into `std::fs` open options.
pub fn open_options(mode: OpenMode) -> OpenOptions {
    let mut options = OpenOptions::new();
    options
        .read(mode.readable)
        .write(mode.writable && !mode.append)
        .append(mode.append)
        .create(mode.create)
        .truncate(mode.truncate);
    options
}

/// A real file opened through the redirect's fallback path.
#[derive(Debug)]
pub struct NativeFile {
    path: PathBuf,
    inner: Option<BufReader<File>>,
}

impl NativeFile {
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> FsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_options(mode).open(&path).map_err(FsError::Io)?;
        debug!(path = %path.display(), mode = %mode, "opened native file");
        Ok(Self {
            path,
            inner: Some(BufReader::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn file(&mut self) -> io::Result<&mut BufReader<File>> {
        self.inner.as_mut().ok_or_else(|| {
            FsError::ClosedHandle(self.path.display().to_string()).into()
        })
    }
}

impl Read for NativeFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file()?.read(buf)
    }
}

impl BufRead for NativeFile {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.file()?.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if let Some(inner) = self.inner.as_mut() {
            inner.consume(amt);
        }
    }
}

impl Write for NativeFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = self.file()?;
        // Drop read-ahead so the OS position matches the logical one.
        inner.seek(SeekFrom::Current(0))?;
        inner.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.get_mut().flush()
    }
}

impl Seek for NativeFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }
}

impl FileStream for NativeFile {
    fn close(&mut self) -> FsResult<()> {
        let mut inner = self
            .inner
            .take()
            .ok_or_else(|| FsError::ClosedHandle(self.path.display().to_string()))?;
        inner.get_mut().flush().map_err(FsError::Io)?;
        debug!(path = %self.path.display(), "closed native file");
        Ok(())
    }
}
