//! Open redirection.
//!
//! A [`Redirect`] decides, per call, whether `open` lands in a [`RowFs`] or
//! on the real filesystem. It is a plain value owned by the caller: install a
//! filesystem to start routing paths under its root into the store, and
//! uninstall it to go back to native files. Nothing is process global.

use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::Path;

use rowfs_types::{Encoding, ModeError, OpenMode, PathError};
use tracing::{debug, trace};

use crate::error::{FsError, FsResult};
use crate::fs::RowFs;
use crate::handle::FileHandle;
use crate::inspect::Inspector;
use crate::native::NativeFile;
use crate::text::{FileStream, TextFile};

/// Routes opens to a [`RowFs`] when installed, otherwise to native files.
#[derive(Debug, Clone, Default)]
pub struct Redirect {
    fs: Option<RowFs>,
}

impl Redirect {
    /// A redirect with nothing installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start routing through `fs`. Returns false, keeping the current
    /// filesystem, if one is already installed.
    pub fn install(&mut self, fs: RowFs) -> bool {
        if self.fs.is_some() {
            return false;
        }
        debug!(root = %fs.resolver().root().display(), "redirect installed");
        self.fs = Some(fs);
        true
    }

    /// Stop routing. Returns false if nothing was installed.
    pub fn uninstall(&mut self) -> bool {
        let removed = self.fs.take().is_some();
        if removed {
            debug!("redirect uninstalled");
        }
        removed
    }

    pub fn is_installed(&self) -> bool {
        self.fs.is_some()
    }

    /// The installed filesystem, if any.
    pub fn filesystem(&self) -> Option<&RowFs> {
        self.fs.as_ref()
    }

    /// Open `path` with a mode string.
    ///
    /// Paths under the installed root open a [`FileHandle`]; paths outside
    /// it, or any path while uninstalled, open a native file.
    pub fn open(&self, path: impl AsRef<Path>, mode: &str) -> FsResult<OpenFile> {
        let mode: OpenMode = mode.parse()?;
        let path = path.as_ref();
        let Some(fs) = &self.fs else {
            return self.native(path, mode);
        };
        match fs.resolver().resolve(path) {
            Ok(key) => {
                trace!(path = %path.display(), key = %key, "routed to store");
                Ok(OpenFile::Virtual(fs.open_key(key, mode)?))
            }
            Err(PathError::EscapesRoot(_)) => self.native(path, mode),
            Err(e) => Err(e.into()),
        }
    }

    /// Open `path` for text with `encoding`, or the filesystem default.
    pub fn open_text(
        &self,
        path: impl AsRef<Path>,
        mode: &str,
        encoding: Option<Encoding>,
    ) -> FsResult<TextFile<OpenFile>> {
        let parsed: OpenMode = mode.parse()?;
        if parsed.binary {
            return Err(ModeError::BinaryText(mode.to_string()).into());
        }
        let encoding = encoding
            .or_else(|| self.fs.as_ref().map(RowFs::encoding))
            .unwrap_or_default();
        Ok(TextFile::new(self.open(path, mode)?, encoding))
    }

    /// Open a real file, bypassing the store even when installed.
    pub fn open_native(&self, path: impl AsRef<Path>, mode: &str) -> FsResult<NativeFile> {
        NativeFile::open(path, mode.parse()?)
    }

    /// Query access to the installed store; `NotInstalled` otherwise.
    pub fn inspect(&self) -> FsResult<Inspector> {
        self.fs.as_ref().map(RowFs::inspect).ok_or(FsError::NotInstalled)
    }

    fn native(&self, path: &Path, mode: OpenMode) -> FsResult<OpenFile> {
        trace!(path = %path.display(), "routed to native filesystem");
        Ok(OpenFile::Native(NativeFile::open(path, mode)?))
    }
}

/// A file opened through a [`Redirect`].
#[derive(Debug)]
pub enum OpenFile {
    Virtual(FileHandle),
    Native(NativeFile),
}

impl OpenFile {
    pub fn is_virtual(&self) -> bool {
        matches!(self, OpenFile::Virtual(_))
    }

    /// The store handle, when this file lives in the store.
    pub fn as_handle(&self) -> Option<&FileHandle> {
        match self {
            OpenFile::Virtual(handle) => Some(handle),
            OpenFile::Native(_) => None,
        }
    }

    pub fn as_handle_mut(&mut self) -> Option<&mut FileHandle> {
        match self {
            OpenFile::Virtual(handle) => Some(handle),
            OpenFile::Native(_) => None,
        }
    }
}

impl Read for OpenFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            OpenFile::Virtual(f) => Read::read(f, buf),
            OpenFile::Native(f) => f.read(buf),
        }
    }
}

impl BufRead for OpenFile {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            OpenFile::Virtual(f) => f.fill_buf(),
            OpenFile::Native(f) => f.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            OpenFile::Virtual(f) => f.consume(amt),
            OpenFile::Native(f) => f.consume(amt),
        }
    }
}

impl Write for OpenFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OpenFile::Virtual(f) => Write::write(f, buf),
            OpenFile::Native(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OpenFile::Virtual(f) => Write::flush(f),
            OpenFile::Native(f) => f.flush(),
        }
    }
}

impl Seek for OpenFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            OpenFile::Virtual(f) => Seek::seek(f, pos),
            OpenFile::Native(f) => f.seek(pos),
        }
    }
}

impl FileStream for OpenFile {
    fn close(&mut self) -> FsResult<()> {
        match self {
            OpenFile::Virtual(f) => f.close(),
            OpenFile::Native(f) => f.close(),
        }
    }
}
