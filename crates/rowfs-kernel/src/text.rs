//! Text wrapper.
//!
//! [`TextFile`] layers an [`Encoding`] over any byte stream. It keeps no
//! state of its own besides the encoding: the wrapped stream owns the cursor
//! and the bytes, so text and byte views of one handle never diverge.

use std::io::{BufRead, Seek, SeekFrom, Write};

use rowfs_types::Encoding;

use crate::error::FsResult;

/// Byte stream a [`TextFile`] can wrap.
pub trait FileStream: BufRead + Write + Seek {
    /// Commit pending changes and release the stream.
    fn close(&mut self) -> FsResult<()>;
}

impl FileStream for crate::handle::FileHandle {
    fn close(&mut self) -> FsResult<()> {
        crate::handle::FileHandle::close(self)
    }
}

/// Text view over a byte stream.
#[derive(Debug)]
pub struct TextFile<F> {
    inner: F,
    encoding: Encoding,
}

impl<F: FileStream> TextFile<F> {
    pub fn new(inner: F, encoding: Encoding) -> Self {
        Self { inner, encoding }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn get_ref(&self) -> &F {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut F {
        &mut self.inner
    }

    pub fn into_inner(self) -> F {
        self.inner
    }

    /// Encode and write `text`. Returns the number of characters written.
    pub fn write_str(&mut self, text: &str) -> FsResult<usize> {
        let bytes = self.encoding.encode(text)?;
        self.inner.write_all(&bytes)?;
        Ok(text.chars().count())
    }

    /// Read up to `chars` characters.
    pub fn read(&mut self, chars: usize) -> FsResult<String> {
        let bytes = self.take_chars(chars, false)?;
        Ok(self.encoding.decode(&bytes)?.into_owned())
    }

    /// Read and decode everything from the cursor to the end.
    pub fn read_to_string(&mut self) -> FsResult<String> {
        let mut bytes = Vec::new();
        self.inner.read_to_end(&mut bytes)?;
        Ok(self.encoding.decode(&bytes)?.into_owned())
    }

    /// Read one line including its `\n`, or the rest of the text if there is
    /// no newline. With `limit`, at most that many characters are returned
    /// and the cursor stops right after them. Empty at end of file.
    pub fn read_line(&mut self, limit: Option<usize>) -> FsResult<String> {
        let bytes = self.take_chars(limit.unwrap_or(usize::MAX), true)?;
        Ok(self.encoding.decode(&bytes)?.into_owned())
    }

    /// Collect remaining lines. With `hint > 0`, stop once the lines read
    /// so far total at least `hint` bytes.
    pub fn read_lines(&mut self, hint: usize) -> FsResult<Vec<String>> {
        let mut lines = Vec::new();
        let mut total = 0;
        loop {
            let bytes = self.take_chars(usize::MAX, true)?;
            if bytes.is_empty() {
                break;
            }
            total += bytes.len();
            lines.push(self.encoding.decode(&bytes)?.into_owned());
            if hint > 0 && total >= hint {
                break;
            }
        }
        Ok(lines)
    }

    /// Iterate over the lines after the cursor. Lines already read are not
    /// revisited; use [`TextFile::lines_from_start`] for the whole file.
    pub fn lines(&mut self) -> Lines<'_, F> {
        Lines { file: self }
    }

    /// Rewind to the start, then iterate over every line.
    pub fn lines_from_start(&mut self) -> FsResult<Lines<'_, F>> {
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(self.lines())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        Ok(self.inner.seek(pos)?)
    }

    pub fn tell(&mut self) -> FsResult<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn flush(&mut self) -> FsResult<()> {
        Ok(self.inner.flush()?)
    }

    pub fn close(&mut self) -> FsResult<()> {
        self.inner.close()
    }

    /// Raw bytes of up to `budget` characters, ending after the first `\n`
    /// when `line` is set. A character split across buffer refills is
    /// joined before it is counted.
    fn take_chars(&mut self, mut budget: usize, line: bool) -> FsResult<Vec<u8>> {
        let mut out = Vec::new();
        // Trailing bytes of `out` that do not form a whole character yet.
        let mut partial = 0;
        while budget > 0 {
            let available = self.inner.fill_buf()?;
            if available.is_empty() {
                break;
            }

            if partial > 0 {
                out.push(available[0]);
                self.inner.consume(1);
                partial += 1;
                let (take, count) = self.encoding.char_prefix(&out[out.len() - partial..], 1);
                if take == partial {
                    partial = 0;
                    budget -= count;
                }
                continue;
            }

            let end = match available.iter().position(|&b| b == b'\n') {
                Some(i) if line => i + 1,
                _ => available.len(),
            };
            let (take, count) = self.encoding.char_prefix(&available[..end], budget);
            if take == 0 {
                out.push(available[0]);
                self.inner.consume(1);
                partial = 1;
                continue;
            }
            out.extend_from_slice(&available[..take]);
            self.inner.consume(take);
            budget -= count;
            if line && out.last() == Some(&b'\n') {
                break;
            }
        }
        Ok(out)
    }
}

/// Iterator over lines of a [`TextFile`]; see [`TextFile::lines`].
pub struct Lines<'a, F> {
    file: &'a mut TextFile<F>,
}

impl<F: FileStream> Iterator for Lines<'_, F> {
    type Item = FsResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.file.read_line(None) {
            Ok(line) if line.is_empty() => None,
            other => Some(other),
        }
    }
}
