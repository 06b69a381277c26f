//! Kernel error types.

use std::io;

use rowfs_types::{CanonicalKey, EncodingError, ModeError, PathError};
use thiserror::Error;

/// Kernel error type.
#[derive(Debug, Error)]
pub enum FsError {
    /// Malformed path input.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Malformed mode string.
    #[error("invalid mode: {0}")]
    InvalidMode(#[from] ModeError),

    /// Read-oriented open (or row read) of a path with no record.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation on a handle after close.
    #[error("I/O operation on closed file: {0}")]
    ClosedHandle(String),

    /// Seek would land before the start of the file.
    #[error("invalid seek: resulting offset {offset} is out of range")]
    InvalidSeek { offset: i128 },

    /// Buffer would grow past what can be allocated.
    #[error("file too large: {requested} bytes requested")]
    TooLarge { requested: u64 },

    /// Text could not be encoded or decoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Read on a handle opened without read access.
    #[error("file not open for reading: {0}")]
    NotReadable(String),

    /// Write or truncate on a handle opened without write access.
    #[error("file not open for writing: {0}")]
    NotWritable(String),

    /// The backing store rejected an operation.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Inspection query would modify the store.
    #[error("inspection query is not read-only: {0}")]
    ReadOnlyQuery(String),

    /// Handle passed to a filesystem it was not opened from.
    #[error("handle for {0} belongs to a different store")]
    ForeignHandle(String),

    /// Redirect used before anything was installed.
    #[error("redirect is not installed")]
    NotInstalled,

    /// Configuration failed to parse.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Native filesystem error.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(key: &CanonicalKey) -> Self {
        Self::NotFound(key.to_string())
    }

    /// Create a ClosedHandle error.
    pub fn closed(key: &CanonicalKey) -> Self {
        Self::ClosedHandle(key.to_string())
    }

    /// Create a NotReadable error.
    pub fn not_readable(key: &CanonicalKey) -> Self {
        Self::NotReadable(key.to_string())
    }

    /// Create a NotWritable error.
    pub fn not_writable(key: &CanonicalKey) -> Self {
        Self::NotWritable(key.to_string())
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            FsError::InvalidPath(_)
            | FsError::InvalidMode(_)
            | FsError::InvalidSeek { .. }
            | FsError::ForeignHandle(_) => io::ErrorKind::InvalidInput,
            FsError::NotFound(_) => io::ErrorKind::NotFound,
            FsError::TooLarge { .. } => io::ErrorKind::OutOfMemory,
            FsError::Encoding(_) | FsError::Config(_) => io::ErrorKind::InvalidData,
            FsError::NotReadable(_) | FsError::NotWritable(_) => io::ErrorKind::Unsupported,
            FsError::ReadOnlyQuery(_) => io::ErrorKind::PermissionDenied,
            FsError::ClosedHandle(_) | FsError::Storage(_) | FsError::NotInstalled => {
                io::ErrorKind::Other
            }
            FsError::Io(e) => e.kind(),
        }
    }
}

/// Convert FsError to std::io::Error, keeping the original as the source.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Io(e) => e,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

/// Recover an FsError that travelled through `std::io`; anything else is Io.
impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<FsError>()) {
            return FsError::Io(e);
        }
        match e.into_inner().map(|inner| inner.downcast::<FsError>()) {
            Some(Ok(fs)) => *fs,
            Some(Err(other)) => FsError::Io(io::Error::other(other)),
            None => FsError::Io(io::Error::other("empty I/O error")),
        }
    }
}

/// Kernel result type.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_roundtrip_keeps_variant() {
        let key = CanonicalKey::from_stored("a.txt");
        let io_err: io::Error = FsError::closed(&key).into();
        assert_eq!(io_err.kind(), io::ErrorKind::Other);

        let back = FsError::from(io_err);
        assert!(matches!(back, FsError::ClosedHandle(ref p) if p == "a.txt"));
    }

    #[test]
    fn test_plain_io_error_stays_io() {
        let err = FsError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, FsError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn test_kind_mapping() {
        let key = CanonicalKey::from_stored("x");
        let io_err: io::Error = FsError::not_found(&key).into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
        let io_err: io::Error = FsError::InvalidSeek { offset: -1 }.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
        let io_err: io::Error = FsError::TooLarge { requested: u64::MAX }.into();
        assert_eq!(io_err.kind(), io::ErrorKind::OutOfMemory);
        let io_err: io::Error = FsError::not_writable(&key).into();
        assert_eq!(io_err.kind(), io::ErrorKind::Unsupported);
    }
}
