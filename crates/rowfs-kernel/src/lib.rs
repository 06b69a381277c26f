//! # rowfs-kernel
//!
//! Ordinary file operations over rows in a SQLite table.
//!
//! Callers open paths and read, write, seek and close as usual; the bytes
//! live in one `files` table instead of on disk. The pieces:
//! - [`ContentStore`] holds one row per file and runs every mutation atomically
//! - [`FileHandle`] buffers a private copy of a row and commits on flush/close
//! - [`Coordinator`] maps each commit, or a batch of them, to one transaction
//! - [`TextFile`] encodes and decodes over any handle
//! - [`Inspector`] runs read-only SQL against committed rows
//! - [`Redirect`] routes opens between a [`RowFs`] and the native filesystem

pub mod commit;
pub mod config;
pub mod error;
pub mod fs;
pub mod handle;
pub mod inspect;
pub mod native;
pub mod redirect;
pub mod store;
pub mod text;

pub use commit::Coordinator;
pub use config::{IN_MEMORY, RowFsConfig};
pub use error::{FsError, FsResult};
pub use fs::RowFs;
pub use handle::FileHandle;
pub use inspect::{Inspector, QueryRows};
pub use native::NativeFile;
pub use redirect::{OpenFile, Redirect};
pub use store::{ContentStore, StoreTx};
pub use text::{FileStream, Lines, TextFile};

pub use rowfs_types::{
    Access, CanonicalKey, Encoding, EncodingError, FileRecord, ModeError, OpenMode, PathError,
    PathResolver,
};
