//! Filesystem facade.
//!
//! [`RowFs`] ties a shared [`ContentStore`] to the [`PathResolver`] for its
//! root. Clones share the store, so handles opened from any clone commit to
//! the same rows.

use std::path::Path;
use std::sync::Arc;

use rowfs_types::{CanonicalKey, Encoding, FileRecord, OpenMode, PathResolver};
use tracing::info;

use crate::commit::Coordinator;
use crate::config::RowFsConfig;
use crate::error::{FsError, FsResult};
use crate::handle::FileHandle;
use crate::inspect::Inspector;
use crate::store::ContentStore;
use crate::text::TextFile;

/// A virtual file tree stored in one SQLite database.
#[derive(Debug, Clone)]
pub struct RowFs {
    coordinator: Coordinator,
    resolver: PathResolver,
    encoding: Encoding,
}

impl RowFs {
    /// Open the store and root described by `config`.
    pub fn open_config(config: &RowFsConfig) -> FsResult<Self> {
        let store = ContentStore::open_with(config)?;
        let resolver = PathResolver::new(config.resolved_root()?)?;
        info!(
            database = %config.database.display(),
            root = %resolver.root().display(),
            "rowfs opened"
        );
        Ok(Self::with_store(Arc::new(store), resolver, config.encoding))
    }

    /// Build on an existing store.
    pub fn with_store(store: Arc<ContentStore>, resolver: PathResolver, encoding: Encoding) -> Self {
        Self {
            coordinator: Coordinator::new(store),
            resolver,
            encoding,
        }
    }

    /// In-memory store rooted at the process working directory.
    pub fn in_memory() -> FsResult<Self> {
        Self::open_config(&RowFsConfig::in_memory())
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        self.coordinator.store()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Default encoding for text handles.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Canonical key for `path`.
    pub fn resolve(&self, path: impl AsRef<Path>) -> FsResult<CanonicalKey> {
        Ok(self.resolver.resolve(path)?)
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Open `path` with a mode string such as `"r"`, `"w+"` or `"ab"`.
    pub fn open(&self, path: impl AsRef<Path>, mode: &str) -> FsResult<FileHandle> {
        self.open_with(path, mode.parse()?)
    }

    pub fn open_with(&self, path: impl AsRef<Path>, mode: OpenMode) -> FsResult<FileHandle> {
        self.open_key(self.resolve(path)?, mode)
    }

    /// Open an already resolved key.
    pub(crate) fn open_key(&self, key: CanonicalKey, mode: OpenMode) -> FsResult<FileHandle> {
        FileHandle::open(self.coordinator.clone(), key, mode)
    }

    /// Open `path` for text. Binary modes are rejected.
    pub fn open_text(
        &self,
        path: impl AsRef<Path>,
        mode: &str,
        encoding: Option<Encoding>,
    ) -> FsResult<TextFile<FileHandle>> {
        let mode: OpenMode = mode.parse()?;
        if mode.binary {
            return Err(rowfs_types::ModeError::BinaryText(mode.to_string()).into());
        }
        let handle = self.open_with(path, mode)?;
        Ok(TextFile::new(handle, encoding.unwrap_or(self.encoding)))
    }

    // ========================================================================
    // Whole-file helpers
    // ========================================================================

    pub fn exists(&self, path: impl AsRef<Path>) -> FsResult<bool> {
        self.store().exists(&self.resolve(path)?)
    }

    /// Committed content of `path`.
    pub fn read(&self, path: impl AsRef<Path>) -> FsResult<Vec<u8>> {
        self.store().read(&self.resolve(path)?)
    }

    /// Replace the content of `path` in one commit.
    pub fn write(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> FsResult<()> {
        let mut handle = self.open(path, "wb")?;
        handle.write(content.as_ref())?;
        handle.close()
    }

    /// Delete `path`; `NotFound` if there was nothing to delete.
    pub fn remove(&self, path: impl AsRef<Path>) -> FsResult<()> {
        let key = self.resolve(path)?;
        if self.coordinator.remove(&key)? {
            Ok(())
        } else {
            Err(FsError::not_found(&key))
        }
    }

    /// Every stored key, in order.
    pub fn list(&self) -> FsResult<Vec<CanonicalKey>> {
        self.store().list("")
    }

    /// Stored keys under a directory prefix such as `"logs"`.
    pub fn list_dir(&self, dir: impl AsRef<Path>) -> FsResult<Vec<CanonicalKey>> {
        let key = self.resolve(dir)?;
        self.store().list(&format!("{key}/"))
    }

    pub fn stat(&self, path: impl AsRef<Path>) -> FsResult<Option<FileRecord>> {
        self.store().stat(&self.resolve(path)?)
    }

    // ========================================================================
    // Transactions and inspection
    // ========================================================================

    /// Commit several handles atomically; see [`Coordinator::commit_all`].
    pub fn commit_all(&self, handles: &mut [&mut FileHandle]) -> FsResult<usize> {
        self.coordinator.commit_all(handles)
    }

    pub fn inspect(&self) -> Inspector {
        Inspector::new(Arc::clone(self.store()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs() -> RowFs {
        let resolver = PathResolver::new("/srv/app").unwrap();
        RowFs::with_store(Arc::new(ContentStore::in_memory().unwrap()), resolver, Encoding::Utf8)
    }

    #[test]
    fn test_helpers() {
        let fs = fs();
        assert!(!fs.exists("notes.txt").unwrap());
        fs.write("notes.txt", "first").unwrap();
        assert!(fs.exists("/srv/app/notes.txt").unwrap());
        assert_eq!(fs.read("./notes.txt").unwrap(), b"first");
        assert_eq!(fs.stat("notes.txt").unwrap().unwrap().size(), 5);

        fs.remove("notes.txt").unwrap();
        assert!(matches!(fs.remove("notes.txt"), Err(FsError::NotFound(_))));
        assert!(fs.stat("notes.txt").unwrap().is_none());
    }

    #[test]
    fn test_equivalent_paths_share_a_row() {
        let fs = fs();
        fs.write("logs/app.log", "x").unwrap();
        for alias in ["logs//app.log", "logs/./app.log", "tmp/../logs/app.log", "logs\\app.log"] {
            assert_eq!(fs.read(alias).unwrap(), b"x", "{alias}");
        }
        assert_eq!(fs.list().unwrap(), vec![CanonicalKey::from_stored("logs/app.log")]);
    }

    #[test]
    fn test_list_dir() {
        let fs = fs();
        for path in ["logs/a.log", "logs/b.log", "logsbook.txt", "other/c"] {
            fs.write(path, "").unwrap();
        }
        let logs: Vec<String> = fs
            .list_dir("logs")
            .unwrap()
            .into_iter()
            .map(CanonicalKey::into_string)
            .collect();
        assert_eq!(logs, ["logs/a.log", "logs/b.log"]);
    }

    #[test]
    fn test_open_rejects_bad_input() {
        let fs = fs();
        assert!(matches!(fs.open("", "r"), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.open("a\0b", "w"), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.open("f", "rw"), Err(FsError::InvalidMode(_))));
        assert!(matches!(fs.open("f", "x"), Err(FsError::InvalidMode(_))));
        assert!(matches!(fs.open_text("f", "wb", None), Err(FsError::InvalidMode(_))));
    }

    #[test]
    fn test_open_text_uses_default_encoding() {
        let resolver = PathResolver::new("/data").unwrap();
        let fs = RowFs::with_store(Arc::new(ContentStore::in_memory().unwrap()), resolver, Encoding::Latin1);
        let mut f = fs.open_text("t.txt", "w", None).unwrap();
        assert_eq!(f.encoding(), Encoding::Latin1);
        f.write_str("é").unwrap();
        f.close().unwrap();
        assert_eq!(fs.read("t.txt").unwrap(), [0xe9]);

        let mut f = fs.open_text("t.txt", "r", Some(Encoding::Utf8)).unwrap();
        assert!(matches!(f.read_to_string(), Err(FsError::Encoding(_))));
    }

    #[test]
    fn test_clones_share_the_store() {
        let fs = fs();
        let other = fs.clone();
        other.write("shared", "yes").unwrap();
        assert_eq!(fs.read("shared").unwrap(), b"yes");
        assert!(Arc::ptr_eq(fs.store(), other.store()));
    }
}
