//! Behavioural properties of handles over the content store.
//!
//! Everything here goes through the public [`RowFs`] surface and checks the
//! stored row afterwards, either with `RowFs::read` or an inspection query.

use std::io::SeekFrom;
use std::sync::Arc;
use std::thread;

use rowfs_kernel::{ContentStore, Encoding, FsError, PathResolver, RowFs};
use rusqlite::types::Value;

// ============================================================================
// Shared test setup
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fs() -> RowFs {
    init_tracing();
    let resolver = PathResolver::new("/work").unwrap();
    RowFs::with_store(Arc::new(ContentStore::in_memory().unwrap()), resolver, Encoding::Utf8)
}

fn write_file(fs: &RowFs, path: &str, data: &[u8]) {
    let mut h = fs.open(path, "w").unwrap();
    h.write(data).unwrap();
    h.close().unwrap();
}

fn modified_at(fs: &RowFs, path: &str) -> i64 {
    fs.stat(path).unwrap().unwrap().modified_at()
}

// ============================================================================
// Round trips and mode semantics
// ============================================================================

#[test]
fn write_then_read_returns_the_same_bytes() {
    let fs = fs();
    let samples: [&[u8]; 5] = [b"", b"hello", &[0, 0, 0], &[0xff, 0xfe, 0x00, 0x10], &[b'x'; 4096]];
    for (i, bytes) in samples.iter().enumerate() {
        let path = format!("sample-{i}.bin");
        write_file(&fs, &path, bytes);
        let mut h = fs.open(&path, "rb").unwrap();
        assert_eq!(h.read_to_end().unwrap(), *bytes);
        h.close().unwrap();
    }
}

#[test]
fn append_is_monotonic_regardless_of_seeks() {
    let fs = fs();
    let mut h = fs.open("log.txt", "a").unwrap();
    h.write(b"first;").unwrap();
    h.close().unwrap();

    let mut h = fs.open("log.txt", "a").unwrap();
    h.seek(SeekFrom::Start(0)).unwrap();
    h.write(b"second;").unwrap();
    h.seek(SeekFrom::Current(-100)).unwrap_err();
    h.seek(SeekFrom::Start(2)).unwrap();
    h.write(b"third").unwrap();
    h.close().unwrap();

    assert_eq!(fs.read("log.txt").unwrap(), b"first;second;third");
}

#[test]
fn seek_past_end_then_write_zero_fills() {
    let fs = fs();
    write_file(&fs, "sparse", b"abc");

    let mut h = fs.open("sparse", "r+").unwrap();
    h.seek(SeekFrom::Start(8)).unwrap();
    h.write(b"XY").unwrap();
    h.close().unwrap();

    let stored = fs.read("sparse").unwrap();
    assert_eq!(stored.len(), 8 + 2);
    assert_eq!(&stored[..3], b"abc");
    assert!(stored[3..8].iter().all(|&b| b == 0));
    assert_eq!(&stored[8..], b"XY");
}

#[test]
fn truncate_keeps_prefix() {
    let fs = fs();
    write_file(&fs, "t", b"0123456789");
    let mut h = fs.open("t", "r+").unwrap();
    h.truncate(4).unwrap();
    h.close().unwrap();
    assert_eq!(fs.read("t").unwrap(), b"0123");
}

#[test]
fn rewriting_identical_content_advances_time_only() {
    let fs = fs();
    write_file(&fs, "same", b"content");
    let first = modified_at(&fs, "same");
    write_file(&fs, "same", b"content");
    let second = modified_at(&fs, "same");

    assert_eq!(fs.read("same").unwrap(), b"content");
    assert!(second > first);
}

#[test]
fn read_past_end_shortens_then_empties() {
    let fs = fs();
    write_file(&fs, "short", b"abc");
    let mut h = fs.open("short", "r").unwrap();
    assert_eq!(h.read(10).unwrap(), b"abc");
    assert_eq!(h.read(10).unwrap(), b"");
    h.seek(SeekFrom::Start(100)).unwrap();
    assert_eq!(h.read(1).unwrap(), b"");
}

#[test]
fn hello_world_scenario() {
    let fs = fs();
    let mut h = fs.open("file.txt", "w").unwrap();
    h.write(b"hello").unwrap();
    h.close().unwrap();
    assert_eq!(fs.read("file.txt").unwrap(), b"hello");

    let mut h = fs.open("file.txt", "a").unwrap();
    h.write(b"world").unwrap();
    h.close().unwrap();
    assert_eq!(fs.read("file.txt").unwrap(), b"helloworld");

    let mut h = fs.open("file.txt", "r").unwrap();
    assert_eq!(h.read(11).unwrap(), b"helloworld");
    assert_eq!(h.read(1).unwrap(), b"");
    h.close().unwrap();
}

#[test]
fn read_modes_do_not_create() {
    let fs = fs();
    assert!(matches!(fs.open("ghost", "r"), Err(FsError::NotFound(_))));
    assert!(matches!(fs.open("ghost", "r+"), Err(FsError::NotFound(_))));
    assert!(!fs.exists("ghost").unwrap());

    // Creating modes only materialise the row on commit.
    let h = fs.open("later", "a").unwrap();
    assert!(!fs.exists("later").unwrap());
    drop(h);
    assert!(fs.exists("later").unwrap());
    assert_eq!(fs.read("later").unwrap(), b"");
}

// ============================================================================
// Isolation and concurrency
// ============================================================================

#[test]
fn open_buffers_are_invisible_until_commit() {
    let fs = fs();
    write_file(&fs, "doc", b"committed");
    let inspector = fs.inspect();

    let mut writer = fs.open("doc", "w").unwrap();
    writer.write(b"draft").unwrap();

    let rows = inspector
        .query("SELECT content, size FROM files WHERE path = ?1", ["doc"])
        .unwrap();
    assert_eq!(rows.rows[0], vec![Value::Blob(b"committed".to_vec()), Value::Integer(9)]);

    let mut reader = fs.open("doc", "r").unwrap();
    assert_eq!(reader.read_to_end().unwrap(), b"committed");

    writer.flush().unwrap();
    assert_eq!(fs.read("doc").unwrap(), b"draft");
    // The reader keeps its snapshot.
    reader.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(reader.read_to_end().unwrap(), b"committed");
    writer.close().unwrap();
    reader.close().unwrap();
}

#[test]
fn last_commit_wins_between_handles() {
    let fs = fs();
    write_file(&fs, "shared", b"base");

    let mut a = fs.open("shared", "a").unwrap();
    let mut b = fs.open("shared", "a").unwrap();
    a.write(b"+a").unwrap();
    b.write(b"+b").unwrap();
    a.close().unwrap();
    assert_eq!(fs.read("shared").unwrap(), b"base+a");
    b.close().unwrap();
    assert_eq!(fs.read("shared").unwrap(), b"base+b");
}

#[test]
fn threads_on_distinct_paths_do_not_interfere() {
    let fs = fs();
    let workers: Vec<_> = (0..8)
        .map(|i| {
            let fs = fs.clone();
            thread::spawn(move || {
                let path = format!("worker-{i}.log");
                for round in 0..20 {
                    let mut h = fs.open(&path, "a").unwrap();
                    h.write(format!("{round},").as_bytes()).unwrap();
                    h.close().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let expected: String = (0..20).map(|round| format!("{round},")).collect();
    for i in 0..8 {
        assert_eq!(fs.read(format!("worker-{i}.log")).unwrap(), expected.as_bytes());
    }
    assert_eq!(fs.list().unwrap().len(), 8);
}

// ============================================================================
// Batch commits
// ============================================================================

#[test]
fn commit_all_commits_every_dirty_handle() {
    let fs = fs();
    write_file(&fs, "untouched", b"same");

    let mut a = fs.open("a.txt", "w").unwrap();
    let mut b = fs.open("b.txt", "w").unwrap();
    let mut clean = fs.open("untouched", "r").unwrap();
    a.write(b"alpha").unwrap();
    b.write(b"beta").unwrap();

    let committed = fs.commit_all(&mut [&mut a, &mut b, &mut clean]).unwrap();
    assert_eq!(committed, 2);
    assert!(!a.is_dirty() && !b.is_dirty());
    assert_eq!(fs.read("a.txt").unwrap(), b"alpha");
    assert_eq!(fs.read("b.txt").unwrap(), b"beta");

    // Handles stay open and usable after a batch commit.
    a.write(b"!").unwrap();
    a.close().unwrap();
    assert_eq!(fs.read("a.txt").unwrap(), b"alpha!");
}

#[test]
fn commit_all_is_all_or_nothing() {
    let fs = fs();
    write_file(&fs, "frozen", b"old");
    fs.inspect()
        .with_connection(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER freeze BEFORE UPDATE ON files
                 WHEN OLD.path = 'frozen'
                 BEGIN SELECT RAISE(ABORT, 'frozen'); END;",
            )
        })
        .unwrap();

    let mut fresh = fs.open("fresh", "w").unwrap();
    let mut frozen = fs.open("frozen", "w").unwrap();
    fresh.write(b"new").unwrap();
    frozen.write(b"new").unwrap();

    let err = fs.commit_all(&mut [&mut fresh, &mut frozen]).unwrap_err();
    assert!(matches!(err, FsError::Storage(_)));
    assert!(!fs.exists("fresh").unwrap());
    assert_eq!(fs.read("frozen").unwrap(), b"old");
    assert!(fresh.is_dirty() && frozen.is_dirty());

    fresh.close().unwrap();
    assert_eq!(fs.read("fresh").unwrap(), b"new");
    frozen.abandon();
}

#[test]
fn commit_all_rejects_foreign_and_closed_handles() {
    let fs = fs();
    let other = self::fs();

    let mut mine = fs.open("m", "w").unwrap();
    let mut theirs = other.open("t", "w").unwrap();
    assert!(matches!(
        fs.commit_all(&mut [&mut mine, &mut theirs]),
        Err(FsError::ForeignHandle(_))
    ));
    assert!(!fs.exists("m").unwrap());

    theirs.close().unwrap();
    let mut closed = fs.open("c", "w").unwrap();
    closed.close().unwrap();
    assert!(matches!(
        fs.commit_all(&mut [&mut mine, &mut closed]),
        Err(FsError::ClosedHandle(_))
    ));
    mine.close().unwrap();
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn database_file_carries_the_tree() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = std::fs::canonicalize(dir.path()).unwrap();
    let config = rowfs_kernel::RowFsConfig::default()
        .with_database(root.join("tree.db"))
        .with_root(&root);

    {
        let fs = RowFs::open_config(&config).unwrap();
        fs.write("notes/today.md", "# today\n").unwrap();
        fs.write(root.join("notes/tomorrow.md"), "# tomorrow\n").unwrap();
    }
    assert!(!root.join("notes").exists());

    let fs = RowFs::open_config(&config).unwrap();
    let keys: Vec<String> = fs.list().unwrap().into_iter().map(|k| k.into_string()).collect();
    assert_eq!(keys, ["notes/today.md", "notes/tomorrow.md"]);
    assert_eq!(fs.read("notes/tomorrow.md").unwrap(), b"# tomorrow\n");
}
