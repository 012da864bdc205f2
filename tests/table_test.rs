//! Integration tests for tables and the database namespace

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use simpledb::common::TreeConfig;
use simpledb::{Database, DbError, ErrorKind};
use tempfile::NamedTempFile;

fn open(temp_file: &NamedTempFile) -> Database {
    Database::open_with_config(temp_file.path(), TreeConfig::default().with_max_keys(4)).unwrap()
}

#[test]
fn test_table_crud() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = open(&temp_file);
    let users = db.create_table("users").unwrap();

    users.insert(b"alice", b"admin").unwrap();
    users.insert(b"bob", b"viewer").unwrap();
    assert_eq!(users.select(b"alice").unwrap(), Some(Bytes::from_static(b"admin")));

    users.update(b"bob", b"editor").unwrap();
    assert_eq!(users.select(b"bob").unwrap(), Some(Bytes::from_static(b"editor")));

    users.delete(b"alice").unwrap();
    assert_eq!(users.select(b"alice").unwrap(), None);
    assert_eq!(users.len(), 1);
}

#[test]
fn test_table_missing_key_errors() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = open(&temp_file);
    let t = db.create_table("t").unwrap();

    let err = t.update(b"ghost", b"v").unwrap_err();
    assert!(matches!(err, DbError::KeyNotFound));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(matches!(t.delete(b"ghost"), Err(DbError::KeyNotFound)));
}

#[test]
fn test_database_namespace_errors() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = open(&temp_file);
    db.create_table("users").unwrap();

    let err = db.create_table("users").unwrap_err();
    assert!(matches!(err, DbError::TableAlreadyExists(ref n) if n == "users"));
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    assert!(matches!(db.table("nope"), Err(DbError::TableNotFound(_))));
    assert!(matches!(db.drop_table("nope"), Err(DbError::TableNotFound(_))));
    assert_eq!(
        db.create_table("").unwrap_err().kind(),
        ErrorKind::Validation
    );
}

#[test]
fn test_table_scan_after_key() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = open(&temp_file);
    let t = db.create_table("t").unwrap();
    for i in (0..30).rev() {
        t.insert(format!("k{:02}", i).as_bytes(), b"v").unwrap();
    }

    let mut scan = t.scan(b"k19").unwrap();
    assert!(scan.has_next());
    let keys: Vec<Bytes> = scan.by_ref().map(|e| e.unwrap().0).collect();
    let expected: Vec<Bytes> = (20..30).map(|i| Bytes::from(format!("k{:02}", i))).collect();
    assert_eq!(keys, expected);
    assert!(!scan.has_next());
}

#[test]
fn test_database_reopen_reattaches_tables() {
    let temp_file = NamedTempFile::new().unwrap();

    {
        let db = open(&temp_file);
        let a = db.create_table("alpha").unwrap();
        let b = db.create_table("beta").unwrap();
        for i in 0..40 {
            a.insert(format!("a{:02}", i).as_bytes(), b"1").unwrap();
        }
        b.insert(b"only", b"row").unwrap();
        db.close().unwrap();
    }

    let db = open(&temp_file);
    assert_eq!(db.table_names(), vec!["alpha".to_string(), "beta".to_string()]);
    let a = db.table("alpha").unwrap();
    assert_eq!(a.len(), 40);
    assert_eq!(a.select(b"a17").unwrap(), Some(Bytes::from_static(b"1")));
    assert_eq!(db.table("beta").unwrap().select(b"only").unwrap(), Some(Bytes::from_static(b"row")));
}

#[test]
fn test_drop_table_frees_pages() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = open(&temp_file);
    let t = db.create_table("temp").unwrap();
    for i in 0..40 {
        t.insert(format!("k{:02}", i).as_bytes(), b"v").unwrap();
    }
    let pages = db.page_manager().num_pages();

    db.drop_table("temp").unwrap();
    assert_eq!(db.page_manager().free_list_len() as u32, pages - 1);
    assert!(db.page_manager().root("temp").is_none());
    assert!(matches!(t.select(b"k01"), Err(DbError::TableNotFound(_))));
    assert!(db.table_names().is_empty());

    // Recreating reuses freed pages instead of growing the file
    let t = db.create_table("temp").unwrap();
    assert!(t.is_empty());
    t.insert(b"k", b"v").unwrap();
    assert_eq!(db.page_manager().num_pages(), pages);
}

#[test]
fn test_table_concurrent_readers() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = open(&temp_file);
    let t = db.create_table("t").unwrap();
    for i in 0..100 {
        t.insert(format!("k{:03}", i).as_bytes(), format!("{}", i).as_bytes())
            .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let t = Arc::clone(&t);
            thread::spawn(move || {
                for i in (n..100).step_by(4) {
                    let value = t.select(format!("k{:03}", i).as_bytes()).unwrap();
                    assert_eq!(value, Some(Bytes::from(format!("{}", i))));
                }
                t.scan(b"").unwrap().count()
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), 100);
    }
}

#[test]
fn test_table_writer_and_readers() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = open(&temp_file);
    let t = db.create_table("t").unwrap();

    let writer = {
        let t = Arc::clone(&t);
        thread::spawn(move || {
            for i in 0..50 {
                t.insert(format!("k{:02}", i).as_bytes(), b"v").unwrap();
            }
        })
    };
    let reader = {
        let t = Arc::clone(&t);
        thread::spawn(move || {
            for _ in 0..20 {
                // Every scan sees a consistent, ascending snapshot
                let keys: Vec<Bytes> = t.scan(b"").unwrap().map(|e| e.unwrap().0).collect();
                assert!(keys.windows(2).all(|w| w[0] < w[1]));
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(t.len(), 50);
}

#[test]
fn test_table_debug_shows_name() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = open(&temp_file);
    let t = db.create_table("orders").unwrap();
    assert!(format!("{:?}", t).contains("orders"));
}

#[test]
fn test_dropped_table_stays_dropped_after_reopen() {
    let temp_file = NamedTempFile::new().unwrap();

    {
        let db = open(&temp_file);
        db.create_table("keep").unwrap().insert(b"k", b"v").unwrap();
        db.create_table("gone").unwrap().insert(b"k", b"v").unwrap();
        db.drop_table("gone").unwrap();
        assert_eq!(db.table_names(), vec!["keep".to_string()]);
        db.close().unwrap();
    }

    let db = open(&temp_file);
    assert_eq!(db.table_names(), vec!["keep".to_string()]);
    assert!(db.page_manager().root("gone").is_none());
    assert!(matches!(db.table("gone"), Err(DbError::TableNotFound(_))));
}
