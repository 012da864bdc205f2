//! SimpleDB - a single-file key-value database built on a B+Tree
//!
//! Keys and values are arbitrary byte strings, ordered by byte-wise
//! comparison. Data lives in one file of fixed 4 KiB pages; every mutation is
//! written through synchronously, so a completed call is durable.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): file I/O and page formats
//!   - `PageManager`: allocates, frees, reads and writes pages in one file
//!   - `Page`: a 16-byte header plus payload, checksummed on write
//!   - `MetaPage`: page 0, holding the catalog of named tree roots
//!
//! - **Index** (`index`): one B+Tree algorithm over two node stores
//!   - `MemBTree`: nodes kept in an in-process arena
//!   - `DiskBTree`: one node per page, with a bounded node cache
//!   - `KeyValueStore`: the get, set, delete and ordered-scan contract
//!
//! - **Tables** (`table`): named trees inside one database file
//!   - `Database`: creates, opens and drops tables
//!   - `Table`: a tree behind a reader/writer lock
//!
//! # Example
//!
//! ```rust,no_run
//! use simpledb::Database;
//!
//! let db = Database::open("example.db").unwrap();
//! let users = db.create_table("users").unwrap();
//! users.insert(b"alice", b"admin").unwrap();
//! assert_eq!(users.select(b"alice").unwrap().as_deref(), Some(&b"admin"[..]));
//!
//! for entry in users.scan(b"").unwrap() {
//!     let (key, value) = entry.unwrap();
//!     println!("{:?} = {:?}", key, value);
//! }
//! db.close().unwrap();
//! ```

pub mod common;
pub mod index;
pub mod storage;
pub mod table;

// Re-export commonly used types at the crate root
pub use common::{DbError, ErrorKind, PageId, Result, TreeConfig};
pub use index::{DiskBTree, KeyValueStore, MemBTree};
pub use table::{Database, Table};
