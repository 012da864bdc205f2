use bytes::Bytes;

use crate::common::Result;

use super::btree::BPlusTree;
use super::btree_iterator::TreeCursor;
use super::store::NodeStore;

/// The key-value contract the table layer is written against.
pub trait KeyValueStore {
    type Cursor<'a>: Iterator<Item = Result<(Bytes, Bytes)>>
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Inserts or overwrites.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes `key` if present; returns whether anything was removed.
    fn delete(&mut self, key: &[u8]) -> Result<bool>;

    /// Entries with keys strictly greater than `key`, ascending.
    fn find_larger(&self, key: &[u8]) -> Result<Self::Cursor<'_>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: NodeStore> KeyValueStore for BPlusTree<S> {
    type Cursor<'a> = TreeCursor<'a, S> where Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        BPlusTree::get(self, key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        BPlusTree::set(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        BPlusTree::delete(self, key)
    }

    fn find_larger(&self, key: &[u8]) -> Result<Self::Cursor<'_>> {
        BPlusTree::find_larger(self, key)
    }

    fn len(&self) -> usize {
        BPlusTree::len(self)
    }
}
