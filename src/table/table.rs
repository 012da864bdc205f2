use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::common::{DbError, PageId, Result, TreeConfig};
use crate::index::{DiskBTree, ScanState};
use crate::storage::disk::PageManager;

/// A named key-value table backed by one persistent B+Tree.
///
/// Reads (`select`, `scan`) run concurrently; writes are exclusive. Once the
/// table is dropped from its database every operation fails with
/// `TableNotFound`.
pub struct Table {
    name: String,
    tree: RwLock<Option<DiskBTree>>,
}

impl Table {
    pub(crate) fn open(pm: Arc<PageManager>, name: &str, config: TreeConfig) -> Result<Self> {
        let tree = DiskBTree::open(pm, name, config)?;
        Ok(Self {
            name: name.to_string(),
            tree: RwLock::new(Some(tree)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn dropped(&self) -> DbError {
        DbError::TableNotFound(self.name.clone())
    }

    /// Inserts `key`, replacing any existing value.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut guard = self.tree.write();
        let tree = (*guard).as_mut().ok_or_else(|| self.dropped())?;
        tree.set(key, value)
    }

    pub fn select(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let guard = self.tree.read();
        let tree = (*guard).as_ref().ok_or_else(|| self.dropped())?;
        tree.get(key)
    }

    /// Replaces the value of an existing key.
    pub fn update(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut guard = self.tree.write();
        let tree = (*guard).as_mut().ok_or_else(|| self.dropped())?;
        if !tree.contains_key(key)? {
            return Err(DbError::KeyNotFound);
        }
        tree.set(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut guard = self.tree.write();
        let tree = (*guard).as_mut().ok_or_else(|| self.dropped())?;
        if !tree.delete(key)? {
            return Err(DbError::KeyNotFound);
        }
        Ok(())
    }

    /// Entries with keys strictly greater than `start_key`, ascending. The
    /// scan holds the table's read lock until it is dropped.
    pub fn scan(&self, start_key: &[u8]) -> Result<TableScan<'_>> {
        let guard = self.tree.read();
        let tree = (*guard).as_ref().ok_or_else(|| self.dropped())?;
        let state = tree.scan_state(start_key)?;
        Ok(TableScan { guard, state })
    }

    pub fn len(&self) -> usize {
        match &*self.tree.read() {
            Some(tree) => tree.len(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the table's node cache.
    pub fn close(&self) -> Result<()> {
        match &mut *self.tree.write() {
            Some(tree) => tree.close(),
            None => Ok(()),
        }
    }

    /// Frees every page of the table and detaches it.
    pub(crate) fn destroy(&self) -> Result<()> {
        let tree = self.tree.write().take().ok_or_else(|| self.dropped())?;
        let freed = tree.destroy()?;
        debug!("table {:?} released {} pages", self.name, freed);
        Ok(())
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Iterator returned by [`Table::scan`].
pub struct TableScan<'a> {
    guard: RwLockReadGuard<'a, Option<DiskBTree>>,
    state: ScanState<PageId>,
}

impl TableScan<'_> {
    pub fn has_next(&self) -> bool {
        self.state.has_next()
    }
}

impl Iterator for TableScan<'_> {
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = (*self.guard).as_ref()?;
        self.state.next_entry(tree.store())
    }
}
