use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::common::{DbError, Result, TreeConfig};
use crate::storage::disk::PageManager;

use super::table::Table;

/// A database file holding any number of named tables.
///
/// Each table is a B+Tree whose root is recorded in the file's catalog, so
/// reopening the file reattaches every table created before.
pub struct Database {
    pm: Arc<PageManager>,
    config: TreeConfig,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, TreeConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let pm = Arc::new(PageManager::open(path)?);

        let mut tables = HashMap::new();
        for (name, _) in pm.roots() {
            let table = Table::open(Arc::clone(&pm), &name, config)?;
            tables.insert(name, Arc::new(table));
        }
        info!(
            "opened database {} with {} tables",
            pm.db_path().display(),
            tables.len()
        );

        Ok(Self {
            pm,
            config,
            tables: RwLock::new(tables),
        })
    }

    pub fn create_table(&self, name: &str) -> Result<Arc<Table>> {
        if name.is_empty() {
            return Err(DbError::InvalidTableName(name.to_string()));
        }

        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(DbError::TableAlreadyExists(name.to_string()));
        }
        let table = Arc::new(Table::open(Arc::clone(&self.pm), name, self.config)?);
        tables.insert(name.to_string(), Arc::clone(&table));
        info!("created table {:?}", name);
        Ok(table)
    }

    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Removes the table from the catalog and frees all of its pages.
    /// Handles still held by callers fail with `TableNotFound` afterwards.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.contains_key(name) {
            return Err(DbError::TableNotFound(name.to_string()));
        }
        // A failed catalog write leaves the table attached.
        self.pm.remove_root(name)?;
        let table = tables
            .remove(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?;
        drop(tables);
        table.destroy()?;
        info!("dropped table {:?}", name);
        Ok(())
    }

    /// Table names in ascending order.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn page_manager(&self) -> &Arc<PageManager> {
        &self.pm
    }

    pub fn close(&self) -> Result<()> {
        for table in self.tables.read().values() {
            table.close()?;
        }
        self.pm.close()
    }
}
