use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use crate::common::{DbError, PageId, Result, TreeConfig};
use crate::storage::disk::PageManager;
use crate::storage::page::{Page, PageType};

use super::btree::BPlusTree;
use super::node::{LeafNode, Node};
use super::node_codec;
use super::store::NodeStore;

/// Node store backed by pages.
///
/// Handles are page IDs. Loads go through a cache of decoded nodes; every
/// store encodes the node and writes its page synchronously, so the cache
/// never holds anything that is not already durable.
pub struct PageStore {
    pm: Arc<PageManager>,
    /// Catalog name under which the root page is recorded
    name: String,
    root: PageId,
    cache: RwLock<HashMap<PageId, Arc<Node<PageId>>>>,
    cache_capacity: usize,
}

impl PageStore {
    /// Attaches to the tree recorded as `name`, creating an empty one if the
    /// catalog has no entry for it.
    pub fn open(pm: Arc<PageManager>, name: &str, cache_capacity: usize) -> Result<Self> {
        let mut store = Self {
            pm,
            name: name.to_string(),
            root: PageId::new(0),
            cache: RwLock::new(HashMap::new()),
            cache_capacity,
        };

        match store.pm.root(name) {
            Some(root) => {
                store.root = root;
                info!("attached tree {:?} at root {}", name, root);
            }
            None => {
                let root = store.allocate(Node::Leaf(LeafNode::new()))?;
                store.set_root(root)?;
                info!("created tree {:?} at root {}", name, root);
            }
        }

        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_manager(&self) -> &Arc<PageManager> {
        &self.pm
    }

    pub fn cached_nodes(&self) -> usize {
        self.cache.read().len()
    }

    fn cache_insert(&self, page_id: PageId, node: Arc<Node<PageId>>) {
        let mut cache = self.cache.write();
        if cache.len() >= self.cache_capacity && !cache.contains_key(&page_id) {
            debug!("node cache of {:?} full, dropping {} nodes", self.name, cache.len());
            cache.clear();
        }
        cache.insert(page_id, node);
    }

    fn page_type(node: &Node<PageId>) -> PageType {
        if node.is_leaf() {
            PageType::Leaf
        } else {
            PageType::Internal
        }
    }
}

impl NodeStore for PageStore {
    type Handle = PageId;

    fn root(&self) -> PageId {
        self.root
    }

    fn set_root(&mut self, root: PageId) -> Result<()> {
        self.pm.set_root(&self.name, root)?;
        self.root = root;
        Ok(())
    }

    fn load(&self, page_id: PageId) -> Result<Arc<Node<PageId>>> {
        if let Some(node) = self.cache.read().get(&page_id) {
            return Ok(Arc::clone(node));
        }

        let page = self.pm.read_page(page_id)?;
        let node = node_codec::decode(page.data())?;
        if page.page_type() != Self::page_type(&node) {
            return Err(DbError::CorruptTree(format!(
                "{} has page type {:?} but holds a {} node",
                page_id,
                page.page_type(),
                if node.is_leaf() { "leaf" } else { "internal" }
            )));
        }

        let node = Arc::new(node);
        self.cache_insert(page_id, Arc::clone(&node));
        Ok(node)
    }

    fn store(&mut self, page_id: PageId, node: Node<PageId>) -> Result<()> {
        let mut page = Page::new(page_id, Self::page_type(&node));
        page.set_data(&node_codec::encode(&node))?;
        if let Node::Leaf(leaf) = &node {
            page.set_next_page(leaf.next.unwrap_or(crate::common::INVALID_PAGE_ID));
        }

        if let Err(e) = self.pm.write_page(&mut page) {
            // The page on disk may now disagree with the cached copy.
            self.cache.write().remove(&page_id);
            return Err(e);
        }
        self.cache_insert(page_id, Arc::new(node));
        Ok(())
    }

    fn allocate(&mut self, node: Node<PageId>) -> Result<PageId> {
        let page_id = self.pm.allocate_page(Self::page_type(&node))?;
        self.store(page_id, node)?;
        Ok(page_id)
    }

    fn free(&mut self, page_id: PageId) -> Result<()> {
        self.cache.write().remove(&page_id);
        self.pm.deallocate_page(page_id)
    }

    fn close(&mut self) -> Result<()> {
        self.cache.write().clear();
        Ok(())
    }
}

/// B+Tree whose nodes are pages in a database file.
pub type DiskBTree = BPlusTree<PageStore>;

impl DiskBTree {
    /// Opens the tree recorded as `name` in the page manager's catalog,
    /// creating it on first use.
    pub fn open(pm: Arc<PageManager>, name: &str, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let store = PageStore::open(pm, name, config.cache_capacity)?;
        BPlusTree::with_store(store, config)
    }

    pub fn name(&self) -> &str {
        self.store().name()
    }
}
