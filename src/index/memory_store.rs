use std::sync::Arc;

use crate::common::{DbError, NodeId, Result, TreeConfig};

use super::btree::BPlusTree;
use super::node::{LeafNode, Node};
use super::store::NodeStore;

/// Arena of nodes addressed by slot index.
///
/// Links between nodes are `NodeId`s rather than references, so the tree's
/// parent/sibling structure never forms an ownership cycle. Freed slots are
/// reused LIFO like pages.
#[derive(Debug)]
pub struct MemoryStore {
    slots: Vec<Option<Arc<Node<NodeId>>>>,
    free_slots: Vec<NodeId>,
    root: NodeId,
}

impl MemoryStore {
    /// Creates an arena holding a single empty root leaf.
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Arc::new(Node::Leaf(LeafNode::new())))],
            free_slots: Vec::new(),
            root: NodeId::new(0),
        }
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    fn slot_mut(&mut self, handle: NodeId) -> Result<&mut Option<Arc<Node<NodeId>>>> {
        self.slots
            .get_mut(handle.as_usize())
            .ok_or(DbError::InvalidNodeId(handle))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for MemoryStore {
    type Handle = NodeId;

    fn root(&self) -> NodeId {
        self.root
    }

    fn set_root(&mut self, root: NodeId) -> Result<()> {
        self.root = root;
        Ok(())
    }

    fn load(&self, handle: NodeId) -> Result<Arc<Node<NodeId>>> {
        self.slots
            .get(handle.as_usize())
            .and_then(|slot| slot.clone())
            .ok_or(DbError::InvalidNodeId(handle))
    }

    fn store(&mut self, handle: NodeId, node: Node<NodeId>) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        if slot.is_none() {
            return Err(DbError::InvalidNodeId(handle));
        }
        *slot = Some(Arc::new(node));
        Ok(())
    }

    fn allocate(&mut self, node: Node<NodeId>) -> Result<NodeId> {
        let node = Some(Arc::new(node));
        match self.free_slots.pop() {
            Some(handle) => {
                *self.slot_mut(handle)? = node;
                Ok(handle)
            }
            None => {
                let handle = NodeId::new(self.slots.len() as u32);
                self.slots.push(node);
                Ok(handle)
            }
        }
    }

    fn free(&mut self, handle: NodeId) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        if slot.take().is_none() {
            return Err(DbError::InvalidNodeId(handle));
        }
        self.free_slots.push(handle);
        Ok(())
    }
}

/// B+Tree whose nodes live in memory.
pub type MemBTree = BPlusTree<MemoryStore>;

impl MemBTree {
    pub fn new() -> Self {
        BPlusTree::empty(MemoryStore::new(), TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(BPlusTree::empty(MemoryStore::new(), config))
    }
}

impl Default for MemBTree {
    fn default() -> Self {
        Self::new()
    }
}
