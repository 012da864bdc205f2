use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::common::Result;

use super::node::Node;

/// Where B+Tree nodes live and how links between them are resolved.
///
/// The tree algorithm is written once against this trait. A store hands out
/// shared snapshots of nodes; every mutation goes back through [`store`],
/// which is the commit point for that node.
///
/// [`store`]: NodeStore::store
pub trait NodeStore {
    /// Stable address of a node: an arena slot or a page ID.
    type Handle: Copy + Eq + Hash + Debug;

    fn root(&self) -> Self::Handle;

    /// Makes `root` the tree's root. Persistent stores record it durably.
    fn set_root(&mut self, root: Self::Handle) -> Result<()>;

    fn load(&self, handle: Self::Handle) -> Result<Arc<Node<Self::Handle>>>;

    /// Replaces the node at `handle`.
    fn store(&mut self, handle: Self::Handle, node: Node<Self::Handle>) -> Result<()>;

    /// Adds a new node and returns its handle.
    fn allocate(&mut self, node: Node<Self::Handle>) -> Result<Self::Handle>;

    /// Releases a node. Nothing may reference `handle` afterwards.
    fn free(&mut self, handle: Self::Handle) -> Result<()>;

    /// Drops any cached state. Committed nodes are unaffected.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
