use std::sync::Arc;

use bytes::Bytes;

use crate::common::{DbError, Result};

use super::btree::BPlusTree;
use super::node::Node;
use super::store::NodeStore;

/// Position of a forward scan along the leaf chain.
///
/// The state is always settled: when `leaf` is set, `index` points at an
/// entry that has not been returned yet. Exhausted leaves are skipped as soon
/// as the previous entry is consumed, so `has_next` never needs I/O.
pub struct ScanState<H> {
    leaf: Option<Arc<Node<H>>>,
    index: usize,
    error: Option<DbError>,
}

impl<H: Copy + std::fmt::Debug> ScanState<H> {
    pub(crate) fn start<S>(store: &S, leaf: Arc<Node<H>>, index: usize) -> Self
    where
        S: NodeStore<Handle = H>,
    {
        let mut state = Self {
            leaf: Some(leaf),
            index,
            error: None,
        };
        state.settle(store);
        state
    }

    fn settle<S>(&mut self, store: &S)
    where
        S: NodeStore<Handle = H>,
    {
        while let Some(node) = &self.leaf {
            let Some(leaf) = node.as_leaf() else {
                self.error = Some(DbError::CorruptTree(
                    "leaf chain links to an internal node".to_string(),
                ));
                self.leaf = None;
                return;
            };
            if self.index < leaf.len() {
                return;
            }

            let next = leaf.next;
            self.index = 0;
            self.leaf = match next {
                None => None,
                Some(handle) => match store.load(handle) {
                    Ok(node) => Some(node),
                    Err(e) => {
                        self.error = Some(e);
                        None
                    }
                },
            };
        }
    }

    pub fn has_next(&self) -> bool {
        self.leaf.is_some() || self.error.is_some()
    }

    /// Returns the next entry, loading the following leaf from `store` when
    /// the current one is used up. A load failure is reported once, after
    /// which the scan is finished.
    pub fn next_entry<S>(&mut self, store: &S) -> Option<Result<(Bytes, Bytes)>>
    where
        S: NodeStore<Handle = H>,
    {
        if let Some(e) = self.error.take() {
            return Some(Err(e));
        }

        let leaf = self.leaf.as_ref()?.as_leaf()?;
        let entry = (
            leaf.keys[self.index].clone(),
            leaf.values[self.index].clone(),
        );
        self.index += 1;
        self.settle(store);
        Some(Ok(entry))
    }
}

/// Lazy, forward-only iterator over a tree's entries in ascending key order.
pub struct TreeCursor<'a, S: NodeStore> {
    tree: &'a BPlusTree<S>,
    state: ScanState<S::Handle>,
}

impl<'a, S: NodeStore> TreeCursor<'a, S> {
    pub(crate) fn new(tree: &'a BPlusTree<S>, state: ScanState<S::Handle>) -> Self {
        Self { tree, state }
    }

    pub fn has_next(&self) -> bool {
        self.state.has_next()
    }
}

impl<'a, S: NodeStore> Iterator for TreeCursor<'a, S> {
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.state.next_entry(self.tree.store())
    }
}
