use std::mem;
use std::sync::Arc;

use bytes::Bytes;
use log::debug;

use crate::common::{DbError, Result, TreeConfig};

use super::btree_iterator::{ScanState, TreeCursor};
use super::node::{InternalNode, LeafNode, Node};
use super::store::NodeStore;

/// Internal nodes visited on the way down, each with the index of the
/// child that was taken.
type Path<H> = Vec<(H, usize)>;

/// An order-preserving B+Tree over byte-string keys.
///
/// The algorithm is independent of where nodes live; `S` decides whether
/// links are arena slots or page IDs.
pub struct BPlusTree<S: NodeStore> {
    store: S,
    config: TreeConfig,
    size: usize,
}

impl<S: NodeStore> BPlusTree<S> {
    /// Wraps a store that already holds a tree (possibly empty), counting its
    /// entries along the leaf chain.
    pub fn with_store(store: S, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let mut tree = Self::empty(store, config);
        tree.size = tree.count_entries()?;
        Ok(tree)
    }

    pub(crate) fn empty(store: S, config: TreeConfig) -> Self {
        Self {
            store,
            config,
            size: 0,
        }
    }

    /// Number of key-value pairs in the tree.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Walks from the root to the leaf responsible for `key`.
    fn descend(&self, key: &[u8]) -> Result<(Path<S::Handle>, S::Handle, Arc<Node<S::Handle>>)> {
        let mut path = Vec::new();
        let mut handle = self.store.root();

        loop {
            let node = self.store.load(handle)?;
            let step = match node.as_ref() {
                Node::Leaf(_) => None,
                Node::Internal(internal) => {
                    let index = internal.child_index(key);
                    Some((index, internal.children[index]))
                }
            };
            match step {
                None => return Ok((path, handle, node)),
                Some((index, child)) => {
                    path.push((handle, index));
                    handle = child;
                }
            }
        }
    }

    fn first_leaf(&self) -> Result<S::Handle> {
        let mut handle = self.store.root();
        loop {
            match self.store.load(handle)?.as_ref() {
                Node::Leaf(_) => return Ok(handle),
                Node::Internal(internal) => handle = internal.children[0],
            }
        }
    }

    fn count_entries(&self) -> Result<usize> {
        let mut count = 0;
        let mut next = Some(self.first_leaf()?);
        while let Some(handle) = next {
            let node = self.store.load(handle)?;
            let leaf = as_leaf(&node, handle)?;
            count += leaf.len();
            next = leaf.next;
        }
        Ok(count)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let (_, handle, node) = self.descend(key)?;
        let leaf = as_leaf(&node, handle)?;
        match leaf.search(key) {
            (index, true) => Ok(Some(leaf.values[index].clone())),
            (_, false) => Ok(None),
        }
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Inserts or overwrites `key`.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let size = key.len() + value.len();
        let limit = self.config.max_entry_size();
        if size > limit {
            return Err(DbError::EntryTooLarge { size, limit });
        }

        let (path, handle, node) = self.descend(key)?;
        let mut leaf = into_leaf(node, handle)?;

        let (index, found) = leaf.search(key);
        if found {
            leaf.values[index] = Bytes::copy_from_slice(value);
            return self.store.store(handle, Node::Leaf(leaf));
        }

        leaf.insert(index, Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));
        if leaf.len() <= self.config.max_keys {
            self.store.store(handle, Node::Leaf(leaf))?;
        } else {
            self.split_leaf(path, handle, leaf)?;
        }
        self.size += 1;
        Ok(())
    }

    /// Splits a leaf holding `max_keys + 1` entries. The left half keeps
    /// `ceil((max_keys + 1) / 2)` entries.
    fn split_leaf(
        &mut self,
        path: Path<S::Handle>,
        handle: S::Handle,
        mut leaf: LeafNode<S::Handle>,
    ) -> Result<()> {
        let mid = (self.config.max_keys + 2) / 2;
        let right = leaf.split_off(mid);
        let separator = right.keys[0].clone();

        // The new right leaf is durable before anything links to it.
        let right_handle = self.store.allocate(Node::Leaf(right))?;
        leaf.next = Some(right_handle);
        self.store.store(handle, Node::Leaf(leaf))?;

        debug!("split leaf {:?} -> {:?}", handle, right_handle);
        self.insert_into_parent(path, handle, separator, right_handle)
    }

    /// Links `right` into the tree just after `left`, splitting ancestors as
    /// needed. Grows the tree by one level when the root splits.
    fn insert_into_parent(
        &mut self,
        mut path: Path<S::Handle>,
        mut left: S::Handle,
        mut separator: Bytes,
        mut right: S::Handle,
    ) -> Result<()> {
        loop {
            let Some((parent_handle, index)) = path.pop() else {
                let root = self
                    .store
                    .allocate(Node::Internal(InternalNode::new(separator, left, right)))?;
                self.store.set_root(root)?;
                debug!("tree grew: new root {:?} over {:?} and {:?}", root, left, right);
                return Ok(());
            };

            let mut parent = into_internal(self.store.load(parent_handle)?, parent_handle)?;
            parent.insert_child(index, separator, right);

            if parent.len() <= self.config.max_keys {
                return self.store.store(parent_handle, Node::Internal(parent));
            }

            let (promoted, sibling) = parent.split_off((self.config.max_keys + 1) / 2);
            let sibling_handle = self.store.allocate(Node::Internal(sibling))?;
            self.store.store(parent_handle, Node::Internal(parent))?;
            debug!("split internal {:?} -> {:?}", parent_handle, sibling_handle);

            left = parent_handle;
            separator = promoted;
            right = sibling_handle;
        }
    }

    /// Removes `key`, returning whether it was present.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let (path, handle, node) = self.descend(key)?;
        let mut leaf = into_leaf(node, handle)?;

        let (index, found) = leaf.search(key);
        if !found {
            return Ok(false);
        }
        leaf.remove(index);

        // Pages are released only after every node that referenced them has
        // been rewritten.
        let mut released = Vec::new();
        self.rebalance(path, handle, Node::Leaf(leaf), &mut released)?;
        for handle in released {
            self.store.free(handle)?;
        }

        self.size -= 1;
        Ok(true)
    }

    /// Commits `node` and restores minimum occupancy from the bottom up,
    /// borrowing from a sibling with surplus or merging with one.
    fn rebalance(
        &mut self,
        mut path: Path<S::Handle>,
        mut handle: S::Handle,
        mut node: Node<S::Handle>,
        released: &mut Vec<S::Handle>,
    ) -> Result<()> {
        let min_keys = self.config.min_keys();

        loop {
            let Some((parent_handle, index)) = path.pop() else {
                return self.store_root(handle, node, released);
            };

            if node.len() >= min_keys {
                return self.store.store(handle, node);
            }

            let mut parent = into_internal(self.store.load(parent_handle)?, parent_handle)?;

            let left = match index.checked_sub(1) {
                Some(i) => {
                    let h = parent.children[i];
                    Some((h, self.store.load(h)?))
                }
                None => None,
            };
            if let Some((left_handle, left_node)) = &left {
                if left_node.len() > min_keys {
                    let left_node = unshare(Arc::clone(left_node));
                    let (left_node, node) =
                        borrow_from_left(&mut parent, index, left_node, node, *left_handle)?;
                    self.store.store(*left_handle, left_node)?;
                    self.store.store(handle, node)?;
                    debug!("{:?} borrowed from left sibling {:?}", handle, left_handle);
                    return self.store.store(parent_handle, Node::Internal(parent));
                }
            }

            let right = match parent.children.get(index + 1) {
                Some(&h) => Some((h, self.store.load(h)?)),
                None => None,
            };
            if let Some((right_handle, right_node)) = &right {
                if right_node.len() > min_keys {
                    let right_node = unshare(Arc::clone(right_node));
                    let (node, right_node) =
                        borrow_from_right(&mut parent, index, node, right_node, *right_handle)?;
                    self.store.store(*right_handle, right_node)?;
                    self.store.store(handle, node)?;
                    debug!("{:?} borrowed from right sibling {:?}", handle, right_handle);
                    return self.store.store(parent_handle, Node::Internal(parent));
                }
            }

            match (left, right) {
                (Some((left_handle, left_node)), _) => {
                    let separator = parent.keys.remove(index - 1);
                    parent.children.remove(index);
                    let merged = merge(unshare(left_node), separator, node, left_handle)?;
                    self.store.store(left_handle, merged)?;
                    released.push(handle);
                    debug!("merged {:?} into left sibling {:?}", handle, left_handle);
                }
                (None, Some((right_handle, right_node))) => {
                    let separator = parent.keys.remove(index);
                    parent.children.remove(index + 1);
                    let merged = merge(node, separator, unshare(right_node), handle)?;
                    self.store.store(handle, merged)?;
                    released.push(right_handle);
                    debug!("merged right sibling {:?} into {:?}", right_handle, handle);
                }
                (None, None) => {
                    return Err(DbError::CorruptTree(format!(
                        "internal node {:?} has a single child",
                        parent_handle
                    )));
                }
            }

            handle = parent_handle;
            node = Node::Internal(parent);
        }
    }

    /// Commits the root, collapsing an internal root left with one child.
    fn store_root(
        &mut self,
        handle: S::Handle,
        node: Node<S::Handle>,
        released: &mut Vec<S::Handle>,
    ) -> Result<()> {
        match node {
            Node::Internal(internal) if internal.keys.is_empty() => {
                let child = internal.children[0];
                self.store.set_root(child)?;
                released.push(handle);
                debug!("tree shrank: root {:?} replaced by {:?}", handle, child);
                Ok(())
            }
            node => self.store.store(handle, node),
        }
    }

    /// Ascending iterator over every key strictly greater than `key`.
    pub fn find_larger(&self, key: &[u8]) -> Result<TreeCursor<'_, S>> {
        Ok(TreeCursor::new(self, self.scan_state(key)?))
    }

    /// Ascending iterator over every entry.
    pub fn iter(&self) -> Result<TreeCursor<'_, S>> {
        let handle = self.first_leaf()?;
        let state = ScanState::start(&self.store, self.store.load(handle)?, 0);
        Ok(TreeCursor::new(self, state))
    }

    /// Positions a detached scan after `key`, for callers that hold the tree
    /// behind a guard; advance it with [`ScanState::next_entry`].
    pub fn scan_state(&self, key: &[u8]) -> Result<ScanState<S::Handle>> {
        let (_, handle, node) = self.descend(key)?;
        let index = match as_leaf(&node, handle)?.search(key) {
            (index, true) => index + 1,
            (index, false) => index,
        };
        Ok(ScanState::start(&self.store, node, index))
    }

    /// Frees every node of the tree, consuming it. Returns the node count.
    pub fn destroy(mut self) -> Result<usize> {
        let mut pending = vec![self.store.root()];
        let mut freed = 0;
        while let Some(handle) = pending.pop() {
            if let Node::Internal(internal) = self.store.load(handle)?.as_ref() {
                pending.extend(internal.children.iter().copied());
            }
            self.store.free(handle)?;
            freed += 1;
        }
        debug!("destroyed tree of {} nodes", freed);
        Ok(freed)
    }

    /// Drops any cached nodes. Every mutation is already committed.
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }

    /// Verifies the structural invariants of the whole tree.
    pub fn check_invariants(&self) -> Result<()> {
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        let count = self.check_subtree(
            self.store.root(),
            None,
            None,
            0,
            true,
            &mut leaf_depth,
            &mut leaves,
        )?;
        if count != self.size {
            return Err(DbError::CorruptTree(format!(
                "size is {} but leaves hold {} keys",
                self.size, count
            )));
        }

        let mut chain = Vec::with_capacity(leaves.len());
        let mut next = Some(leaves[0]);
        while let Some(handle) = next {
            if chain.len() > leaves.len() {
                return Err(DbError::CorruptTree("leaf chain has a cycle".to_string()));
            }
            chain.push(handle);
            let node = self.store.load(handle)?;
            next = as_leaf(&node, handle)?.next;
        }
        if chain != leaves {
            return Err(DbError::CorruptTree(
                "leaf chain does not match in-order traversal".to_string(),
            ));
        }

        let mut previous: Option<Bytes> = None;
        for entry in self.iter()? {
            let (key, _) = entry?;
            if previous.as_ref().is_some_and(|p| *p >= key) {
                return Err(DbError::CorruptTree(format!(
                    "iteration not strictly ascending at {:?}",
                    key
                )));
            }
            previous = Some(key);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn check_subtree(
        &self,
        handle: S::Handle,
        lower: Option<&Bytes>,
        upper: Option<&Bytes>,
        depth: usize,
        is_root: bool,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<S::Handle>,
    ) -> Result<usize> {
        let node = self.store.load(handle)?;
        let keys = node.keys();
        let corrupt = |what: &str| DbError::CorruptTree(format!("{:?}: {}", handle, what));

        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(corrupt("keys not strictly increasing"));
        }
        if keys.len() > self.config.max_keys {
            return Err(corrupt("too many keys"));
        }
        if !is_root && keys.len() < self.config.min_keys() {
            return Err(corrupt("underflow"));
        }
        if let (Some(lower), Some(first)) = (lower, keys.first()) {
            if first < lower {
                return Err(corrupt("key below separator"));
            }
        }
        if let (Some(upper), Some(last)) = (upper, keys.last()) {
            if last >= upper {
                return Err(corrupt("key not below separator"));
            }
        }

        match node.as_ref() {
            Node::Leaf(leaf) => {
                if leaf.values.len() != leaf.keys.len() {
                    return Err(corrupt("values do not parallel keys"));
                }
                match *leaf_depth {
                    Some(d) if d != depth => return Err(corrupt("leaves at uneven depth")),
                    _ => *leaf_depth = Some(depth),
                }
                leaves.push(handle);
                Ok(leaf.len())
            }
            Node::Internal(internal) => {
                if internal.children.len() != internal.keys.len() + 1 {
                    return Err(corrupt("child count does not match key count"));
                }
                if is_root && internal.keys.is_empty() {
                    return Err(corrupt("internal root without keys"));
                }
                let mut count = 0;
                for (i, &child) in internal.children.iter().enumerate() {
                    let child_lower = if i == 0 { lower } else { Some(&internal.keys[i - 1]) };
                    let child_upper = internal.keys.get(i).or(upper);
                    count += self.check_subtree(
                        child,
                        child_lower,
                        child_upper,
                        depth + 1,
                        false,
                        leaf_depth,
                        leaves,
                    )?;
                }
                Ok(count)
            }
        }
    }
}

fn unshare<H: Copy>(node: Arc<Node<H>>) -> Node<H> {
    Arc::try_unwrap(node).unwrap_or_else(|shared| (*shared).clone())
}

fn as_leaf<H: Copy + std::fmt::Debug>(node: &Node<H>, handle: H) -> Result<&LeafNode<H>> {
    node.as_leaf()
        .ok_or_else(|| DbError::CorruptTree(format!("{:?} is not a leaf", handle)))
}

fn into_leaf<H: Copy + std::fmt::Debug>(node: Arc<Node<H>>, handle: H) -> Result<LeafNode<H>> {
    match unshare(node) {
        Node::Leaf(leaf) => Ok(leaf),
        Node::Internal(_) => Err(DbError::CorruptTree(format!("{:?} is not a leaf", handle))),
    }
}

fn into_internal<H: Copy + std::fmt::Debug>(
    node: Arc<Node<H>>,
    handle: H,
) -> Result<InternalNode<H>> {
    match unshare(node) {
        Node::Internal(internal) => Ok(internal),
        Node::Leaf(_) => Err(DbError::CorruptTree(format!(
            "{:?} is not an internal node",
            handle
        ))),
    }
}

fn mismatched<H: std::fmt::Debug>(handle: H) -> DbError {
    DbError::CorruptTree(format!("sibling {:?} is at a different level", handle))
}

/// Moves the last entry of `left` to the front of `node`, which sits at
/// `parent.children[index]`.
fn borrow_from_left<H: Copy + std::fmt::Debug>(
    parent: &mut InternalNode<H>,
    index: usize,
    left: Node<H>,
    node: Node<H>,
    left_handle: H,
) -> Result<(Node<H>, Node<H>)> {
    match (left, node) {
        (Node::Leaf(mut left), Node::Leaf(mut node)) => {
            let (key, value) = left.remove(left.len() - 1);
            parent.keys[index - 1] = key.clone();
            node.insert(0, key, value);
            Ok((Node::Leaf(left), Node::Leaf(node)))
        }
        (Node::Internal(mut left), Node::Internal(mut node)) => {
            let (Some(key), Some(child)) = (left.keys.pop(), left.children.pop()) else {
                return Err(mismatched(left_handle));
            };
            let separator = mem::replace(&mut parent.keys[index - 1], key);
            node.keys.insert(0, separator);
            node.children.insert(0, child);
            Ok((Node::Internal(left), Node::Internal(node)))
        }
        _ => Err(mismatched(left_handle)),
    }
}

/// Moves the first entry of `right` to the end of `node`, which sits at
/// `parent.children[index]`.
fn borrow_from_right<H: Copy + std::fmt::Debug>(
    parent: &mut InternalNode<H>,
    index: usize,
    node: Node<H>,
    right: Node<H>,
    right_handle: H,
) -> Result<(Node<H>, Node<H>)> {
    match (node, right) {
        (Node::Leaf(mut node), Node::Leaf(mut right)) => {
            let (key, value) = right.remove(0);
            node.insert(node.len(), key, value);
            parent.keys[index] = right.keys[0].clone();
            Ok((Node::Leaf(node), Node::Leaf(right)))
        }
        (Node::Internal(mut node), Node::Internal(mut right)) => {
            let key = right.keys.remove(0);
            let child = right.children.remove(0);
            let separator = mem::replace(&mut parent.keys[index], key);
            node.keys.push(separator);
            node.children.push(child);
            Ok((Node::Internal(node), Node::Internal(right)))
        }
        _ => Err(mismatched(right_handle)),
    }
}

/// Concatenates two adjacent siblings; `separator` is the parent key that
/// divided them.
fn merge<H: Copy + std::fmt::Debug>(
    left: Node<H>,
    separator: Bytes,
    right: Node<H>,
    left_handle: H,
) -> Result<Node<H>> {
    match (left, right) {
        (Node::Leaf(mut left), Node::Leaf(right)) => {
            left.absorb(right);
            Ok(Node::Leaf(left))
        }
        (Node::Internal(mut left), Node::Internal(right)) => {
            left.absorb(separator, right);
            Ok(Node::Internal(left))
        }
        _ => Err(mismatched(left_handle)),
    }
}
