use bytes::Bytes;

/// A leaf holds `keys[i] -> values[i]` and a link to the next leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode<H> {
    pub keys: Vec<Bytes>,
    pub values: Vec<Bytes>,
    pub next: Option<H>,
}

/// An internal node with `keys.len() + 1` children. Every key under
/// `children[i]` is `< keys[i]`, every key under `children[i + 1]` is `>= keys[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode<H> {
    pub keys: Vec<Bytes>,
    pub children: Vec<H>,
}

/// B+Tree node, generic over how child and sibling links are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<H> {
    Leaf(LeafNode<H>),
    Internal(InternalNode<H>),
}

impl<H> LeafNode<H> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            next: None,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// First index whose key is `>= key`, and whether it is an exact match.
    pub fn search(&self, key: &[u8]) -> (usize, bool) {
        match self.keys.binary_search_by(|k| k.as_ref().cmp(key)) {
            Ok(i) => (i, true),
            Err(i) => (i, false),
        }
    }

    pub fn insert(&mut self, index: usize, key: Bytes, value: Bytes) {
        self.keys.insert(index, key);
        self.values.insert(index, value);
    }

    pub fn remove(&mut self, index: usize) -> (Bytes, Bytes) {
        (self.keys.remove(index), self.values.remove(index))
    }

    /// Moves entries `[at, len)` into a new leaf that inherits this leaf's
    /// `next` link. The caller relinks `self.next` to the new leaf.
    pub fn split_off(&mut self, at: usize) -> Self {
        Self {
            keys: self.keys.split_off(at),
            values: self.values.split_off(at),
            next: self.next.take(),
        }
    }

    /// Appends every entry of `right` and takes over its `next` link.
    pub fn absorb(&mut self, right: LeafNode<H>) {
        self.keys.extend(right.keys);
        self.values.extend(right.values);
        self.next = right.next;
    }
}

impl<H> Default for LeafNode<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy> InternalNode<H> {
    pub fn new(separator: Bytes, left: H, right: H) -> Self {
        Self {
            keys: vec![separator],
            children: vec![left, right],
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the child to descend into: the first child whose separator
    /// exceeds `key`.
    pub fn child_index(&self, key: &[u8]) -> usize {
        self.keys.partition_point(|k| k.as_ref() <= key)
    }

    /// Inserts `separator` at `index` with `right` as the child just after it.
    pub fn insert_child(&mut self, index: usize, separator: Bytes, right: H) {
        self.keys.insert(index, separator);
        self.children.insert(index + 1, right);
    }

    /// Splits an over-full node. Keys `[0, mid)` stay, `keys[mid]` is
    /// returned for the parent, and `(mid, len)` move to the new node.
    pub fn split_off(&mut self, mid: usize) -> (Bytes, Self) {
        let right_keys = self.keys.split_off(mid + 1);
        let right_children = self.children.split_off(mid + 1);
        let separator = self
            .keys
            .pop()
            .unwrap_or_else(Bytes::new);
        (
            separator,
            Self {
                keys: right_keys,
                children: right_children,
            },
        )
    }

    /// Appends the parent separator and all of `right`.
    pub fn absorb(&mut self, separator: Bytes, right: InternalNode<H>) {
        self.keys.push(separator);
        self.keys.extend(right.keys);
        self.children.extend(right.children);
    }
}

impl<H: Copy> Node<H> {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn keys(&self) -> &[Bytes] {
        match self {
            Node::Leaf(leaf) => &leaf.keys,
            Node::Internal(internal) => &internal.keys,
        }
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    pub fn as_leaf(&self) -> Option<&LeafNode<H>> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Internal(_) => None,
        }
    }

    pub fn as_internal(&self) -> Option<&InternalNode<H>> {
        match self {
            Node::Internal(internal) => Some(internal),
            Node::Leaf(_) => None,
        }
    }
}
