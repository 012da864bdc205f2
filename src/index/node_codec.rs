//! Binary encoding of a B+Tree node into a page payload.
//!
//! Layout, little-endian:
//!
//! ```text
//! [type: u8 (0 = internal, 1 = leaf)] [key_count: u32]
//! per key:  [key_len: u32] [key] and, for leaves, [value_len: u32] [value]
//! trailer:  leaf     -> [next_page_id: u32]
//!           internal -> (key_count + 1) x [child_page_id: u32]
//! ```
//!
//! A leaf without a successor stores `INVALID_PAGE_ID` as its next link.

use bytes::{Buf, BufMut, Bytes};

use crate::common::{DbError, PageId, Result, INVALID_PAGE_ID};

use super::node::{InternalNode, LeafNode, Node};

const INTERNAL_TYPE: u8 = 0;
const LEAF_TYPE: u8 = 1;

/// Type byte plus key count.
const PREFIX_SIZE: usize = 5;

/// Exact encoded length of `node`, computed without allocating.
pub fn estimate_size(node: &Node<PageId>) -> usize {
    match node {
        Node::Leaf(leaf) => {
            PREFIX_SIZE
                + leaf
                    .keys
                    .iter()
                    .zip(&leaf.values)
                    .map(|(k, v)| 8 + k.len() + v.len())
                    .sum::<usize>()
                + 4
        }
        Node::Internal(internal) => {
            PREFIX_SIZE
                + internal.keys.iter().map(|k| 4 + k.len()).sum::<usize>()
                + 4 * internal.children.len()
        }
    }
}

pub fn encode(node: &Node<PageId>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(estimate_size(node));

    match node {
        Node::Leaf(leaf) => {
            buf.put_u8(LEAF_TYPE);
            buf.put_u32_le(leaf.keys.len() as u32);
            for (key, value) in leaf.keys.iter().zip(&leaf.values) {
                buf.put_u32_le(key.len() as u32);
                buf.put_slice(key);
                buf.put_u32_le(value.len() as u32);
                buf.put_slice(value);
            }
            buf.put_u32_le(leaf.next.unwrap_or(INVALID_PAGE_ID).as_u32());
        }
        Node::Internal(internal) => {
            buf.put_u8(INTERNAL_TYPE);
            buf.put_u32_le(internal.keys.len() as u32);
            for key in &internal.keys {
                buf.put_u32_le(key.len() as u32);
                buf.put_slice(key);
            }
            for child in &internal.children {
                buf.put_u32_le(child.as_u32());
            }
        }
    }

    buf
}

/// Cursor over the payload that reports truncation with its offset.
struct Reader<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> Reader<'a> {
    fn offset(&self) -> usize {
        self.len - self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(DbError::Truncated {
                offset: self.offset(),
                needed: n,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    fn bytes(&mut self) -> Result<Bytes> {
        let len = self.u32()? as usize;
        self.need(len)?;
        let out = Bytes::copy_from_slice(&self.buf[..len]);
        self.buf.advance(len);
        Ok(out)
    }
}

pub fn decode(data: &[u8]) -> Result<Node<PageId>> {
    if data.len() < PREFIX_SIZE {
        return Err(DbError::TooShort { len: data.len() });
    }

    let mut reader = Reader {
        buf: data,
        len: data.len(),
    };
    let node_type = reader.buf.get_u8();
    let count = reader.u32()? as usize;
    // Every key costs at least its length prefix; cap preallocation by what
    // the buffer could possibly hold.
    let capacity = count.min(data.len() / 4);

    match node_type {
        LEAF_TYPE => {
            let mut leaf = LeafNode::new();
            leaf.keys.reserve(capacity);
            leaf.values.reserve(capacity);
            for _ in 0..count {
                leaf.keys.push(reader.bytes()?);
                leaf.values.push(reader.bytes()?);
            }
            let next = PageId::new(reader.u32()?);
            leaf.next = next.is_valid().then_some(next);
            Ok(Node::Leaf(leaf))
        }
        INTERNAL_TYPE => {
            let mut keys = Vec::with_capacity(capacity);
            for _ in 0..count {
                keys.push(reader.bytes()?);
            }
            let mut children = Vec::with_capacity(capacity + 1);
            for _ in 0..=count {
                children.push(PageId::new(reader.u32()?));
            }
            Ok(Node::Internal(InternalNode { keys, children }))
        }
        other => Err(DbError::UnknownNodeType(other)),
    }
}
