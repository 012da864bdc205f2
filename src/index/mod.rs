pub mod btree;
pub mod btree_iterator;
pub mod kv;
pub mod memory_store;
pub mod node;
pub mod node_codec;
pub mod page_store;
pub mod store;

pub use btree::BPlusTree;
pub use btree_iterator::{ScanState, TreeCursor};
pub use kv::KeyValueStore;
pub use memory_store::{MemBTree, MemoryStore};
pub use node::{InternalNode, LeafNode, Node};
pub use page_store::{DiskBTree, PageStore};
pub use store::NodeStore;
