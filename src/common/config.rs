use super::error::{DbError, Result};
use super::types::PageId;

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Size of the fixed page header
pub const PAGE_HEADER_SIZE: usize = 16;

/// Bytes available for payload in every page
pub const PAGE_PAYLOAD_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Invalid page ID constant, also the on-disk encoding of a null link
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Page reserved for format metadata and the root catalog
pub const META_PAGE_ID: PageId = PageId(0);

/// Magic string stored at the start of the metadata page
pub const META_MAGIC: &[u8] = b"SIMPLEDB_V1";

/// Default B+ tree fanout (max keys per node)
pub const DEFAULT_MAX_KEYS: usize = 4;

/// Default number of decoded nodes kept by a persistent tree
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Encoded bytes of a node that do not depend on its entries:
/// node type, key count and one trailing link.
const NODE_FIXED_OVERHEAD: usize = 1 + 4 + 4;

/// Per-entry framing: a length prefix for the key and one for the value
/// (or, for internal nodes, the key length plus one child link).
const ENTRY_OVERHEAD: usize = 8;

/// Tuning knobs shared by both tree variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Maximum keys per node before a split
    pub max_keys: usize,
    /// Maximum decoded nodes held by a persistent tree's cache
    pub cache_capacity: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_keys: DEFAULT_MAX_KEYS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl TreeConfig {
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Minimum keys a non-root node must hold
    pub fn min_keys(&self) -> usize {
        self.max_keys / 2
    }

    /// Largest `key.len() + value.len()` for which a node of `max_keys`
    /// entries is guaranteed to encode within one page payload.
    pub fn max_entry_size(&self) -> usize {
        ((PAGE_PAYLOAD_SIZE - NODE_FIXED_OVERHEAD) / self.max_keys).saturating_sub(ENTRY_OVERHEAD)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_keys < 3 {
            return Err(DbError::InvalidConfig(format!(
                "max_keys must be at least 3, got {}",
                self.max_keys
            )));
        }
        if self.max_entry_size() == 0 {
            return Err(DbError::InvalidConfig(format!(
                "max_keys {} leaves no room for entries in a page",
                self.max_keys
            )));
        }
        if self.cache_capacity == 0 {
            return Err(DbError::InvalidConfig(
                "cache_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
