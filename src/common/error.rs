use thiserror::Error;

use super::types::{NodeId, PageId};

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Incomplete read of {page_id}: got {read} bytes")]
    ShortRead { page_id: PageId, read: usize },

    #[error("Data too large for page: {size} > {capacity}")]
    DataTooLarge { size: usize, capacity: usize },

    #[error("Entry of {size} bytes exceeds the per-entry limit of {limit} bytes")]
    EntryTooLarge { size: usize, limit: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("Invalid page size: got {got}, expected {expected}")]
    InvalidSize { got: usize, expected: usize },

    #[error("Node buffer too short: {len} bytes")]
    TooShort { len: usize },

    #[error("Node data truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Checksum mismatch on {page_id}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        page_id: PageId,
        stored: u32,
        computed: u32,
    },

    #[error("Unknown node type byte: {0}")]
    UnknownNodeType(u8),

    #[error("Invalid node ID: {0}")]
    InvalidNodeId(NodeId),

    #[error("Corrupt header on {page_id}: data length {data_length} exceeds the payload")]
    CorruptPage { page_id: PageId, data_length: usize },

    #[error("Corrupt tree: {0}")]
    CorruptTree(String),

    #[error("Corrupt metadata page: {0}")]
    CorruptMeta(String),

    #[error("Key not found")]
    KeyNotFound,

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),
}

/// Coarse classification of [`DbError`] for callers that branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    Io,
    Format,
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::DataTooLarge { .. }
            | DbError::EntryTooLarge { .. }
            | DbError::InvalidConfig(_)
            | DbError::InvalidTableName(_) => ErrorKind::Validation,
            DbError::KeyNotFound | DbError::TableNotFound(_) => ErrorKind::NotFound,
            DbError::TableAlreadyExists(_) => ErrorKind::AlreadyExists,
            DbError::Io(_) | DbError::InvalidPageId(_) | DbError::ShortRead { .. } => ErrorKind::Io,
            DbError::InvalidSize { .. }
            | DbError::TooShort { .. }
            | DbError::Truncated { .. }
            | DbError::ChecksumMismatch { .. }
            | DbError::CorruptPage { .. }
            | DbError::UnknownNodeType(_)
            | DbError::InvalidNodeId(_)
            | DbError::CorruptTree(_)
            | DbError::CorruptMeta(_) => ErrorKind::Format,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
