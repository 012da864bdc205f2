use bytes::{Buf, BufMut};

use crate::common::{DbError, PageId, Result, META_MAGIC, PAGE_PAYLOAD_SIZE};

/// Contents of page 0.
///
/// Payload layout, little-endian:
///
/// | Field      | Size          |
/// |------------|---------------|
/// | magic      | 11            |
/// | root_count | 4             |
/// | roots      | variable      |
///
/// Each root entry is `name_len: u16 | name | root_page_id: u32`. A payload
/// holding only the magic decodes as an empty catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaPage {
    roots: Vec<(String, PageId)>,
}

impl MetaPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self, name: &str) -> Option<PageId> {
        self.roots
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    /// Records (or replaces) the root for `name`.
    pub fn set_root(&mut self, name: &str, root: PageId) {
        match self.roots.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = root,
            None => self.roots.push((name.to_string(), root)),
        }
    }

    pub fn remove_root(&mut self, name: &str) -> Option<PageId> {
        let pos = self.roots.iter().position(|(n, _)| n == name)?;
        Some(self.roots.remove(pos).1)
    }

    pub fn roots(&self) -> &[(String, PageId)] {
        &self.roots
    }

    pub fn encoded_size(&self) -> usize {
        META_MAGIC.len()
            + 4
            + self
                .roots
                .iter()
                .map(|(name, _)| 2 + name.len() + 4)
                .sum::<usize>()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let size = self.encoded_size();
        if size > PAGE_PAYLOAD_SIZE {
            return Err(DbError::DataTooLarge {
                size,
                capacity: PAGE_PAYLOAD_SIZE,
            });
        }

        let mut buf = Vec::with_capacity(size);
        buf.put_slice(META_MAGIC);
        buf.put_u32_le(self.roots.len() as u32);
        for (name, root) in &self.roots {
            buf.put_u16_le(name.len() as u16);
            buf.put_slice(name.as_bytes());
            buf.put_u32_le(root.as_u32());
        }
        Ok(buf)
    }

    /// Returns `None` when the payload does not start with the expected magic.
    pub fn decode(data: &[u8]) -> Result<Option<Self>> {
        if !data.starts_with(META_MAGIC) {
            return Ok(None);
        }

        let mut buf = &data[META_MAGIC.len()..];
        if buf.is_empty() {
            return Ok(Some(Self::new()));
        }
        if buf.remaining() < 4 {
            return Err(DbError::CorruptMeta("missing root count".to_string()));
        }

        let count = buf.get_u32_le() as usize;
        let mut roots = Vec::with_capacity(count.min(PAGE_PAYLOAD_SIZE / 6));
        for i in 0..count {
            if buf.remaining() < 2 {
                return Err(DbError::CorruptMeta(format!("root {} truncated", i)));
            }
            let name_len = buf.get_u16_le() as usize;
            if buf.remaining() < name_len + 4 {
                return Err(DbError::CorruptMeta(format!("root {} truncated", i)));
            }
            let name = String::from_utf8(buf[..name_len].to_vec())
                .map_err(|_| DbError::CorruptMeta(format!("root {} name is not UTF-8", i)))?;
            buf.advance(name_len);
            roots.push((name, PageId::new(buf.get_u32_le())));
        }

        Ok(Some(Self { roots }))
    }
}
